//! Multiscale groupwise registration of tractography datasets.
//!
//! [`MultiscaleScheduler`] drives any [`RegistrationEngine`] through the
//! Coarse → Medium → Fine → Finest schedule and writes checkpoints through a
//! [`CheckpointSink`]. [`CongealEngine`] is the bundled engine.

pub mod checkpoint;
pub mod congeal;
pub mod engine;
pub mod error;
pub mod metric;
pub mod optimizer;
pub mod profile;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod selector;

pub use checkpoint::{checkpoint_label, should_checkpoint, Checkpoint, CheckpointSink, CheckpointWriter, PreviewHandle};
pub use congeal::{CongealEngine, EngineSettings, ParameterLimits};
pub use engine::RegistrationEngine;
pub use error::{RegistrationError, Result};
pub use metric::DistanceMethod;
pub use profile::{Schedule, ScheduleConfig, Stage, StageProfile, STAGE_COUNT};
pub use progress::{ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressEvent, ProgressTracker, StageSummary, StepInfo};
pub use scheduler::{MultiscaleScheduler, RegistrationOutcome, DEFAULT_FIBERS_RENDERED};
