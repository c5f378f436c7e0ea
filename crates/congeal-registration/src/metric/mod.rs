//! Fiber similarity and the groupwise objective used by the reference engine.

pub mod distance;
pub mod entropy;

pub use distance::{fiber_distance, DistanceMethod};
pub use entropy::{kernel, subject_cost, GroupObjective};
