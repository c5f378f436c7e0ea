//! Input loading and checkpoint output for groupwise tractography registration.

pub mod loader;
pub mod plot;
pub mod preview;
pub mod sink;
pub mod transform_io;
pub mod vtk;

pub use loader::{load_directory, Dataset, LoadOptions};
pub use plot::write_objective_plot;
pub use preview::{Preview, View};
pub use sink::DirectorySink;
pub use transform_io::{parse_itk_transform, read_transforms_json, write_transforms, TransformRecord};
pub use vtk::{read_vtk, write_vtk};
