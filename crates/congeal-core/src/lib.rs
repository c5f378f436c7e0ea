pub mod error;
pub mod fiber;
pub mod bundle;
pub mod subject;
pub mod transform;

pub use error::{CoreError, Result};
pub use fiber::{Fiber, Point};
pub use bundle::FiberBundle;
pub use subject::{Subject, SubjectSet};
pub use transform::{AffineParameters, AffineTransform, BlockBounds, Subspace, SubspaceMask};
