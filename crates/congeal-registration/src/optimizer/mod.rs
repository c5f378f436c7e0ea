//! Derivative-free, bound-constrained solvers.

pub mod trait_;
pub mod compass;

pub use trait_::{BoundedOptimizer, BoundedProblem, OptimizationResult, Termination};
pub use compass::CompassSearch;
