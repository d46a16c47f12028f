pub mod cholesky;
pub mod projection;

pub use cholesky::CholeskyFactorizer;
pub use projection::{ConstraintProjector, ConstraintTransform, LinearConstraint};
