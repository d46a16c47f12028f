pub mod cache;
pub mod error;
pub mod grid;
pub mod linalg;
pub mod output;
pub mod pipeline;
pub mod sampling;
pub mod spectral;

pub use cache::{PlanCache, PlanKey};
pub use error::{FieldError, Result, Stage};
pub use grid::RadiusGrid;
pub use linalg::{CholeskyFactorizer, ConstraintProjector, ConstraintTransform, LinearConstraint};
pub use output::{FieldWriter, MatrixDisplay};
pub use pipeline::{FieldConfig, SamplingSummary, SamplingWorkflow};
pub use sampling::{NormalSource, ReplayNormals, Sample, SamplingPlan};
pub use spectral::{
    AdaptiveQuadrature, CovarianceModel, PowerSpectrum, QuadratureConfig, RadialKernel,
    SpectrumModel,
};
