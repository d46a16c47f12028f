pub mod covariance;
pub mod quadrature;
pub mod spectrum;

pub use covariance::CovarianceModel;
pub use quadrature::{AdaptiveQuadrature, QuadratureConfig, QuadratureEstimate};
pub use spectrum::{PowerSpectrum, RadialKernel, SpectrumModel};
