pub mod workflow;

pub use workflow::{FieldConfig, SamplingSummary, SamplingWorkflow};
