pub mod app;
pub mod config;
pub mod metrics_export;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod state;
pub mod transform;
pub mod window;

#[cfg(test)]
pub(crate) mod test_support;

pub use pipeline::{Pipeline, PipelineError, RunOutcome};
