//! Builders that wire the pool's components together from configuration.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineReport};
