//! Prompt context assembly from raw schema plus curated metadata.

pub mod builder;

pub use builder::{ContextBuilder, render_context, render_schema_summary};
