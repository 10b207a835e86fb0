//! Output formatting module
//!
//! Renders a run's result map in the supported output formats.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
