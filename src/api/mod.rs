//! REST API source
//!
//! Fetches each [`ExtractionTask`] with a basic-auth GET and loads the
//! result. Failures are counted per task; one task never stops the run.

mod extractor;
mod types;

pub use extractor::ApiExtractor;
pub use types::ExtractionTask;
