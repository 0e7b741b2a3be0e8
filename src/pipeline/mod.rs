//! Pipeline orchestration
//!
//! Turns the API configuration into an ordered task plan and runs both
//! sources one after the other.
//!
//! # Overview
//!
//! - [`build_tasks`] expands monthly streams (partition-major) and appends
//!   static streams in configuration order
//! - [`Orchestrator`] runs the API source, then the database source, and
//!   folds both into a [`PipelineSummary`](crate::stats::PipelineSummary)

mod orchestrator;
mod plan;

pub use orchestrator::Orchestrator;
pub use plan::build_tasks;
