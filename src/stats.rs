//! Run statistics

use serde::Serialize;
use std::time::{Duration, Instant};

/// Counters of one source run
///
/// Counters only grow while the run is in progress and are frozen by
/// [`RunStats::finish`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Tasks or tables loaded successfully
    pub success: usize,
    /// Tasks or tables that failed
    pub failed: usize,
    /// Records loaded across successful tasks
    pub total_records: usize,
    /// Wall time of the run in milliseconds
    pub duration_ms: u64,
    #[serde(skip)]
    started: Option<Instant>,
    #[serde(skip)]
    finished: bool,
}

impl RunStats {
    /// Create stats and start the clock
    pub fn start() -> Self {
        Self {
            started: Some(Instant::now()),
            ..Self::default()
        }
    }

    /// Stats of a run that could not get going
    pub fn failed_run() -> Self {
        Self {
            failed: 1,
            finished: true,
            ..Self::default()
        }
    }

    /// Count a successful task and its records
    pub fn record_success(&mut self, records: usize) {
        if !self.finished {
            self.success += 1;
            self.total_records += records;
        }
    }

    /// Count a failed task
    pub fn record_failure(&mut self) {
        if !self.finished {
            self.failed += 1;
        }
    }

    /// Stop the clock and freeze the counters
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        if let Some(started) = self.started {
            self.duration_ms = started.elapsed().as_millis() as u64;
        }
        self.finished = true;
    }

    /// Whether [`RunStats::finish`] was called
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Tasks attempted
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Run duration
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Aggregate of both sources
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    /// API source
    pub api: RunStats,
    /// Database source
    pub database: RunStats,
    /// Wall time of the whole pipeline in milliseconds
    pub elapsed_ms: u64,
}

impl PipelineSummary {
    /// Failures across both sources
    pub fn total_failures(&self) -> usize {
        self.api.failed + self.database.failed
    }

    /// Successes across both sources
    pub fn total_success(&self) -> usize {
        self.api.success + self.database.success
    }

    /// Records across both sources
    pub fn total_records(&self) -> usize {
        self.api.total_records + self.database.total_records
    }

    /// Process exit code: 0 without failures, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        i32::from(self.total_failures() > 0)
    }
}
