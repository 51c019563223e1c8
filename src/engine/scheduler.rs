//! Bounded-concurrency task runner for per-symbol fetches.
//!
//! Tasks start in input order and at most `concurrency` of them are in
//! flight at once; a slot freed by a finished task is refilled with the
//! next unstarted one straight away. A failing task is logged and counted,
//! it never cancels its siblings.
//!
//! All tasks are polled on the caller's task, so shared state they touch is
//! never mutated from two threads at once.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// Outcome counts for one [`FetchScheduler::run_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ScheduleReport {
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FetchScheduler {
    concurrency: usize,
}

impl FetchScheduler {
    /// A concurrency of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task to completion.
    ///
    /// Each task is paired with a label used in failure logs.
    /// `on_complete(completed, total)` fires after every task, success or not.
    pub async fn run_all<K, F>(
        &self,
        tasks: Vec<(K, F)>,
        mut on_complete: impl FnMut(usize, usize),
    ) -> ScheduleReport
    where
        K: Display,
        F: Future<Output = Result<()>>,
    {
        let mut report = ScheduleReport {
            total: tasks.len(),
            ..ScheduleReport::default()
        };
        debug!(
            tasks = report.total,
            concurrency = self.concurrency,
            "Scheduling tasks"
        );

        let mut running = stream::iter(
            tasks
                .into_iter()
                .map(|(label, task)| async move { (label, task.await) }),
        )
        .buffer_unordered(self.concurrency);

        while let Some((label, outcome)) = running.next().await {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(task = %label, error = %format!("{e:#}"), "Task failed");
                }
            }
            on_complete(report.completed(), report.total);
        }

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
