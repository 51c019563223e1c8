//! Scan engine: bounded-concurrency fetching and the per-run orchestrator.

pub mod scheduler;
pub mod analyzer;

pub use analyzer::{AnalysisResult, Analyzer, ProgressSink, TracingProgress};
pub use scheduler::{FetchScheduler, ScheduleReport};
