//! Output module for emitting harvested records
//!
//! This module handles:
//! - The record sink boundary and its JSON-lines and SQLite implementations
//! - Live harvest counters and the `--stats` report

mod jsonl;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use sqlite_output::SqliteRecordSink;
pub use stats::{load_statistics, print_statistics, HarvestStats, RecordStatistics, StatsSnapshot};
pub use traits::{FanoutSink, RecordSink, SinkError, SinkResult};
