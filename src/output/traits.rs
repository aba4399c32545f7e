//! Record sink trait and error types
//!
//! A sink is the output boundary of a harvest. Completed records are handed
//! to every configured sink; emission order across records is not defined.

use crate::record::RecipeRecord;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while emitting records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write record: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Trait for record sinks
///
/// Sinks are shared between workers, so implementations must be thread-safe.
pub trait RecordSink: Send + Sync {
    /// Emits one completed record
    fn emit(&self, record: &RecipeRecord) -> SinkResult<()>;

    /// Flushes anything buffered; called once when the harvest ends
    fn finish(&self) -> SinkResult<()>;
}

impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    fn emit(&self, record: &RecipeRecord) -> SinkResult<()> {
        (**self).emit(record)
    }

    fn finish(&self) -> SinkResult<()> {
        (**self).finish()
    }
}

/// Forwards every record to each inner sink
///
/// All sinks see every record even when an earlier one fails; the first
/// error is returned.
pub struct FanoutSink {
    sinks: Vec<Box<dyn RecordSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn RecordSink>>) -> Self {
        Self { sinks }
    }
}

impl RecordSink for FanoutSink {
    fn emit(&self, record: &RecipeRecord) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finish(&self) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.finish() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
