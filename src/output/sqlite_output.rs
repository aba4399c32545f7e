//! SQLite-backed record sink
//!
//! Upserts every emitted record into the `recipes` index so that later
//! incremental runs can skip it and `--stats` can report on it.

use crate::output::traits::{RecordSink, SinkError, SinkResult};
use crate::record::RecipeRecord;
use crate::storage::Storage;
use std::sync::{Arc, Mutex};

/// SQLite-based record sink
pub struct SqliteRecordSink {
    storage: Arc<Mutex<dyn Storage + Send>>,
    run_id: i64,
}

impl SqliteRecordSink {
    /// Creates a sink that attributes records to `run_id`
    pub fn new(storage: Arc<Mutex<dyn Storage + Send>>, run_id: i64) -> Self {
        Self { storage, run_id }
    }
}

impl RecordSink for SqliteRecordSink {
    fn emit(&self, record: &RecipeRecord) -> SinkResult<()> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|e| SinkError::Storage(format!("Failed to lock storage: {}", e)))?;

        storage
            .upsert_recipe(record, self.run_id)
            .map_err(|e| SinkError::Storage(e.to_string()))
    }

    fn finish(&self) -> SinkResult<()> {
        Ok(())
    }
}
