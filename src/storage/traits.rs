//! Storage traits and error types

use crate::record::RecipeRecord;
use crate::storage::{RunRecord, RunStatus, StoredRecipe};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run in the `running` state and returns its id
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Recipe Index =====

    /// Inserts a record, replacing any earlier row for the same recipe id
    fn upsert_recipe(&mut self, record: &RecipeRecord, run_id: i64) -> StorageResult<()>;

    fn get_recipe(&self, recipe_id: &str) -> StorageResult<Option<StoredRecipe>>;

    /// Ids of every indexed recipe
    fn known_recipe_ids(&self) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    fn count_recipes(&self) -> StorageResult<u64>;

    /// Recipes with at least one stored image
    fn count_recipes_with_images(&self) -> StorageResult<u64>;

    /// Recipes last emitted by the given run
    fn count_recipes_in_run(&self, run_id: i64) -> StorageResult<u64>;
}
