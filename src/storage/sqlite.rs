//! SQLite storage implementation

use crate::record::RecipeRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, StoredRecipe};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`, creating parent directories
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let finished = (status != RunStatus::Running).then_some(now);
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = COALESCE(?2, finished_at) WHERE id = ?3",
            params![status.to_db_string(), finished, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Recipe Index =====

    fn upsert_recipe(&mut self, record: &RecipeRecord, run_id: i64) -> StorageResult<()> {
        let json = serde_json::to_string(record)?;
        let image_count = record.resolved_paths().len() as i64;
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO recipes (recipe_id, title, detail_url, record_json, image_count, run_id, emitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(recipe_id) DO UPDATE SET
                title = excluded.title,
                detail_url = excluded.detail_url,
                record_json = excluded.record_json,
                image_count = excluded.image_count,
                run_id = excluded.run_id,
                emitted_at = excluded.emitted_at",
            params![
                record.recipe_id,
                record.title,
                record.detail_url,
                json,
                image_count,
                run_id,
                now
            ],
        )?;
        Ok(())
    }

    fn get_recipe(&self, recipe_id: &str) -> StorageResult<Option<StoredRecipe>> {
        let row = self
            .conn
            .query_row(
                "SELECT recipe_id, title, detail_url, record_json, image_count, run_id, emitted_at
                 FROM recipes WHERE recipe_id = ?1",
                params![recipe_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((recipe_id, title, detail_url, json, image_count, run_id, emitted_at)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredRecipe {
            recipe_id,
            title,
            detail_url,
            record: serde_json::from_str(&json)?,
            image_count,
            run_id,
            emitted_at,
        }))
    }

    fn known_recipe_ids(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT recipe_id FROM recipes ORDER BY recipe_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    // ===== Statistics =====

    fn count_recipes(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM recipes", [])
    }

    fn count_recipes_with_images(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM recipes WHERE image_count > 0", [])
    }

    fn count_recipes_in_run(&self, run_id: i64) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM recipes WHERE run_id = ?1", params![run_id])
    }
}
