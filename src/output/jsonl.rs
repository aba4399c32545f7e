//! JSON-lines record sink

use crate::output::traits::{RecordSink, SinkResult};
use crate::record::RecipeRecord;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// The on-disk shape of a record: the record's own fields plus `id`
#[derive(Serialize)]
struct FlatRecord<'a> {
    id: &'a str,
    #[serde(flatten)]
    record: &'a RecipeRecord,
}

/// Writes one JSON object per line
///
/// Each line is flushed as soon as it is written so that an interrupted
/// harvest leaves only complete lines behind.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens the output file, creating parent directories
    ///
    /// With `append` set, existing lines are kept; otherwise the file is
    /// truncated.
    pub fn open(path: &Path, append: bool) -> SinkResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonLinesSink {
    fn emit(&self, record: &RecipeRecord) -> SinkResult<()> {
        let line = serde_json::to_string(&FlatRecord {
            id: &record.recipe_id,
            record,
        })?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn finish(&self) -> SinkResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}
