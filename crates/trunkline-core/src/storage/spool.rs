//! Append-only file spool for degraded-mode persistence.
//!
//! When the database is unreachable, accepted messages are appended to
//! date-keyed JSONL files. Files are opened append-if-exists and never
//! truncated, so a crash mid-write loses at most the in-flight line and
//! restarts keep appending to the same file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{MessageCount, SenderId, SpoolFileCount, WebhookMessage},
};

const SPOOL_FILE_PREFIX: &str = "messages-";
const SPOOL_FILE_SUFFIX: &str = ".jsonl";

/// One line in a spool file.
///
/// Mirrors the primary table layout so spooled records can be replayed
/// into the database by an operator without translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolRecord {
    /// Locally generated record identifier.
    pub id: Uuid,
    /// Authenticated sender identity.
    pub sender_identity: SenderId,
    /// Stored payload with request metadata.
    pub message: serde_json::Value,
    /// When the request was received.
    pub received_at: DateTime<Utc>,
    /// Downstream-consumer flag, always false at write time.
    pub processed: bool,
    /// Downstream-consumer timestamp, always absent at write time.
    pub processed_at: Option<DateTime<Utc>>,
}

/// Append-only JSONL spool keyed by date.
#[derive(Debug, Clone)]
pub struct FileSpool {
    dir: PathBuf,
}

impl FileSpool {
    /// Creates a spool rooted at `dir`. The directory is created lazily on
    /// first append.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the spool directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Appends an accepted message, returning its locally generated id.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the directory or file cannot be written,
    /// or `CoreError::Serialization` if the record cannot be encoded.
    pub async fn append(&self, message: &WebhookMessage) -> Result<Uuid> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let record = SpoolRecord {
            id: Uuid::new_v4(),
            sender_identity: message.sender_id.clone(),
            message: message.payload.clone(),
            received_at: message.received_at,
            processed: message.processed,
            processed_at: message.processed_at,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.file_for(message.received_at.date_naive());
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;

        Ok(record.id)
    }

    /// Counts spooled records with a per-file breakdown.
    ///
    /// A missing spool directory counts as empty: nothing has been spooled
    /// yet.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the directory or a spool file cannot be
    /// read.
    pub async fn count(&self) -> Result<MessageCount> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MessageCount { total: 0, files: Some(Vec::new()) });
            },
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        let mut total = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(SPOOL_FILE_PREFIX) || !name.ends_with(SPOOL_FILE_SUFFIX) {
                continue;
            }

            let contents = tokio::fs::read_to_string(entry.path()).await?;
            let count = contents.lines().filter(|line| !line.trim().is_empty()).count() as i64;

            total += count;
            files.push(SpoolFileCount { file: name, count });
        }

        files.sort_by(|a, b| a.file.cmp(&b.file));

        Ok(MessageCount { total, files: Some(files) })
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{SPOOL_FILE_PREFIX}{date}{SPOOL_FILE_SUFFIX}"))
    }
}
