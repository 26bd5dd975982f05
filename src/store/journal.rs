use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::domain::ProcessOutcome;

/// Errors that can occur during journal operations.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A single audit journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JournalEntry {
    /// A record was matched, deduplicated and evaluated
    #[serde(rename = "decision")]
    Decision {
        recorded_at: DateTime<Utc>,
        outcome: ProcessOutcome,
    },

    /// A record was refused before any state changed
    #[serde(rename = "refused")]
    Refused {
        recorded_at: DateTime<Utc>,
        record_id: String,
        error: String,
    },

    /// A rule book version was put into force
    #[serde(rename = "rule_book")]
    RuleBook {
        recorded_at: DateTime<Utc>,
        version: String,
    },
}

impl JournalEntry {
    pub fn decision(outcome: ProcessOutcome) -> Self {
        JournalEntry::Decision {
            recorded_at: Utc::now(),
            outcome,
        }
    }

    pub fn refused(record_id: impl Into<String>, error: impl ToString) -> Self {
        JournalEntry::Refused {
            recorded_at: Utc::now(),
            record_id: record_id.into(),
            error: error.to_string(),
        }
    }

    pub fn rule_book(version: impl Into<String>) -> Self {
        JournalEntry::RuleBook {
            recorded_at: Utc::now(),
            version: version.into(),
        }
    }
}

/// Appends entries to the audit journal.
pub struct JournalWriter {
    writer: BufWriter<File>,
    path: String,
    entries_written: u64,
}

impl JournalWriter {
    /// Open or create a journal file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(JournalWriter {
            writer: BufWriter::new(file),
            path: path_str,
            entries_written: 0,
        })
    }

    /// Append an entry as one line: `JSON\tCRC32`.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        let json = serde_json::to_string(entry)?;
        let checksum = crc32fast::hash(json.as_bytes());

        writeln!(self.writer, "{}\t{:08x}", json, checksum)?;
        self.entries_written += 1;

        Ok(())
    }

    /// Flush buffered entries and sync the file to disk.
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Reads journal entries back, skipping damaged lines.
pub struct JournalReader {
    reader: BufReader<File>,
    line_buffer: String,
    entries_read: u64,
    errors: u64,
}

impl JournalReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let file = File::open(path)?;

        Ok(JournalReader {
            reader: BufReader::new(file),
            line_buffer: String::with_capacity(1024),
            entries_read: 0,
            errors: 0,
        })
    }

    /// Read the next intact entry, or `None` at end of file.
    ///
    /// Lines with a bad layout, checksum or payload are counted and skipped.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, JournalError> {
        loop {
            self.line_buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.line_buffer)?;

            if bytes_read == 0 {
                return Ok(None);
            }

            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }

            let Some((json, checksum)) = line.rsplit_once('\t') else {
                self.errors += 1;
                tracing::warn!("Invalid journal line format, skipping");
                continue;
            };

            let Ok(expected_checksum) = u32::from_str_radix(checksum, 16) else {
                self.errors += 1;
                tracing::warn!("Unreadable journal checksum, skipping");
                continue;
            };

            let actual_checksum = crc32fast::hash(json.as_bytes());
            if actual_checksum != expected_checksum {
                self.errors += 1;
                tracing::warn!(
                    "Journal checksum mismatch: expected {:08x}, got {:08x}",
                    expected_checksum,
                    actual_checksum
                );
                continue;
            }

            match serde_json::from_str(json) {
                Ok(entry) => {
                    self.entries_read += 1;
                    return Ok(Some(entry));
                }
                Err(e) => {
                    self.errors += 1;
                    tracing::warn!(error = %e, "Undecodable journal entry, skipping");
                }
            }
        }
    }

    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Number of damaged lines skipped so far.
    pub fn errors(&self) -> u64 {
        self.errors
    }
}

impl Iterator for JournalReader {
    type Item = Result<JournalEntry, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
