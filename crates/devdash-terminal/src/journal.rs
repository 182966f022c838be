use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use anyhow::{Result, Context};
use chrono::Utc;
use serde_json::{json, Value};

/// Append-only JSON-lines record of session lifecycle events
pub struct SessionJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl std::fmt::Debug for SessionJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionJournal")
            .field("path", &self.path)
            .finish()
    }
}

impl SessionJournal {
    /// Open (or create) `sessions.jsonl` inside `log_dir`
    pub fn open(log_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .context("Failed to create journal directory")?;

        let path = log_dir.join("sessions.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open session journal")?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one event; `details` fields are merged into the entry
    pub fn record(&self, session_id: &str, multiplexer_name: &str, event: &str, details: Value) -> Result<()> {
        let mut entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": session_id,
            "multiplexer_name": multiplexer_name,
            "event": event,
        });
        if let (Some(entry), Value::Object(details)) = (entry.as_object_mut(), details) {
            entry.extend(details);
        }

        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(file, "{}", entry)
            .context("Failed to write to session journal")?;
        file.flush()?;

        Ok(())
    }

    /// Record an event, logging instead of failing
    pub fn note(&self, session_id: &str, multiplexer_name: &str, event: &str, details: Value) {
        if let Err(e) = self.record(session_id, multiplexer_name, event, details) {
            log::warn!("{:#}", e);
        }
    }
}
