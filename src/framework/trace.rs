//! Run trace recorder: an in-memory step log, optionally mirrored to a JSONL file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub at: DateTime<Utc>,
    pub run_id: String,
    pub agent: String,
    pub kind: String,
    pub detail: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Arc<Mutex<Vec<TraceEntry>>>,
    path: Option<PathBuf>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Arc::default(),
            path: Some(path.into()),
        }
    }

    pub fn record(&self, run_id: &str, agent: &str, kind: &str, detail: Value) {
        let entry = TraceEntry {
            at: Utc::now(),
            run_id: run_id.to_string(),
            agent: agent.to_string(),
            kind: kind.to_string(),
            detail,
        };

        if let Some(path) = self.path.as_ref()
            && let Err(err) = append_entry(path, &entry)
        {
            tracing::warn!(path = %path.display(), error = %err, "trace write failed");
        }

        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn entries_for_run(&self, run_id: &str) -> Vec<TraceEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.run_id == run_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn append_entry(path: &PathBuf, entry: &TraceEntry) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create trace directory '{}'", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open trace file '{}'", path.display()))?;
    serde_json::to_writer(&mut file, entry).context("failed to serialize trace entry")?;
    writeln!(file).context("failed to write trace newline")
}
