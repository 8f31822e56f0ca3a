use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const MAX_ENTRIES: usize = 500;

#[derive(Debug, Serialize)]
pub struct ChangeLogEntry<'a> {
    pub timestamp: &'a str,
    pub command: &'a str,
    pub source: &'a Path,
    pub target: &'a Path,
    pub action: &'a str,
}

/// Append-only JSONL record of the operations that were actually executed.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
    limit: usize,
}

impl ChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limit: MAX_ENTRIES,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, command: &str, source: &Path, target: &Path, action: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
            }
        }
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        let entry = ChangeLogEntry {
            timestamp: &timestamp,
            command,
            source,
            target,
            action,
        };
        let json = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("opening {:?}", self.path))?;
        writeln!(file, "{json}")?;
        truncate_log(&self.path, self.limit)?;
        Ok(())
    }
}

fn truncate_log(path: &Path, limit: usize) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= limit {
        return Ok(());
    }
    let keep = &lines[lines.len() - limit..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}
