// src/handoff.rs

//! File-based handoff from the execution unit back to the host.
//!
//! The execution unit writes its run identifier to a well-known per-agent
//! file before it exits; the host reads it right after the process returns.
//! Access is strictly sequential (host reset → unit write → host read), so no
//! locking is involved.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

/// Identifier reported by the execution unit for its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRecord(String);

impl HandoffRecord {
    /// Returns `None` for empty or whitespace-only values.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandoffRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct HandoffChannel {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl HandoffChannel {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    /// Channel at `{state_dir}/agents/{agent}-trigger-handoff` on the real
    /// filesystem.
    pub fn for_agent(state_dir: &Path, agent: &str) -> Self {
        Self::new(
            handoff_path(state_dir, agent),
            Arc::new(RealFileSystem),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the file so a run that fails to write cannot be mistaken for
    /// the previous one. Also makes sure the file exists to be mounted.
    pub fn reset(&self) -> Result<()> {
        self.fs
            .write(&self.path, b"")
            .with_context(|| format!("resetting handoff file {:?}", self.path))?;
        Ok(())
    }

    pub fn write(&self, value: &str) -> Result<()> {
        let mut contents = value.trim().to_string();
        contents.push('\n');
        self.fs
            .write(&self.path, contents.as_bytes())
            .with_context(|| format!("writing handoff file {:?}", self.path))?;
        Ok(())
    }

    /// Most recent value, or `None` if the file is missing or empty.
    pub fn read_latest(&self) -> Result<Option<HandoffRecord>> {
        if !self.fs.is_file(&self.path) {
            return Ok(None);
        }
        let raw = self
            .fs
            .read_to_string(&self.path)
            .with_context(|| format!("reading handoff file {:?}", self.path))?;
        Ok(HandoffRecord::parse(&raw))
    }
}

pub fn handoff_path(state_dir: &Path, agent: &str) -> PathBuf {
    state_dir
        .join("agents")
        .join(format!("{agent}-trigger-handoff"))
}
