// ============================================================
// Layer 6 — Run Log
// ============================================================
// Plain-text, append-only log of a run (<logdir>/log.txt).
// Every line is mirrored to `tracing` at info level, so the
// console and the file tell the same story.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const LOG_FILE: &str = "log.txt";

pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;
        Ok(Self { path: dir.join(LOG_FILE) })
    }

    pub fn note(&self, line: impl AsRef<str>) -> Result<()> {
        let line = line.as_ref();
        tracing::info!("{line}");
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot append to '{}'", self.path.display()))?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// A titled multi-line block, e.g. the config dump.
    pub fn section(&self, title: &str, body: &str) -> Result<()> {
        self.note(format!("==> {title}"))?;
        for line in body.lines() {
            self.note(line)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
