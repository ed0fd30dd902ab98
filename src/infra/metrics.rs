// ============================================================
// Layer 6 — Scalar Metrics Writer
// ============================================================
// Appends one CSV row per scalar to <logdir>/scalars.csv.
//
// Example output:
//   wall_time,step,tag,value
//   2026-03-01T10:12:44.120Z,0,lr,0.01
//   2026-03-01T10:12:44.121Z,0,acc/train,0.1042
//   ...
//
// The file is opened in append mode, so a resumed run keeps
// adding to the same series. The header is written only when
// the file is created.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const SCALARS_FILE: &str = "scalars.csv";
const HEADER: &str = "wall_time,step,tag,value";

/// One timestamped scalar of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub wall_time: DateTime<Utc>,
    pub step:      usize,
    pub tag:       String,
    pub value:     f64,
}

impl MetricRecord {
    pub fn now(step: usize, tag: impl Into<String>, value: f64) -> Self {
        Self { wall_time: Utc::now(), step, tag: tag.into(), value }
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{}",
            self.wall_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.step,
            self.tag,
            self.value,
        )
    }
}

pub struct ScalarWriter {
    csv_path: PathBuf,
}

impl ScalarWriter {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join(SCALARS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created scalar series: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn write(&self, record: &MetricRecord) -> Result<()> {
        self.write_all(std::slice::from_ref(record))
    }

    /// Append several records with a single open of the file.
    pub fn write_all(&self, records: &[MetricRecord]) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;
        for record in records {
            writeln!(f, "{}", record.to_csv_row())?;
        }
        Ok(())
    }

    /// Shorthand for a record stamped with the current time.
    pub fn add_scalar(&self, tag: &str, step: usize, value: f64) -> Result<()> {
        self.write(&MetricRecord::now(step, tag, value))
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
