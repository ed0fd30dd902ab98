// ============================================================
// Layer 2 — ConvertUseCase
// ============================================================
// Runs the one-shot SVHN conversion and verifies what it wrote
// by loading the result back through the same loader training
// uses.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::{loader::NpzLoader, svhn::SvhnConverter};

pub struct ConvertUseCase {
    converter: SvhnConverter,
}

impl ConvertUseCase {
    pub fn new(converter: SvhnConverter) -> Self {
        Self { converter }
    }

    pub fn execute(&self) -> Result<Vec<PathBuf>> {
        let written = self.converter.run().with_context(|| {
            format!(
                "SVHN conversion from '{}' failed",
                self.converter.raw_dir.display()
            )
        })?;

        let dataset = NpzLoader::new(&self.converter.out_dir)
            .load()
            .context("Converted data does not load back")?;
        tracing::info!("Converted SVHN: {}", dataset);

        Ok(written)
    }
}
