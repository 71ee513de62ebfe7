//! Implements the `bundle` command to create an FMU package.

use std::path::{Path, PathBuf};

use anyhow::Context;
use cosim::ArchiveBuilder;

pub fn bundle(model_identifier: &str, library: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let fmu_path = output.unwrap_or_else(|| PathBuf::from(format!("{model_identifier}.fmu")));
    log::info!("Creating FMU package at: {}", fmu_path.display());

    let builder = ArchiveBuilder::new(model_identifier, library);
    let description = builder
        .build(&fmu_path)
        .with_context(|| format!("Failed to bundle {}", library.display()))?;

    println!(
        "{}: {} ({} variables, {})",
        fmu_path.display(),
        description.model_name,
        description.model_variables.variables.len(),
        builder.library_entry()
    );
    Ok(())
}
