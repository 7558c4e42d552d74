// ==============================================================================
// parsers/population.rs - Reference Population Statistics I/O
// ==============================================================================
// Description: Reads and writes frozen PopulationStats JSON records
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::models::PopulationStats;

#[derive(Error, Debug)]
pub enum PopulationStatsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Load population statistics (accepts the training pipeline's `*_prs` keys)
pub fn load_population_stats(path: impl AsRef<Path>) -> Result<PopulationStats, PopulationStatsError> {
    let path = path.as_ref();
    let stats: PopulationStats = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    info!(
        "Loaded population stats from {}: mean={:.4}, std={:.4}, n={}",
        path.display(),
        stats.mean,
        stats.std_dev,
        stats.sample_count
    );
    Ok(stats)
}

pub fn save_population_stats(
    path: impl AsRef<Path>,
    stats: &PopulationStats,
) -> Result<(), PopulationStatsError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), stats)?;
    info!("Saved population stats to {}", path.display());
    Ok(())
}
