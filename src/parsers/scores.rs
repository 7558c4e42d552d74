// ==============================================================================
// scores.rs - Cohort Score Table Parser
// ==============================================================================
// Description: Reads per-sample raw/normalized PRS tables for label simulation
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// Format: CSV file with header
// Example:
//   sample_id,prs_raw,z_score
//   HG00096,0.412,0.731
//   HG00097,-0.118,-0.402
// The z_score column is optional; when every row carries one it is used as-is,
// otherwise raw scores are normalized across the batch by the simulator.
// ==============================================================================

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::label_simulator::ScoreInput;

/// One individual's score row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortScore {
    #[serde(alias = "ID", alias = "sample")]
    pub sample_id: String,

    #[serde(alias = "score_value", alias = "raw_score")]
    pub prs_raw: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
}

#[derive(Error, Debug)]
pub enum ScoreTableError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Score table is empty")]
    EmptyFile,

    #[error("Non-finite score for sample {sample_id}: {value}")]
    InvalidValue { sample_id: String, value: f64 },
}

/// Parsed cohort scores, in file order
#[derive(Debug, Clone, Default)]
pub struct CohortScores {
    pub rows: Vec<CohortScore>,
}

impl CohortScores {
    pub fn sample_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.sample_id.as_str()).collect()
    }

    pub fn raw_scores(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.prs_raw).collect()
    }

    /// Z-scores when the table carries one for every row
    pub fn z_scores(&self) -> Option<Vec<f64>> {
        self.rows.iter().map(|r| r.z_score).collect()
    }

    /// Pick the simulator input: precomputed z-scores if complete, raw otherwise
    pub fn simulation_input(&self) -> ScoreInput {
        match self.z_scores() {
            Some(z) => ScoreInput::Normalized(z),
            None => ScoreInput::Raw(self.raw_scores()),
        }
    }
}

pub struct ScoreTableParser;

impl ScoreTableParser {
    pub fn parse(path: impl AsRef<Path>) -> Result<CohortScores, ScoreTableError> {
        let path = path.as_ref();
        let scores = Self::parse_reader(std::fs::File::open(path)?)?;
        info!("Loaded {} cohort scores from {}", scores.rows.len(), path.display());
        Ok(scores)
    }

    pub fn parse_reader<R: Read>(reader: R) -> Result<CohortScores, ScoreTableError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let row: CohortScore = result?;

            let bad = std::iter::once(row.prs_raw)
                .chain(row.z_score)
                .find(|v| !v.is_finite());
            if let Some(value) = bad {
                return Err(ScoreTableError::InvalidValue {
                    sample_id: row.sample_id,
                    value,
                });
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(ScoreTableError::EmptyFile);
        }

        Ok(CohortScores { rows })
    }
}
