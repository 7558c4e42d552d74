// ==============================================================================
// config.rs - Pipeline Configuration
// ==============================================================================
// Description: Defaults and file-backed configuration for scoring runs
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::{FeatureImputation, ScoreImputation};
use crate::position_index::DuplicatePolicy;

/// Feature name classifiers use for the raw score
pub const DEFAULT_SCORE_FEATURE: &str = "prs_raw";

/// Contributors listed in reports
pub const DEFAULT_TOP_N: usize = 10;

pub const DEFAULT_HERITABILITY: f64 = 0.5;
pub const DEFAULT_PREVALENCE: f64 = 0.1;
pub const DEFAULT_SEED: u64 = 42;

pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024; // 500 MB

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Knobs for one scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Zero-based VCF sample column to score
    pub sample_index: usize,
    pub top_n: usize,
    pub score_imputation: ScoreImputation,
    pub feature_imputation: FeatureImputation,
    pub score_feature: String,
    pub duplicate_policy: DuplicatePolicy,
    pub max_upload_bytes: u64,
    pub simulation: SimulationConfig,
}

/// Label simulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub heritability: f64,
    pub prevalence: f64,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_index: 0,
            top_n: DEFAULT_TOP_N,
            score_imputation: ScoreImputation::default(),
            feature_imputation: FeatureImputation::default(),
            score_feature: DEFAULT_SCORE_FEATURE.to_string(),
            duplicate_policy: DuplicatePolicy::default(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            simulation: SimulationConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            heritability: DEFAULT_HERITABILITY,
            prevalence: DEFAULT_PREVALENCE,
            seed: DEFAULT_SEED,
        }
    }
}

impl PipelineConfig {
    /// Load from JSON; absent keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }
}
