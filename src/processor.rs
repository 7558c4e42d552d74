// ==============================================================================
// processor.rs - Scoring Pipeline
// ==============================================================================
// Description: End-to-end scoring of uploaded variant calls against a PRS model
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 3.0.0
// ==============================================================================
// Pipeline (per individual):
//   1. Validate upload (size, gzip magic, SHA-256)
//   2. Stream-scan the VCF for indexed positions
//   3. Aggregate the weighted dosage sum
//   4. Normalize against the reference population
//   5. Optionally assemble classifier features
// Individuals are independent: cohorts fan out onto blocking worker tasks that
// share one read-only PositionIndex. Each scan owns its outstanding set.
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::inference::InferenceAssembler;
use crate::label_simulator::SimulationError;
use crate::models::{
    FeatureVector, GenotypeObservation, NormalizedReport, PopulationStats, ScoreReport,
    SnpContribution,
};
use crate::normalizer::{NormalizeError, PopulationNormalizer};
use crate::parsers::population::PopulationStatsError;
use crate::parsers::scores::ScoreTableError;
use crate::parsers::vcf::{ScanError, ScanStats, VariantStreamScanner};
use crate::parsers::weights::WeightTableError;
use crate::position_index::{IndexError, PositionIndex};
use crate::scoring::{ScoreAggregator, ScoreError};
use crate::validator::{UploadError, UploadValidator, ValidatedUpload};

pub const DISCLAIMER: &str = "Research and educational use only. Not a diagnostic result; \
     polygenic scores capture a fraction of disease risk. Consult a healthcare provider \
     for medical decisions.";

/// Every failure the pipeline can surface
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    WeightTable(#[from] WeightTableError),

    #[error(transparent)]
    PopulationStats(#[from] PopulationStatsError),

    #[error(transparent)]
    ScoreTable(#[from] ScoreTableError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Scoring task failed: {0}")]
    Worker(String),
}

impl PipelineError {
    /// True for "not enough genotype data" outcomes, which callers report to
    /// the user rather than treat as a crash
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, PipelineError::Score(ScoreError::NoMatchingVariants { .. }))
    }
}

/// Scan and score of one individual
#[derive(Debug, Clone, Serialize)]
pub struct IndividualScore {
    pub sample: String,
    pub scan: ScanStats,
    #[serde(skip)]
    pub observation: GenotypeObservation,
    pub score: ScoreReport,
}

/// Complete report for one individual
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<ValidatedUpload>,
    pub scan: ScanStats,
    pub score: ScoreReport,
    pub normalized: NormalizedReport,
    pub top_contributors: Vec<SnpContribution>,
    pub population: PopulationStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    pub generated_at: DateTime<Utc>,
    pub disclaimer: &'static str,
}

/// One cohort member's outcome; failures stay per-file
#[derive(Debug)]
pub struct CohortEntry {
    pub path: PathBuf,
    pub result: Result<IndividualScore, PipelineError>,
}

/// Scoring pipeline bound to one PRS model
pub struct ScoringPipeline {
    config: PipelineConfig,
    index: Arc<PositionIndex>,
    normalizer: Option<PopulationNormalizer>,
}

impl ScoringPipeline {
    pub fn new(config: PipelineConfig, index: Arc<PositionIndex>) -> Self {
        Self {
            config,
            index,
            normalizer: None,
        }
    }

    /// Attach the reference population; rejected here if degenerate
    pub fn with_population(mut self, stats: PopulationStats) -> Result<Self, PipelineError> {
        self.normalizer = Some(PopulationNormalizer::new(stats)?);
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn index(&self) -> &PositionIndex {
        &self.index
    }

    /// Scan and score one raw (optionally gzipped) stream
    pub fn score_reader<R: Read>(
        &self,
        reader: R,
        filename_hint: &str,
    ) -> Result<IndividualScore, PipelineError> {
        score_stream(reader, filename_hint, &self.index, &self.config)
    }

    /// Score a VCF on disk
    pub fn score_path(&self, path: &Path) -> Result<IndividualScore, PipelineError> {
        score_path(path, &self.index, &self.config)
    }

    /// Validate, score and normalize an uploaded file held in memory
    pub fn analyze_upload(
        &self,
        bytes: &[u8],
        filename: &str,
        feature_order: Option<&[String]>,
    ) -> Result<Analysis, PipelineError> {
        let upload = UploadValidator::new()
            .with_max_bytes(self.config.max_upload_bytes)
            .validate_bytes(bytes, filename)?;

        let individual = self.score_reader(Cursor::new(bytes), filename)?;
        let mut analysis = self.finish(individual, feature_order)?;
        analysis.upload = Some(upload);
        Ok(analysis)
    }

    /// Validate, score and normalize a VCF on disk
    pub fn analyze_path(
        &self,
        path: &Path,
        feature_order: Option<&[String]>,
    ) -> Result<Analysis, PipelineError> {
        let upload = UploadValidator::new()
            .with_max_bytes(self.config.max_upload_bytes)
            .validate_file(path)?;

        let individual = self.score_path(path)?;
        let mut analysis = self.finish(individual, feature_order)?;
        analysis.upload = Some(upload);
        Ok(analysis)
    }

    fn finish(
        &self,
        individual: IndividualScore,
        feature_order: Option<&[String]>,
    ) -> Result<Analysis, PipelineError> {
        let normalizer = self.normalizer.as_ref().ok_or_else(|| {
            NormalizeError::DegeneratePopulation("no reference population loaded".to_string())
        })?;

        let normalized = normalizer.normalize(individual.score.raw_score)?;
        info!(
            "{}: raw={:.4}, z={:.3}, percentile={:.1}, risk={}",
            individual.sample,
            normalized.raw_score,
            normalized.z_score,
            normalized.percentile,
            normalized.risk_tier.as_str()
        );

        let features = feature_order.map(|order| {
            InferenceAssembler::new(self.config.score_feature.clone(), self.config.feature_imputation)
                .assemble(
                    order,
                    &individual.observation,
                    individual.score.raw_score,
                    &self.index.population_means(),
                )
        });

        Ok(Analysis {
            upload: None,
            scan: individual.scan,
            top_contributors: individual.score.top_contributors(self.config.top_n).to_vec(),
            score: individual.score,
            normalized,
            population: normalizer.stats().clone(),
            features,
            generated_at: Utc::now(),
            disclaimer: DISCLAIMER,
        })
    }
}

/// Score one individual's variant-call stream with default settings
///
/// The filename is consulted only to decide on gzip decompression.
pub fn score_individual<R: Read>(
    stream: R,
    filename_hint: &str,
    index: &PositionIndex,
) -> Result<ScoreReport, PipelineError> {
    Ok(score_stream(stream, filename_hint, index, &PipelineConfig::default())?.score)
}

fn score_stream<R: Read>(
    reader: R,
    filename_hint: &str,
    index: &PositionIndex,
    config: &PipelineConfig,
) -> Result<IndividualScore, PipelineError> {
    let outcome = VariantStreamScanner::new()
        .with_sample_index(config.sample_index)
        .scan_stream(reader, filename_hint, index)?;

    if outcome.stats.malformed > 0 {
        warn!(
            "{}: skipped {} malformed variant lines",
            filename_hint, outcome.stats.malformed
        );
    }

    let score = ScoreAggregator::new(config.score_imputation)
        .aggregate(&outcome.observation, index)
        .map_err(|e| e.with_scan_stats(&outcome.stats))?;

    Ok(IndividualScore {
        sample: filename_hint.to_string(),
        scan: outcome.stats,
        observation: outcome.observation,
        score,
    })
}

fn score_path(
    path: &Path,
    index: &PositionIndex,
    config: &PipelineConfig,
) -> Result<IndividualScore, PipelineError> {
    let file = File::open(path)
        .map_err(|e| ScanError::StreamOpen(format!("{}: {}", path.display(), e)))?;
    let hint = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    debug!("Scoring {}", path.display());

    let mut individual = score_stream(file, &hint, index, config)?;
    individual.sample = path.display().to_string();
    Ok(individual)
}

/// Score a cohort of VCF files concurrently
///
/// Each file is scanned on its own blocking task; all tasks read the same
/// index. Results come back in input order.
pub async fn score_files(
    paths: Vec<PathBuf>,
    index: Arc<PositionIndex>,
    config: PipelineConfig,
) -> Vec<CohortEntry> {
    info!("Scoring {} files against {} SNPs", paths.len(), index.len());

    let config = Arc::new(config);
    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let index = Arc::clone(&index);
            let config = Arc::clone(&config);
            let task_path = path.clone();
            let handle =
                tokio::task::spawn_blocking(move || score_path(&task_path, &index, &config));
            (path, handle)
        })
        .collect();

    let mut entries = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Worker(e.to_string())),
        };
        if let Err(e) = &result {
            warn!("Failed to score {}: {}", path.display(), e);
        }
        entries.push(CohortEntry { path, result });
    }

    let scored = entries.iter().filter(|e| e.result.is_ok()).count();
    info!("Cohort scoring complete: {} / {} scored", scored, entries.len());
    entries
}

/// Reference statistics over the successfully scored members of a cohort
pub fn cohort_population_stats(
    entries: &[CohortEntry],
    snps_used: usize,
) -> Result<PopulationStats, PipelineError> {
    let scores: Vec<f64> = entries
        .iter()
        .filter_map(|e| e.result.as_ref().ok())
        .map(|s| s.score.raw_score)
        .collect();
    Ok(PopulationStats::from_scores(&scores, snps_used)?)
}
