// ==============================================================================
// normalizer.rs - Reference Population Normalization
// ==============================================================================
// Description: z-score, percentile and risk tier against frozen population stats
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   z          = (raw_score − μ) / σ
//   percentile = Φ(z) × 100, Φ the standard normal CDF
//   tier       = Low [0,40) | Moderate [40,75) | High [75,100]
// ==============================================================================

use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;
use thiserror::Error;
use tracing::info;

use crate::models::{NormalizedReport, PopulationStats, RiskTier};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Degenerate reference population: {0}")]
    DegeneratePopulation(String),

    #[error("Raw score is not a finite number: {0}")]
    NonFiniteScore(f64),
}

/// Standard normal CDF
pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Places raw scores on a validated reference distribution
#[derive(Debug, Clone)]
pub struct PopulationNormalizer {
    stats: PopulationStats,
}

impl PopulationNormalizer {
    /// Validate the reference statistics once
    ///
    /// A zero (or non-finite) standard deviation means the reference cohort
    /// was empty or uniform; that is fatal for the reference set.
    pub fn new(stats: PopulationStats) -> Result<Self, NormalizeError> {
        if !stats.mean.is_finite() {
            return Err(NormalizeError::DegeneratePopulation(format!(
                "mean is {}",
                stats.mean
            )));
        }
        if !stats.std_dev.is_finite() || stats.std_dev <= 0.0 {
            return Err(NormalizeError::DegeneratePopulation(format!(
                "standard deviation is {} over {} samples",
                stats.std_dev, stats.sample_count
            )));
        }
        Ok(Self { stats })
    }

    pub fn stats(&self) -> &PopulationStats {
        &self.stats
    }

    pub fn normalize(&self, raw_score: f64) -> Result<NormalizedReport, NormalizeError> {
        if !raw_score.is_finite() {
            return Err(NormalizeError::NonFiniteScore(raw_score));
        }

        let z_score = (raw_score - self.stats.mean) / self.stats.std_dev;
        let percentile = standard_normal_cdf(z_score) * 100.0;

        Ok(NormalizedReport {
            raw_score,
            z_score,
            percentile,
            risk_tier: RiskTier::from_percentile(percentile),
        })
    }
}

/// Normalize one raw score against population statistics
pub fn normalize(raw_score: f64, stats: &PopulationStats) -> Result<NormalizedReport, NormalizeError> {
    PopulationNormalizer::new(stats.clone())?.normalize(raw_score)
}

impl PopulationStats {
    /// Compute reference statistics over a cohort of raw scores
    ///
    /// Uses the sample standard deviation (n − 1), matching how the reference
    /// statistics were produced for the training cohort.
    pub fn from_scores(scores: &[f64], snps_used: usize) -> Result<Self, NormalizeError> {
        if scores.len() < 2 {
            return Err(NormalizeError::DegeneratePopulation(format!(
                "{} reference score(s); at least 2 are required",
                scores.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(NormalizeError::DegeneratePopulation(format!(
                "non-finite reference score {}",
                bad
            )));
        }

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();

        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        let stats = PopulationStats {
            mean,
            std_dev,
            sample_count: scores.len(),
            snps_used,
            median: Some(median),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
        };

        info!(
            "Population PRS: mean={:.4}, std={:.4}, n={}",
            stats.mean, stats.std_dev, stats.sample_count
        );

        // Rounding leaves a tiny non-zero std for uniform cohorts of inexact values
        if sorted.first() == sorted.last() || std_dev <= 0.0 {
            return Err(NormalizeError::DegeneratePopulation(
                "all reference scores are identical".to_string(),
            ));
        }

        Ok(stats)
    }
}
