// ==============================================================================
// label_simulator.rs - Liability-Threshold Label Simulation
// ==============================================================================
// Description: Seeded synthetic disease labels for classifier training targets
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Model:
//   liability   = sqrt(h²) × z + sqrt(1 − h²) × ε,   ε ~ N(0, 1)
//   offset      = ln(p / (1 − p))
//   probability = sigmoid(liability + offset)
//   label       ~ Bernoulli(probability)
// Training-set simulation only; not a clinical model. The observed label rate
// tracks the target prevalence in expectation, not exactly.
// ==============================================================================

use rand::distributions::{Bernoulli, Distribution};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use statrs::distribution::Normal;
use thiserror::Error;
use tracing::info;

use crate::models::LiabilityLabel;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Heritability must be within [0, 1], got {0}")]
    InvalidHeritability(f64),

    #[error("Prevalence must be within (0, 1), got {0}")]
    InvalidPrevalence(f64),

    #[error("No scores to simulate labels for")]
    EmptyBatch,

    #[error("Non-finite score at index {index}: {value}")]
    NonFiniteScore { index: usize, value: f64 },

    #[error("Degenerate score batch: {0}")]
    DegeneratePopulation(String),

    #[error("Distribution error: {0}")]
    Distribution(String),
}

/// Scores handed to the simulator
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreInput {
    /// Already z-scored against a reference population
    Normalized(Vec<f64>),
    /// Raw scores, z-normalized across this batch before use
    Raw(Vec<f64>),
}

impl ScoreInput {
    fn values(&self) -> &[f64] {
        match self {
            ScoreInput::Normalized(v) | ScoreInput::Raw(v) => v,
        }
    }
}

/// Batch-level view of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub samples: usize,
    pub positives: usize,
    pub observed_prevalence: f64,
    pub target_prevalence: f64,
    /// Point-biserial correlation between normalized score and label
    pub score_label_correlation: Option<f64>,
}

/// Labels plus the normalized scores they were drawn from
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub normalized_scores: Vec<f64>,
    pub labels: Vec<LiabilityLabel>,
    pub summary: SimulationSummary,
}

/// Liability-threshold simulator with fixed parameters
#[derive(Debug, Clone, Copy)]
pub struct LabelSimulator {
    heritability: f64,
    prevalence: f64,
    seed: u64,
}

impl LabelSimulator {
    pub fn new(heritability: f64, prevalence: f64, seed: u64) -> Result<Self, SimulationError> {
        if !(0.0..=1.0).contains(&heritability) {
            return Err(SimulationError::InvalidHeritability(heritability));
        }
        if !(prevalence > 0.0 && prevalence < 1.0) {
            return Err(SimulationError::InvalidPrevalence(prevalence));
        }
        Ok(Self {
            heritability,
            prevalence,
            seed,
        })
    }

    pub fn heritability(&self) -> f64 {
        self.heritability
    }

    pub fn prevalence(&self) -> f64 {
        self.prevalence
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw one label per score; identical inputs and seed give identical output
    pub fn simulate(&self, input: &ScoreInput) -> Result<SimulationOutcome, SimulationError> {
        let scores = input.values();
        if scores.is_empty() {
            return Err(SimulationError::EmptyBatch);
        }
        if let Some((index, &value)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(SimulationError::NonFiniteScore { index, value });
        }

        info!(
            "Simulating disease labels (h²={}, prevalence={}, seed={})",
            self.heritability, self.prevalence, self.seed
        );

        let normalized = match input {
            ScoreInput::Normalized(z) => z.clone(),
            ScoreInput::Raw(raw) => standardize(raw)?,
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let noise_dist =
            Normal::new(0.0, 1.0).map_err(|e| SimulationError::Distribution(e.to_string()))?;

        // All noise first, then all Bernoulli draws, so the stream layout is fixed
        let noise: Vec<f64> = (0..normalized.len()).map(|_| noise_dist.sample(&mut rng)).collect();

        let genetic_scale = self.heritability.sqrt();
        let environmental_scale = (1.0 - self.heritability).sqrt();
        let offset = (self.prevalence / (1.0 - self.prevalence)).ln();

        let mut labels = Vec::with_capacity(normalized.len());
        for (z, eps) in normalized.iter().zip(noise.iter()) {
            let liability = genetic_scale * z + environmental_scale * eps;
            let disease_probability = sigmoid(liability + offset);
            let draw = Bernoulli::new(disease_probability)
                .map_err(|e| SimulationError::Distribution(e.to_string()))?;
            labels.push(LiabilityLabel {
                liability,
                disease_probability,
                label: u8::from(draw.sample(&mut rng)),
            });
        }

        let summary = summarize(&normalized, &labels, self.prevalence);
        info!(
            "Generated {} positive cases out of {} samples (prevalence {:.3}, target {})",
            summary.positives, summary.samples, summary.observed_prevalence, summary.target_prevalence
        );
        if let Some(r) = summary.score_label_correlation {
            info!("PRS–label correlation: r={:.3}", r);
        }

        Ok(SimulationOutcome {
            normalized_scores: normalized,
            labels,
            summary,
        })
    }
}

/// Generate liability-threshold labels for a batch of scores
pub fn simulate_labels(
    scores: &ScoreInput,
    heritability: f64,
    prevalence: f64,
    seed: u64,
) -> Result<Vec<LiabilityLabel>, SimulationError> {
    Ok(LabelSimulator::new(heritability, prevalence, seed)?
        .simulate(scores)?
        .labels)
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Zero mean, unit (population) variance across the batch
fn standardize(raw: &[f64]) -> Result<Vec<f64>, SimulationError> {
    let n = raw.len() as f64;
    let mean = raw.iter().sum::<f64>() / n;
    let std_dev = (raw.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
    let uniform = raw.iter().all(|s| *s == raw[0]);
    if uniform || std_dev <= 0.0 {
        return Err(SimulationError::DegeneratePopulation(format!(
            "{} raw scores share the value {}",
            raw.len(),
            mean
        )));
    }
    Ok(raw.iter().map(|s| (s - mean) / std_dev).collect())
}

fn summarize(normalized: &[f64], labels: &[LiabilityLabel], target: f64) -> SimulationSummary {
    let samples = labels.len();
    let positives = labels.iter().filter(|l| l.label == 1).count();
    let ys: Vec<f64> = labels.iter().map(|l| f64::from(l.label)).collect();

    SimulationSummary {
        samples,
        positives,
        observed_prevalence: positives as f64 / samples as f64,
        target_prevalence: target,
        score_label_correlation: pearson(normalized, &ys),
    }
}

/// Pearson correlation; `None` when either side has no variance
fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        None
    } else {
        Some(sxy / (sxx * syy).sqrt())
    }
}
