// ==============================================================================
// inference.rs - Classifier Feature Assembly
// ==============================================================================
// Description: Builds model input vectors in the classifier's own feature order
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// The model's feature names are authoritative: the output vector follows that
// order exactly, never the observation's or the weight table's order.
// ==============================================================================

use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::DEFAULT_SCORE_FEATURE;
use crate::models::{FeatureImputation, FeatureVector, GenotypeObservation};

/// Assembles classifier inputs from genotypes and the raw score
#[derive(Debug, Clone)]
pub struct InferenceAssembler {
    /// Feature name that receives the raw score
    pub score_feature: String,
    pub imputation: FeatureImputation,
}

impl Default for InferenceAssembler {
    fn default() -> Self {
        Self {
            score_feature: DEFAULT_SCORE_FEATURE.to_string(),
            imputation: FeatureImputation::default(),
        }
    }
}

impl InferenceAssembler {
    pub fn new(score_feature: impl Into<String>, imputation: FeatureImputation) -> Self {
        Self {
            score_feature: score_feature.into(),
            imputation,
        }
    }

    /// Build the feature vector in `expected_order`
    ///
    /// Each name is either the score feature or a SNP identifier. SNPs take the
    /// observed dosage, else the population mean (if the policy allows and one
    /// is known), else 0 (reference genotype).
    pub fn assemble(
        &self,
        expected_order: &[String],
        observation: &GenotypeObservation,
        raw_score: f64,
        population_means: &HashMap<String, f64>,
    ) -> FeatureVector {
        let mut values = Vec::with_capacity(expected_order.len());
        let mut matched = 0;
        let mut imputed_population_mean = 0;
        let mut imputed_reference = 0;

        for name in expected_order {
            if *name == self.score_feature {
                values.push(raw_score);
                matched += 1;
                continue;
            }

            if let Some(dosage) = observation.called_value(name) {
                values.push(dosage);
                matched += 1;
                continue;
            }

            let mean = match self.imputation {
                FeatureImputation::PopulationMeanThenReference => population_means.get(name).copied(),
                FeatureImputation::Reference => None,
            };
            match mean {
                Some(mean) => {
                    values.push(mean);
                    imputed_population_mean += 1;
                }
                None => {
                    debug!("Feature '{}' not observed, using reference genotype", name);
                    values.push(0.0);
                    imputed_reference += 1;
                }
            }
        }

        info!(
            "Assembled {} features: {} matched, {} population-mean, {} reference",
            values.len(),
            matched,
            imputed_population_mean,
            imputed_reference
        );

        FeatureVector {
            names: expected_order.to_vec(),
            values,
            matched,
            imputed_population_mean,
            imputed_reference,
        }
    }
}

/// Build a classifier input with the default score feature name
pub fn assemble_features(
    expected_order: &[String],
    observation: &GenotypeObservation,
    raw_score: f64,
    population_means: &HashMap<String, f64>,
    imputation: FeatureImputation,
) -> FeatureVector {
    InferenceAssembler {
        imputation,
        ..InferenceAssembler::default()
    }
    .assemble(expected_order, observation, raw_score, population_means)
}
