// ==============================================================================
// scoring.rs - Polygenic Score Aggregation
// ==============================================================================
// Description: Weighted dosage sum with per-SNP contribution breakdown
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   raw_score = Σ beta_i × dosage_i over SNPs with a called dosage
//   - Missing calls are excluded, or replaced by the SNP's population mean
//     when the caller asks for ScoreImputation::PopulationMean
//   - Contributions are ranked by |beta × dosage|, ties in weight-table order
// ==============================================================================

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{GenotypeObservation, ScoreImputation, ScoreReport, SnpContribution};
use crate::parsers::vcf::ScanStats;
use crate::position_index::PositionIndex;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    /// Line counts are zero until the scanning caller attaches its stats
    #[error(
        "No target SNPs were found in the variant stream ({targeted} targeted; \
         {data_lines} variant lines read, {malformed} malformed)"
    )]
    NoMatchingVariants {
        targeted: usize,
        data_lines: usize,
        malformed: usize,
    },
}

impl ScoreError {
    /// Attach the scan's line counts so skipped lines reach the caller
    pub fn with_scan_stats(self, stats: &ScanStats) -> Self {
        match self {
            ScoreError::NoMatchingVariants { targeted, .. } => ScoreError::NoMatchingVariants {
                targeted,
                data_lines: stats.data_lines,
                malformed: stats.malformed,
            },
        }
    }

    fn no_matches(targeted: usize) -> Self {
        ScoreError::NoMatchingVariants {
            targeted,
            data_lines: 0,
            malformed: 0,
        }
    }
}

/// Combines decoded genotypes with per-SNP weights
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreAggregator {
    pub imputation: ScoreImputation,
}

impl ScoreAggregator {
    pub fn new(imputation: ScoreImputation) -> Self {
        Self { imputation }
    }

    /// Compute the raw score and contribution breakdown
    ///
    /// Fails with `ScoreError::NoMatchingVariants` when the observation is
    /// empty: a zero score built from zero matches carries no information.
    pub fn aggregate(
        &self,
        observation: &GenotypeObservation,
        index: &PositionIndex,
    ) -> Result<ScoreReport, ScoreError> {
        if observation.is_empty() {
            return Err(ScoreError::no_matches(index.len()));
        }

        let mut ranked: Vec<(usize, SnpContribution)> = Vec::with_capacity(index.len());
        let mut matched = 0;
        let mut imputed = 0;

        for (rank, snp) in index.records().enumerate() {
            let observed = observation.get(&snp.rsid);
            if observed.is_some() {
                matched += 1;
            }

            let (dosage, was_imputed) = match (observed.and_then(|d| d.value()), self.imputation) {
                (Some(value), _) => (value, false),
                (None, ScoreImputation::PopulationMean) => match snp.population_mean {
                    Some(mean) => (mean, true),
                    None => continue,
                },
                (None, ScoreImputation::Exclude) => continue,
            };

            if was_imputed {
                imputed += 1;
            }

            let contribution = snp.weight * dosage;
            ranked.push((
                rank,
                SnpContribution {
                    rsid: snp.rsid.clone(),
                    position: snp.position,
                    dosage,
                    weight: snp.weight,
                    contribution,
                    trait_label: snp.trait_label.clone(),
                    imputed: was_imputed,
                },
            ));
        }

        let unknown = observation
            .iter()
            .filter(|(rsid, _)| index.get_by_rsid(rsid).is_none())
            .count();
        if unknown > 0 {
            debug!("Ignoring {} observed SNPs absent from the weight table", unknown);
        }

        if matched == 0 {
            return Err(ScoreError::no_matches(index.len()));
        }

        let raw_score: f64 = ranked.iter().map(|(_, c)| c.contribution).sum();

        ranked.sort_by(|(rank_a, a), (rank_b, b)| {
            b.contribution
                .abs()
                .total_cmp(&a.contribution.abs())
                .then(rank_a.cmp(rank_b))
        });

        let report = ScoreReport {
            raw_score,
            contributions: ranked.into_iter().map(|(_, c)| c).collect(),
            matched,
            total_targeted: index.len(),
            missing_calls: observation
                .iter()
                .filter(|(rsid, d)| d.is_missing() && index.get_by_rsid(rsid).is_some())
                .count(),
            imputed,
        };

        info!(
            "Computed PRS {:.4} from {} / {} SNPs ({} missing calls, {} imputed)",
            report.raw_score,
            report.matched,
            report.total_targeted,
            report.missing_calls,
            report.imputed
        );

        Ok(report)
    }
}

/// Score an observation with the given imputation policy
pub fn aggregate_score(
    observation: &GenotypeObservation,
    index: &PositionIndex,
    imputation: ScoreImputation,
) -> Result<ScoreReport, ScoreError> {
    ScoreAggregator::new(imputation).aggregate(observation, index)
}
