// ==============================================================================
// models.rs - PRS Data Models
// ==============================================================================
// Description: Typed records flowing through the extraction-and-scoring pipeline
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-19
// Version: 3.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Curated SNP entry from a weight table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnpRecord {
    /// SNP identifier (e.g., "rs12345")
    pub rsid: String,

    /// Chromosome label as curated ("1", "22"), informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chromosome: Option<String>,

    /// Base pair position, unique key within one chromosome
    pub position: u64,

    /// Effect weight (beta)
    pub weight: f64,

    /// Trait the weight was estimated for
    #[serde(rename = "trait")]
    pub trait_label: String,

    /// Mean dosage in the reference population, used for imputation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_mean: Option<f64>,
}

impl SnpRecord {
    pub fn new(rsid: impl Into<String>, position: u64, weight: f64, trait_label: impl Into<String>) -> Self {
        Self {
            rsid: rsid.into(),
            chromosome: None,
            position,
            weight,
            trait_label: trait_label.into(),
            population_mean: None,
        }
    }

    pub fn with_population_mean(mut self, mean: f64) -> Self {
        self.population_mean = Some(mean);
        self
    }

    pub fn with_chromosome(mut self, chromosome: impl Into<String>) -> Self {
        self.chromosome = Some(chromosome.into());
        self
    }
}

/// Non-reference allele count for one individual at one position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dosage {
    /// Called genotype: 0, 1 or 2 alternate alleles
    Called(u8),
    /// No usable call (".", "./.", multi-allelic, unparseable)
    Missing,
}

impl Dosage {
    pub const HOM_REF: Dosage = Dosage::Called(0);
    pub const HET: Dosage = Dosage::Called(1);
    pub const HOM_ALT: Dosage = Dosage::Called(2);

    /// Numeric dosage, `None` when missing
    pub fn value(&self) -> Option<f64> {
        match self {
            Dosage::Called(n) => Some(f64::from(*n)),
            Dosage::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Dosage::Missing)
    }
}

/// Per-individual genotype calls keyed by SNP identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenotypeObservation {
    calls: BTreeMap<String, Dosage>,
}

impl GenotypeObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call, replacing any earlier call for the same SNP
    pub fn insert(&mut self, rsid: impl Into<String>, dosage: Dosage) {
        self.calls.insert(rsid.into(), dosage);
    }

    pub fn get(&self, rsid: &str) -> Option<Dosage> {
        self.calls.get(rsid).copied()
    }

    /// Numeric dosage if the SNP was observed with a called genotype
    pub fn called_value(&self, rsid: &str) -> Option<f64> {
        self.get(rsid).and_then(|d| d.value())
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.calls.values().filter(|d| d.is_missing()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Dosage)> {
        self.calls.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, Dosage)> for GenotypeObservation {
    fn from_iter<I: IntoIterator<Item = (S, Dosage)>>(iter: I) -> Self {
        let mut observation = Self::new();
        for (rsid, dosage) in iter {
            observation.insert(rsid, dosage);
        }
        observation
    }
}

/// How the score aggregator treats targeted SNPs without a called genotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreImputation {
    /// Leave them out of the weighted sum
    #[default]
    Exclude,
    /// Substitute the SNP's population mean dosage when one is curated
    PopulationMean,
}

/// How the inference assembler fills model features without a called genotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureImputation {
    /// Population mean when available, otherwise reference genotype (0)
    #[default]
    PopulationMeanThenReference,
    /// Always reference genotype (0)
    Reference,
}

/// One SNP's share of the raw score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnpContribution {
    pub rsid: String,
    pub position: u64,
    /// Called dosage, or the imputed population mean
    pub dosage: f64,
    pub weight: f64,
    /// weight × dosage
    pub contribution: f64,
    #[serde(rename = "trait")]
    pub trait_label: String,
    /// True when `dosage` came from population-mean imputation
    #[serde(default)]
    pub imputed: bool,
}

/// Raw polygenic score for one individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub raw_score: f64,

    /// Sorted by descending absolute contribution
    pub contributions: Vec<SnpContribution>,

    /// SNPs found in the stream (including missing calls)
    pub matched: usize,

    /// SNPs in the position index
    pub total_targeted: usize,

    /// Matched SNPs whose genotype could not be called
    pub missing_calls: usize,

    /// SNPs scored from population means
    pub imputed: usize,
}

impl ScoreReport {
    /// The `n` most contributing variants
    pub fn top_contributors(&self, n: usize) -> &[SnpContribution] {
        &self.contributions[..n.min(self.contributions.len())]
    }

    /// Fraction of targeted SNPs found in the stream
    pub fn match_rate(&self) -> f64 {
        if self.total_targeted == 0 {
            0.0
        } else {
            self.matched as f64 / self.total_targeted as f64
        }
    }
}

/// Frozen reference-population distribution of raw scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    #[serde(alias = "mean_prs")]
    pub mean: f64,

    #[serde(alias = "std_prs")]
    pub std_dev: f64,

    #[serde(alias = "n_samples")]
    pub sample_count: usize,

    #[serde(alias = "n_snps_used")]
    pub snps_used: usize,

    #[serde(default, alias = "median_prs", skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,

    #[serde(default, alias = "min_prs", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, alias = "max_prs", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PopulationStats {
    pub fn new(mean: f64, std_dev: f64, sample_count: usize, snps_used: usize) -> Self {
        Self {
            mean,
            std_dev,
            sample_count,
            snps_used,
            median: None,
            min: None,
            max: None,
        }
    }
}

/// Discrete risk category derived from percentile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    /// Upper bound (exclusive) of the Low tier
    pub const LOW_CUTOFF: f64 = 40.0;
    /// Upper bound (exclusive) of the Moderate tier
    pub const MODERATE_CUTOFF: f64 = 75.0;

    /// [0,40) Low, [40,75) Moderate, [75,100] High
    pub fn from_percentile(percentile: f64) -> Self {
        if percentile < Self::LOW_CUTOFF {
            RiskTier::Low
        } else if percentile < Self::MODERATE_CUTOFF {
            RiskTier::Moderate
        } else {
            RiskTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Moderate => "Moderate",
            RiskTier::High => "High",
        }
    }
}

/// Raw score placed on the reference distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReport {
    pub raw_score: f64,
    pub z_score: f64,
    /// 0-100
    pub percentile: f64,
    pub risk_tier: RiskTier,
}

/// Simulated training target for one individual
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiabilityLabel {
    pub liability: f64,
    pub disease_probability: f64,
    pub label: u8,
}

/// Classifier input in the model's own feature order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    /// Features taken from an observed call (or the score itself)
    pub matched: usize,
    /// Features filled from a population mean
    pub imputed_population_mean: usize,
    /// Features filled with the reference genotype
    pub imputed_reference: usize,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn imputed(&self) -> usize {
        self.imputed_population_mean + self.imputed_reference
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_cut_points() {
        assert_eq!(RiskTier::from_percentile(0.0), RiskTier::Low);
        assert_eq!(RiskTier::from_percentile(39.999), RiskTier::Low);
        assert_eq!(RiskTier::from_percentile(40.0), RiskTier::Moderate);
        assert_eq!(RiskTier::from_percentile(74.999), RiskTier::Moderate);
        assert_eq!(RiskTier::from_percentile(75.0), RiskTier::High);
        assert_eq!(RiskTier::from_percentile(100.0), RiskTier::High);
    }

    #[test]
    fn test_dosage_value() {
        assert_eq!(Dosage::HOM_REF.value(), Some(0.0));
        assert_eq!(Dosage::HET.value(), Some(1.0));
        assert_eq!(Dosage::HOM_ALT.value(), Some(2.0));
        assert_eq!(Dosage::Missing.value(), None);
    }

    #[test]
    fn test_observation_counts() {
        let obs: GenotypeObservation = vec![
            ("rsA", Dosage::HET),
            ("rsB", Dosage::Missing),
        ]
        .into_iter()
        .collect();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs.missing_count(), 1);
        assert_eq!(obs.called_value("rsA"), Some(1.0));
        assert_eq!(obs.called_value("rsB"), None);
        assert_eq!(obs.called_value("rsC"), None);
    }

    #[test]
    fn test_population_stats_accepts_legacy_keys() {
        let json = r#"{"mean_prs": 0.12, "std_prs": 0.5, "n_samples": 2504, "n_snps_used": 40, "median_prs": 0.1}"#;
        let stats: PopulationStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.mean, 0.12);
        assert_eq!(stats.std_dev, 0.5);
        assert_eq!(stats.sample_count, 2504);
        assert_eq!(stats.snps_used, 40);
        assert_eq!(stats.median, Some(0.1));
        assert_eq!(stats.min, None);
    }

    #[test]
    fn test_top_contributors_clamps() {
        let report = ScoreReport {
            raw_score: 0.0,
            contributions: Vec::new(),
            matched: 0,
            total_targeted: 3,
            missing_calls: 0,
            imputed: 0,
        };
        assert!(report.top_contributors(10).is_empty());
        assert_eq!(report.match_rate(), 0.0);
    }
}
