// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for variant calls, PRS weight tables and score tables
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod vcf;
pub mod weights;
pub mod population;
pub mod scores;

pub use vcf::{open_stream, ScanError, ScanOutcome, ScanStats, VariantStreamScanner};
pub use weights::{WeightTableError, WeightTableParser};
pub use population::{load_population_stats, save_population_stats, PopulationStatsError};
pub use scores::{CohortScore, CohortScores, ScoreTableError, ScoreTableParser};
