// ==============================================================================
// main.rs - PRS Engine Entry Point
// ==============================================================================
// Description: Command-line adapter for scoring, reference stats and label simulation
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prs_engine::config::PipelineConfig;
use prs_engine::inference::InferenceAssembler;
use prs_engine::label_simulator::LabelSimulator;
use prs_engine::models::{FeatureImputation, ScoreImputation};
use prs_engine::output::{label_rows, write_json, write_table};
use prs_engine::parsers::{
    load_population_stats, save_population_stats, CohortScore, ScoreTableParser, WeightTableParser,
};
use prs_engine::position_index::{DuplicatePolicy, PositionIndex};
use prs_engine::processor::{cohort_population_stats, score_files, ScoringPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, env = "PRS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "PRS_JSON_LOGS", global = true)]
    json_logs: bool,

    /// Duplicate position handling in weight tables (reject or last-wins)
    #[arg(long, env = "PRS_DUPLICATE_POLICY", global = true)]
    duplicate_policy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one individual and place them on the reference population
    Score {
        /// Weight table (JSON or CSV)
        #[arg(short, long, env = "PRS_WEIGHTS")]
        weights: PathBuf,

        /// Reference population statistics (JSON)
        #[arg(short, long, env = "PRS_POPULATION")]
        population: PathBuf,

        /// Variant calls (.vcf, .vcf.gz or .bgz)
        #[arg(long)]
        vcf: PathBuf,

        /// Classifier feature order (JSON); adds a feature vector to the report
        #[arg(long, env = "PRS_FEATURE_ORDER")]
        feature_order: Option<PathBuf>,

        /// Zero-based sample column
        #[arg(long)]
        sample_index: Option<usize>,

        /// Missing-call handling for the score (exclude or population-mean)
        #[arg(long)]
        score_imputation: Option<String>,

        /// Contributors listed in the report
        #[arg(long)]
        top_n: Option<usize>,

        /// Report output path (JSON)
        #[arg(short, long, default_value = "prs_report.json")]
        output: PathBuf,

        /// Also write every contribution (.csv or .json)
        #[arg(long)]
        contributions: Option<PathBuf>,
    },

    /// Score a reference cohort and compute population statistics
    PopulationStats {
        #[arg(short, long, env = "PRS_WEIGHTS")]
        weights: PathBuf,

        /// Cohort VCF files
        #[arg(required = true)]
        vcfs: Vec<PathBuf>,

        /// Statistics output path (JSON)
        #[arg(short, long, default_value = "population_stats.json")]
        output: PathBuf,

        /// Also write per-sample raw and z scores (.csv or .json)
        #[arg(long)]
        scores_table: Option<PathBuf>,

        /// Also write the weights actually used (JSON)
        #[arg(long)]
        weights_out: Option<PathBuf>,
    },

    /// Simulate liability-threshold training labels from cohort scores
    SimulateLabels {
        /// Score table (CSV: sample_id, prs_raw[, z_score])
        #[arg(short, long)]
        scores: PathBuf,

        #[arg(long, env = "PRS_HERITABILITY")]
        heritability: Option<f64>,

        #[arg(long, env = "PRS_PREVALENCE")]
        prevalence: Option<f64>,

        #[arg(long, env = "PRS_SEED")]
        seed: Option<u64>,

        /// Label table output path (.csv or .json)
        #[arg(short, long, default_value = "labels.csv")]
        output: PathBuf,

        /// Also write the batch summary (JSON)
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Assemble a classifier input vector for one individual
    Features {
        #[arg(short, long, env = "PRS_WEIGHTS")]
        weights: PathBuf,

        #[arg(long)]
        vcf: PathBuf,

        /// Classifier feature order (JSON)
        #[arg(long, env = "PRS_FEATURE_ORDER")]
        feature_order: PathBuf,

        /// Missing-feature handling (population-mean or reference)
        #[arg(long)]
        feature_imputation: Option<String>,

        #[arg(short, long, default_value = "features.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prs_engine=info".into()),
        )
        .with(args.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    info!("PRS Engine starting...");

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(policy) = &args.duplicate_policy {
        config.duplicate_policy = parse_duplicate_policy(policy);
    }

    match args.command {
        Command::Score {
            weights,
            population,
            vcf,
            feature_order,
            sample_index,
            score_imputation,
            top_n,
            output,
            contributions,
        } => {
            if let Some(sample_index) = sample_index {
                config.sample_index = sample_index;
            }
            if let Some(policy) = score_imputation {
                config.score_imputation = parse_score_imputation(&policy);
            }
            if let Some(top_n) = top_n {
                config.top_n = top_n;
            }

            let index = load_index(&weights, config.duplicate_policy)?;
            let stats = load_population_stats(&population)
                .with_context(|| format!("Failed to load population stats {}", population.display()))?;
            let order = feature_order.as_deref().map(load_feature_order).transpose()?;

            let pipeline = ScoringPipeline::new(config, index)
                .with_population(stats)
                .context("Reference population rejected")?;

            let analysis = match pipeline.analyze_path(&vcf, order.as_deref()) {
                Ok(analysis) => analysis,
                Err(e) if e.is_insufficient_data() => {
                    warn!("Insufficient genotype data: {}", e);
                    return Err(e).context("None of the model's SNPs were found in the upload");
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to score {}", vcf.display())),
            };

            write_json(&output, &analysis).context("Failed to write report")?;
            if let Some(path) = contributions {
                write_table(&path, &analysis.score.contributions)
                    .context("Failed to write contributions")?;
            }

            info!(
                "Percentile {:.1} ({} risk), {} / {} SNPs matched",
                analysis.normalized.percentile,
                analysis.normalized.risk_tier.as_str(),
                analysis.score.matched,
                analysis.score.total_targeted
            );
        }

        Command::PopulationStats {
            weights,
            vcfs,
            output,
            scores_table,
            weights_out,
        } => {
            let index = load_index(&weights, config.duplicate_policy)?;
            let snps_used = index.len();
            if let Some(path) = weights_out {
                WeightTableParser::write_json(&path, &index).context("Failed to write weights")?;
            }

            let entries = score_files(vcfs, index, config).await;
            let stats = cohort_population_stats(&entries, snps_used)
                .context("Cannot derive population statistics from this cohort")?;
            save_population_stats(&output, &stats).context("Failed to write population stats")?;

            if let Some(path) = scores_table {
                let rows: Vec<CohortScore> = entries
                    .iter()
                    .filter_map(|e| e.result.as_ref().ok())
                    .map(|s| CohortScore {
                        sample_id: s.sample.clone(),
                        prs_raw: s.score.raw_score,
                        z_score: Some((s.score.raw_score - stats.mean) / stats.std_dev),
                    })
                    .collect();
                write_table(&path, &rows).context("Failed to write cohort scores")?;
            }
        }

        Command::SimulateLabels {
            scores,
            heritability,
            prevalence,
            seed,
            output,
            summary,
        } => {
            let sim = config.simulation;
            let simulator = LabelSimulator::new(
                heritability.unwrap_or(sim.heritability),
                prevalence.unwrap_or(sim.prevalence),
                seed.unwrap_or(sim.seed),
            )?;

            let cohort = ScoreTableParser::parse(&scores)
                .with_context(|| format!("Failed to read scores {}", scores.display()))?;
            let outcome = simulator.simulate(&cohort.simulation_input())?;

            let rows = label_rows(&cohort.sample_ids(), &outcome.normalized_scores, &outcome.labels)?;
            write_table(&output, &rows).context("Failed to write labels")?;
            if let Some(path) = summary {
                write_json(&path, &outcome.summary).context("Failed to write summary")?;
            }
        }

        Command::Features {
            weights,
            vcf,
            feature_order,
            feature_imputation,
            output,
        } => {
            if let Some(policy) = feature_imputation {
                config.feature_imputation = parse_feature_imputation(&policy);
            }

            let index = load_index(&weights, config.duplicate_policy)?;
            let order = load_feature_order(&feature_order)?;
            let pipeline = ScoringPipeline::new(config, index);

            let individual = pipeline
                .score_path(&vcf)
                .with_context(|| format!("Failed to score {}", vcf.display()))?;
            let features = InferenceAssembler::new(
                pipeline.config().score_feature.clone(),
                pipeline.config().feature_imputation,
            )
            .assemble(
                &order,
                &individual.observation,
                individual.score.raw_score,
                &pipeline.index().population_means(),
            );

            write_json(&output, &features).context("Failed to write features")?;
        }
    }

    info!("Done");
    Ok(())
}

fn load_index(path: &Path, policy: DuplicatePolicy) -> Result<Arc<PositionIndex>> {
    let index = WeightTableParser::load_index(path, policy)
        .with_context(|| format!("Failed to load weight table {}", path.display()))?;
    Ok(Arc::new(index))
}

/// Feature order is a JSON array of names, or model metadata carrying one
fn load_feature_order(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature order {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text).context("Feature order is not JSON")?;

    let names = match value {
        serde_json::Value::Object(mut map) => map
            .remove("feature_names")
            .context("Model metadata has no 'feature_names'")?,
        other => other,
    };
    serde_json::from_value(names).context("Feature order must be a list of strings")
}

fn parse_duplicate_policy(value: &str) -> DuplicatePolicy {
    match value.to_lowercase().as_str() {
        "reject" => DuplicatePolicy::Reject,
        "last-wins" | "lastwins" => DuplicatePolicy::LastWins,
        _ => {
            warn!("Invalid duplicate policy '{}', using reject", value);
            DuplicatePolicy::Reject
        }
    }
}

fn parse_score_imputation(value: &str) -> ScoreImputation {
    match value.to_lowercase().as_str() {
        "exclude" => ScoreImputation::Exclude,
        "population-mean" | "mean" => ScoreImputation::PopulationMean,
        _ => {
            warn!("Invalid score imputation '{}', using exclude", value);
            ScoreImputation::Exclude
        }
    }
}

fn parse_feature_imputation(value: &str) -> FeatureImputation {
    match value.to_lowercase().as_str() {
        "population-mean" | "mean" => FeatureImputation::PopulationMeanThenReference,
        "reference" | "zero" => FeatureImputation::Reference,
        _ => {
            warn!("Invalid feature imputation '{}', using population-mean", value);
            FeatureImputation::PopulationMeanThenReference
        }
    }
}
