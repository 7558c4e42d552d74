// ==============================================================================
// parsers/weights.rs - SNP Weight Table Parser
// ==============================================================================
// Description: Loads curated position/weight tables (JSON or CSV) into SnpRecords
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// Formats:
//   JSON (object):  {"snps_used": 2, "weights": [{"rsid": "rs1", "chr": "1",
//                    "pos": 100, "beta": 0.5, "trait": "T2D", "pop_mean": 0.4}]}
//   JSON (array):   [{"rsid": "rs1", "pos": 100, "beta": 0.5, "trait": "T2D"}]
//   CSV:            rsid,chr,pos,beta,trait[,pop_mean]
// ==============================================================================

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::SnpRecord;
use crate::position_index::{DuplicatePolicy, IndexError, PositionIndex};

/// One row of a weight table as curated on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    pub rsid: String,

    #[serde(default, alias = "chrom", alias = "chromosome", skip_serializing_if = "Option::is_none")]
    pub chr: Option<String>,

    #[serde(alias = "position")]
    pub pos: u64,

    #[serde(alias = "weight", alias = "effect_weight")]
    pub beta: f64,

    #[serde(default, rename = "trait", alias = "trait_label")]
    pub trait_label: String,

    #[serde(default, alias = "population_mean", skip_serializing_if = "Option::is_none")]
    pub pop_mean: Option<f64>,
}

impl From<WeightRow> for SnpRecord {
    fn from(row: WeightRow) -> Self {
        SnpRecord {
            rsid: row.rsid,
            chromosome: row.chr,
            position: row.pos,
            weight: row.beta,
            trait_label: row.trait_label,
            population_mean: row.pop_mean,
        }
    }
}

impl From<&SnpRecord> for WeightRow {
    fn from(record: &SnpRecord) -> Self {
        WeightRow {
            rsid: record.rsid.clone(),
            chr: record.chromosome.clone(),
            pos: record.position,
            beta: record.weight,
            trait_label: record.trait_label.clone(),
            pop_mean: record.population_mean,
        }
    }
}

/// Weight file as written by the training pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightFile {
    #[serde(default)]
    pub snps_used: Option<usize>,
    pub weights: Vec<WeightRow>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WeightJson {
    File(WeightFile),
    Rows(Vec<WeightRow>),
}

/// Errors that can occur while loading a weight table
#[derive(Error, Debug)]
pub enum WeightTableError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Weight table is empty")]
    EmptyTable,

    #[error("Non-finite {field} for {rsid}: {value}")]
    InvalidValue {
        rsid: String,
        field: &'static str,
        value: f64,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Weight table parser
pub struct WeightTableParser;

impl WeightTableParser {
    /// Load a weight table, choosing JSON or CSV from the file extension
    pub fn parse(path: impl AsRef<Path>) -> Result<Vec<SnpRecord>, WeightTableError> {
        let path = path.as_ref();
        let file = BufReader::new(File::open(path)?);

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let records = if is_json {
            Self::parse_json(file)?
        } else {
            Self::parse_csv(file)?
        };

        info!("Loaded {} weighted SNPs from {}", records.len(), path.display());
        Ok(records)
    }

    /// Load a weight table and build the position index in one step
    pub fn load_index(
        path: impl AsRef<Path>,
        policy: DuplicatePolicy,
    ) -> Result<PositionIndex, WeightTableError> {
        let records = Self::parse(path)?;
        Ok(PositionIndex::build(records, policy)?)
    }

    /// Parse JSON weights (object with a "weights" array, or a bare array)
    pub fn parse_json<R: Read>(reader: R) -> Result<Vec<SnpRecord>, WeightTableError> {
        let rows = match serde_json::from_reader(reader)? {
            WeightJson::File(file) => {
                if let Some(declared) = file.snps_used {
                    if declared != file.weights.len() {
                        warn!(
                            "Weight file declares {} SNPs but lists {}",
                            declared,
                            file.weights.len()
                        );
                    }
                }
                file.weights
            }
            WeightJson::Rows(rows) => rows,
        };
        Self::finish(rows)
    }

    /// Parse CSV weights with a header row
    pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<SnpRecord>, WeightTableError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let row: WeightRow = result?;
            rows.push(row);
        }
        Self::finish(rows)
    }

    fn finish(rows: Vec<WeightRow>) -> Result<Vec<SnpRecord>, WeightTableError> {
        if rows.is_empty() {
            return Err(WeightTableError::EmptyTable);
        }

        for row in &rows {
            if !row.beta.is_finite() {
                return Err(WeightTableError::InvalidValue {
                    rsid: row.rsid.clone(),
                    field: "beta",
                    value: row.beta,
                });
            }
            if let Some(mean) = row.pop_mean {
                if !mean.is_finite() {
                    return Err(WeightTableError::InvalidValue {
                        rsid: row.rsid.clone(),
                        field: "pop_mean",
                        value: mean,
                    });
                }
            }
        }

        Ok(rows.into_iter().map(SnpRecord::from).collect())
    }

    /// Write the SNPs actually used for scoring, in the training pipeline's JSON layout
    pub fn write_json(path: impl AsRef<Path>, index: &PositionIndex) -> Result<(), WeightTableError> {
        let weights: Vec<WeightRow> = index.records().map(WeightRow::from).collect();
        let file = WeightFile {
            snps_used: Some(weights.len()),
            weights,
        };
        let writer = std::io::BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, &file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_json_object() {
        let json = r#"{
            "snps_used": 2,
            "weights": [
                {"rsid": "rsA", "chr": "1", "pos": 100, "beta": 0.5, "trait": "T2D", "pop_mean": 0.7},
                {"rsid": "rsB", "chr": "1", "pos": 200, "beta": -0.3, "trait": "T2D"}
            ]
        }"#;

        let records = WeightTableParser::parse_json(json.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rsid, "rsA");
        assert_eq!(records[0].chromosome.as_deref(), Some("1"));
        assert_eq!(records[0].population_mean, Some(0.7));
        assert_eq!(records[1].weight, -0.3);
        assert_eq!(records[1].population_mean, None);
    }

    #[test]
    fn test_parse_json_array() {
        let json = r#"[{"rsid": "rsA", "pos": 100, "beta": 0.5, "trait": "CAD"}]"#;
        let records = WeightTableParser::parse_json(json.as_bytes()).unwrap();
        assert_eq!(records, vec![SnpRecord::new("rsA", 100, 0.5, "CAD")]);
    }

    #[test]
    fn test_parse_csv() {
        let csv = "rsid,chr,pos,beta,trait,pop_mean\nrsA,1,100,0.5,T2D,0.7\nrsB,1,200,-0.3,T2D,\n";

        let records = WeightTableParser::parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position, 100);
        assert_eq!(records[0].population_mean, Some(0.7));
        assert_eq!(records[1].population_mean, None);
    }

    #[test]
    fn test_empty_table() {
        let result = WeightTableParser::parse_csv("rsid,chr,pos,beta,trait\n".as_bytes());
        assert!(matches!(result, Err(WeightTableError::EmptyTable)));
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let csv = "rsid,chr,pos,beta,trait\nrsA,1,abc,0.5,T2D\n";
        let result = WeightTableParser::parse_csv(csv.as_bytes());
        assert!(matches!(result, Err(WeightTableError::CsvError(_))));
    }

    #[test]
    fn test_load_index_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weights.csv");
        std::fs::write(&path, "rsid,chr,pos,beta,trait\nrsA,1,100,0.5,T2D\nrsB,1,100,0.1,T2D\n").unwrap();

        let result = WeightTableParser::load_index(&path, DuplicatePolicy::Reject);
        assert!(matches!(
            result,
            Err(WeightTableError::Index(IndexError::DuplicatePosition { position: 100, .. }))
        ));

        let index = WeightTableParser::load_index(&path, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(index.get(100).unwrap().rsid, "rsB");
    }

    #[test]
    fn test_write_then_parse_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snp_weights.json");
        let index = PositionIndex::new(vec![
            SnpRecord::new("rsA", 100, 0.5, "T2D").with_chromosome("1"),
            SnpRecord::new("rsB", 200, -0.3, "T2D").with_population_mean(1.2),
        ])
        .unwrap();

        WeightTableParser::write_json(&path, &index).unwrap();
        let records = WeightTableParser::parse(&path).unwrap();

        assert_eq!(records, index.records().cloned().collect::<Vec<_>>());
    }
}
