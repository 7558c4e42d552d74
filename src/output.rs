// ==============================================================================
// output.rs - Report Output Generation
// ==============================================================================
// Description: JSON reports and CSV tables for scores, contributions and labels
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::models::LiabilityLabel;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON (web APIs, model metadata)
    Json,
    /// Comma-separated table (spreadsheets, training pipelines)
    Csv,
}

impl OutputFormat {
    /// Pick a format from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV writing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Column length mismatch: {0}")]
    LengthMismatch(String),
}

/// One row of a simulated training-label table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    pub sample_id: String,
    pub prs_z: f64,
    pub liability: f64,
    pub disease_probability: f64,
    pub disease_label: u8,
}

fn create(path: &Path) -> Result<BufWriter<File>, OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write any report as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<(), OutputError> {
    let path = path.as_ref();
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("JSON written: {}", path.display());
    Ok(())
}

/// Write CSV rows with a header derived from the row type
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<(), OutputError> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_writer(create(path)?);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("CSV written: {} ({} rows)", path.display(), rows.len());
    Ok(())
}

/// Write table rows as JSON or CSV, chosen by the path's extension
///
/// Paths without a recognised extension get CSV.
pub fn write_table<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<OutputFormat, OutputError> {
    let path = path.as_ref();
    let format = OutputFormat::from_path(path).unwrap_or(OutputFormat::Csv);
    match format {
        OutputFormat::Json => write_json(path, rows)?,
        OutputFormat::Csv => write_csv(path, rows)?,
    }
    Ok(format)
}

/// Zip sample ids, normalized scores and labels into table rows
pub fn label_rows(
    sample_ids: &[&str],
    normalized_scores: &[f64],
    labels: &[LiabilityLabel],
) -> Result<Vec<LabelRow>, OutputError> {
    if sample_ids.len() != labels.len() || normalized_scores.len() != labels.len() {
        return Err(OutputError::LengthMismatch(format!(
            "{} samples, {} scores, {} labels",
            sample_ids.len(),
            normalized_scores.len(),
            labels.len()
        )));
    }

    Ok(sample_ids
        .iter()
        .zip(normalized_scores)
        .zip(labels)
        .map(|((id, z), label)| LabelRow {
            sample_id: id.to_string(),
            prs_z: *z,
            liability: label.liability,
            disease_probability: label.disease_probability,
            disease_label: label.label,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PopulationStats, SnpContribution};
    use tempfile::tempdir;

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("a/report.JSON")), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_path(Path::new("labels.csv")), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_path(Path::new("labels")), None);
        assert_eq!(OutputFormat::from_path(Path::new("labels.tsv")), None);
    }

    #[test]
    fn test_output_format_serde() {
        let json = serde_json::to_string(&OutputFormat::Csv).unwrap();
        assert_eq!(json, "\"csv\"");
    }

    #[test]
    fn test_write_json_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/stats.json");

        write_json(&path, &PopulationStats::new(0.1, 0.9, 50, 12)).unwrap();

        let back: PopulationStats =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.sample_count, 50);
    }

    #[test]
    fn test_write_table_follows_extension() {
        let dir = tempdir().unwrap();
        let rows = label_rows(
            &["s1"],
            &[0.5],
            &[LiabilityLabel { liability: 0.25, disease_probability: 0.1, label: 0 }],
        )
        .unwrap();

        let json_path = dir.path().join("labels.json");
        assert_eq!(write_table(&json_path, &rows).unwrap(), OutputFormat::Json);
        let back: Vec<LabelRow> =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back, rows);

        let plain_path = dir.path().join("labels.out");
        assert_eq!(write_table(&plain_path, &rows).unwrap(), OutputFormat::Csv);
        let text = std::fs::read_to_string(&plain_path).unwrap();
        assert!(text.starts_with("sample_id,prs_z,liability,disease_probability,disease_label\n"));
    }

    #[test]
    fn test_contributions_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("contributions.csv");
        let rows = vec![SnpContribution {
            rsid: "rsB".to_string(),
            position: 200,
            dosage: 2.0,
            weight: -0.3,
            contribution: -0.6,
            trait_label: "T2D".to_string(),
            imputed: false,
        }];

        assert_eq!(write_table(&path, &rows).unwrap(), OutputFormat::Csv);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("rsid,position,dosage,weight,contribution,trait,imputed")
        );
        assert_eq!(lines.next(), Some("rsB,200,2.0,-0.3,-0.6,T2D,false"));
    }

    #[test]
    fn test_label_rows() {
        let labels = vec![
            LiabilityLabel { liability: 0.5, disease_probability: 0.2, label: 0 },
            LiabilityLabel { liability: 1.5, disease_probability: 0.6, label: 1 },
        ];

        let rows = label_rows(&["s1", "s2"], &[0.1, 1.2], &labels).unwrap();
        assert_eq!(rows[1].sample_id, "s2");
        assert_eq!(rows[1].disease_label, 1);
        assert_eq!(rows[0].prs_z, 0.1);

        assert!(matches!(
            label_rows(&["s1"], &[0.1, 1.2], &labels),
            Err(OutputError::LengthMismatch(_))
        ));
    }
}
