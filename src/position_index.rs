// ==============================================================================
// position_index.rs - Target Position Lookup
// ==============================================================================
// Description: Immutable position → SNP index plus per-scan outstanding set
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::SnpRecord;

/// Errors raised while building a position index
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Duplicate position {position}: '{existing}' and '{duplicate}'")]
    DuplicatePosition {
        position: u64,
        existing: String,
        duplicate: String,
    },

    #[error("SNP identifier '{rsid}' appears at positions {first} and {second}")]
    DuplicateIdentifier { rsid: String, first: u64, second: u64 },
}

/// What to do when two weight-table rows share a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail with `IndexError::DuplicatePosition`
    #[default]
    Reject,
    /// Keep the later row (legacy table behaviour)
    LastWins,
}

/// Read-only position → SNP lookup, built once per run
///
/// Safe to share across threads; scans take their own
/// [`OutstandingPositions`] via [`PositionIndex::outstanding`].
#[derive(Debug, Clone, Default)]
pub struct PositionIndex {
    records: Vec<SnpRecord>,
    by_position: HashMap<u64, usize>,
    by_rsid: HashMap<String, usize>,
}

impl PositionIndex {
    /// Build an index, rejecting duplicate positions
    pub fn new(records: impl IntoIterator<Item = SnpRecord>) -> Result<Self, IndexError> {
        Self::build(records, DuplicatePolicy::Reject)
    }

    /// Build an index with an explicit duplicate policy
    pub fn build(
        records: impl IntoIterator<Item = SnpRecord>,
        policy: DuplicatePolicy,
    ) -> Result<Self, IndexError> {
        let mut index = Self::default();

        for record in records {
            if let Some(&slot) = index.by_position.get(&record.position) {
                let existing = &index.records[slot];
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(IndexError::DuplicatePosition {
                            position: record.position,
                            existing: existing.rsid.clone(),
                            duplicate: record.rsid,
                        });
                    }
                    DuplicatePolicy::LastWins => {
                        warn!(
                            "Position {} listed twice ('{}' replaced by '{}')",
                            record.position, existing.rsid, record.rsid
                        );
                        let old_rsid = existing.rsid.clone();
                        index.by_rsid.remove(&old_rsid);
                        index.check_identifier(&record, Some(slot))?;
                        index.by_rsid.insert(record.rsid.clone(), slot);
                        index.records[slot] = record;
                        continue;
                    }
                }
            }

            index.check_identifier(&record, None)?;
            let slot = index.records.len();
            index.by_position.insert(record.position, slot);
            index.by_rsid.insert(record.rsid.clone(), slot);
            index.records.push(record);
        }

        debug!("Built position index with {} SNPs", index.records.len());
        Ok(index)
    }

    fn check_identifier(&self, record: &SnpRecord, replacing: Option<usize>) -> Result<(), IndexError> {
        match self.by_rsid.get(&record.rsid) {
            Some(&slot) if Some(slot) != replacing => Err(IndexError::DuplicateIdentifier {
                rsid: record.rsid.clone(),
                first: self.records[slot].position,
                second: record.position,
            }),
            _ => Ok(()),
        }
    }

    /// O(1) lookup by position
    pub fn get(&self, position: u64) -> Option<&SnpRecord> {
        self.by_position.get(&position).map(|&slot| &self.records[slot])
    }

    /// O(1) lookup by SNP identifier
    pub fn get_by_rsid(&self, rsid: &str) -> Option<&SnpRecord> {
        self.by_rsid.get(rsid).map(|&slot| &self.records[slot])
    }

    pub fn contains(&self, position: u64) -> bool {
        self.by_position.contains_key(&position)
    }

    /// Weight-table order rank of an identifier
    pub fn rank_of(&self, rsid: &str) -> Option<usize> {
        self.by_rsid.get(rsid).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in weight-table order
    pub fn records(&self) -> impl Iterator<Item = &SnpRecord> {
        self.records.iter()
    }

    /// Curated population mean dosages keyed by identifier
    pub fn population_means(&self) -> HashMap<String, f64> {
        self.records
            .iter()
            .filter_map(|r| r.population_mean.map(|m| (r.rsid.clone(), m)))
            .collect()
    }

    /// Fresh mutable copy of every target position, owned by one scan
    pub fn outstanding(&self) -> OutstandingPositions {
        OutstandingPositions {
            remaining: self.by_position.keys().copied().collect(),
        }
    }
}

/// Positions not yet observed during a single scan
#[derive(Debug, Clone)]
pub struct OutstandingPositions {
    remaining: HashSet<u64>,
}

impl OutstandingPositions {
    pub fn contains(&self, position: u64) -> bool {
        self.remaining.contains(&position)
    }

    /// Mark a position as found; returns false if it was not outstanding
    pub fn remove(&mut self, position: u64) -> bool {
        self.remaining.remove(&position)
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
