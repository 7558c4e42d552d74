// ==============================================================================
// parsers/vcf.rs - Streaming VCF Scanner
// ==============================================================================
// Description: Line-by-line scan of (optionally gzipped) VCF streams for target positions
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// References:
// - VCF 4.2 Spec: https://samtools.github.io/hts-specs/VCFv4.2.pdf
// - BGZF is a series of gzip members, so MultiGzDecoder reads .vcf.gz and .bgz alike
// ==============================================================================

use flate2::read::MultiGzDecoder;
use serde::Serialize;
use std::io::{BufRead, BufReader, Read};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::genotype_converter::decode_genotype;
use crate::models::GenotypeObservation;
use crate::position_index::PositionIndex;

/// Gzip member magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// CHROM POS ID REF ALT QUAL FILTER INFO FORMAT
const FIXED_COLUMNS: usize = 9;

/// Read buffer for decompressed streams
const STREAM_BUFFER_SIZE: usize = 1024 * 1024;

/// VCF scanning errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to open variant stream: {0}")]
    StreamOpen(String),
}

/// Counters collected during one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Every line read, headers included
    pub lines_scanned: usize,
    /// Data (non-comment) lines read
    pub data_lines: usize,
    /// Target positions found
    pub matched: usize,
    /// Lines skipped as unparseable: an unreadable POS column, or a target
    /// line without the selected sample column. Other columns of non-target
    /// lines are never inspected, so short non-target lines are not counted.
    pub malformed: usize,
    /// Sample count announced by the #CHROM header, if present
    pub header_samples: Option<usize>,
    /// True if the scan stopped before end-of-stream
    pub early_exit: bool,
}

/// Result of scanning one individual's stream
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub observation: GenotypeObservation,
    pub stats: ScanStats,
}

/// True if the filename hint says the stream is gzip/bgzip compressed
pub fn is_compressed_hint(filename_hint: &str) -> bool {
    let lower = filename_hint.to_ascii_lowercase();
    lower.ends_with(".gz") || lower.ends_with(".bgz")
}

/// Wrap a raw byte stream in a buffered line reader
///
/// The filename is used only to decide decompression. Compressed streams are
/// checked for the gzip magic up front so a mislabelled upload fails here
/// instead of half-way through the scan.
pub fn open_stream<'a, R: Read + 'a>(
    reader: R,
    filename_hint: &str,
) -> Result<Box<dyn BufRead + 'a>, ScanError> {
    if !is_compressed_hint(filename_hint) {
        return Ok(Box::new(BufReader::with_capacity(STREAM_BUFFER_SIZE, reader)));
    }

    let mut raw = BufReader::new(reader);
    let head = raw
        .fill_buf()
        .map_err(|e| ScanError::StreamOpen(format!("{}: {}", filename_hint, e)))?;

    if head.len() < GZIP_MAGIC.len() || head[..GZIP_MAGIC.len()] != GZIP_MAGIC {
        return Err(ScanError::StreamOpen(format!(
            "{}: not gzip-compressed (magic number mismatch)",
            filename_hint
        )));
    }

    debug!("Decompressing {} as gzip/bgzip", filename_hint);
    Ok(Box::new(BufReader::with_capacity(
        STREAM_BUFFER_SIZE,
        MultiGzDecoder::new(raw),
    )))
}

/// Streaming scanner for one sample column of a VCF
#[derive(Debug, Clone)]
pub struct VariantStreamScanner {
    /// Zero-based sample column to decode (0 = first sample)
    pub sample_index: usize,
}

impl Default for VariantStreamScanner {
    fn default() -> Self {
        Self { sample_index: 0 }
    }
}

impl VariantStreamScanner {
    /// Create a scanner reading the first sample
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a different sample column
    pub fn with_sample_index(mut self, sample_index: usize) -> Self {
        self.sample_index = sample_index;
        self
    }

    /// Scan a buffered stream for every position in `index`
    ///
    /// Stops as soon as all target positions have been seen. Malformed lines
    /// are counted and skipped; only I/O or decompression failures are fatal.
    ///
    /// # Example
    /// ```
    /// use prs_engine::models::{Dosage, SnpRecord};
    /// use prs_engine::parsers::VariantStreamScanner;
    /// use prs_engine::position_index::PositionIndex;
    ///
    /// let index = PositionIndex::new(vec![SnpRecord::new("rsA", 100, 0.5, "T2D")])?;
    /// let vcf = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
    ///            1\t100\trsA\tA\tG\t.\tPASS\t.\tGT\t0/1\n";
    /// let outcome = VariantStreamScanner::new().scan(vcf.as_bytes(), &index)?;
    /// assert_eq!(outcome.observation.get("rsA"), Some(Dosage::Called(1)));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn scan<R: BufRead>(&self, mut reader: R, index: &PositionIndex) -> Result<ScanOutcome, ScanError> {
        let mut outstanding = index.outstanding();
        let mut observation = GenotypeObservation::new();
        let mut stats = ScanStats::default();
        let mut line = Vec::with_capacity(4096);

        info!(
            "Scanning variant stream for {} target positions (sample column {})",
            outstanding.len(),
            self.sample_index
        );

        if outstanding.is_empty() {
            stats.early_exit = true;
            return Ok(ScanOutcome { observation, stats });
        }

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).map_err(|e| {
                ScanError::StreamOpen(format!(
                    "read failed after {} lines: {}",
                    stats.lines_scanned, e
                ))
            })?;
            if read == 0 {
                break;
            }
            stats.lines_scanned += 1;

            let content = trim_line_end(&line);
            if content.is_empty() {
                continue;
            }

            if content[0] == b'#' {
                if content.starts_with(b"#CHROM") {
                    let columns = content.split(|&b| b == b'\t').count();
                    let samples = columns.saturating_sub(FIXED_COLUMNS);
                    info!("Variant stream contains {} sample(s)", samples);
                    if self.sample_index >= samples {
                        warn!(
                            "Sample column {} requested but header lists {} sample(s)",
                            self.sample_index, samples
                        );
                    }
                    stats.header_samples = Some(samples);
                }
                continue;
            }

            stats.data_lines += 1;

            // Cheap path: only the POS column is parsed for non-target lines
            let position = match parse_position(content) {
                Some(pos) => pos,
                None => {
                    stats.malformed += 1;
                    continue;
                }
            };

            if !outstanding.contains(position) {
                continue;
            }

            let sample_field = match sample_column(content, self.sample_index) {
                Some(field) => field,
                None => {
                    debug!("Target position {} lacks sample column {}", position, self.sample_index);
                    stats.malformed += 1;
                    continue;
                }
            };

            let Some(snp) = index.get(position) else {
                continue;
            };
            let dosage = decode_genotype(&String::from_utf8_lossy(sample_field));
            observation.insert(snp.rsid.clone(), dosage);
            outstanding.remove(position);
            stats.matched += 1;

            if outstanding.is_empty() {
                stats.early_exit = true;
                debug!("All target positions found at line {}", stats.lines_scanned);
                break;
            }
        }

        if stats.malformed > 0 {
            warn!("Skipped {} malformed variant lines", stats.malformed);
        }
        info!(
            "Scanned {} variant lines, matched {} / {} target SNPs",
            stats.data_lines,
            stats.matched,
            index.len()
        );

        Ok(ScanOutcome { observation, stats })
    }

    /// Open a raw stream (decompressing per the filename hint) and scan it
    pub fn scan_stream<R: Read>(
        &self,
        reader: R,
        filename_hint: &str,
        index: &PositionIndex,
    ) -> Result<ScanOutcome, ScanError> {
        let buffered = open_stream(reader, filename_hint)?;
        self.scan(buffered, index)
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// Parse the POS column without tokenising the rest of the line
fn parse_position(line: &[u8]) -> Option<u64> {
    let mut fields = line.splitn(3, |&b| b == b'\t');
    let _chrom = fields.next()?;
    let pos = fields.next()?;
    std::str::from_utf8(pos).ok()?.trim().parse().ok()
}

/// Full tokenisation, only for lines at a target position
fn sample_column(line: &[u8], sample_index: usize) -> Option<&[u8]> {
    line.split(|&b| b == b'\t').nth(FIXED_COLUMNS + sample_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dosage, SnpRecord};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{self, Write};

    const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample1\tsample2\n";

    fn index() -> PositionIndex {
        PositionIndex::new(vec![
            SnpRecord::new("rsA", 100, 0.5, "T2D"),
            SnpRecord::new("rsB", 200, -0.3, "T2D"),
        ])
        .unwrap()
    }

    fn data_line(pos: u64, gt1: &str, gt2: &str) -> String {
        format!("1\t{}\t.\tA\tG\t.\tPASS\t.\tGT\t{}\t{}\n", pos, gt1, gt2)
    }

    /// Reader that fails if it is ever polled
    struct Poisoned;

    impl Read for Poisoned {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "read past early exit"))
        }
    }

    #[test]
    fn test_scan_matches_targets() {
        let vcf = format!(
            "{}{}{}{}",
            HEADER,
            data_line(50, "1/1", "1/1"),
            data_line(100, "0/1", "0/0"),
            data_line(200, "1/1", "0|1"),
        );

        let outcome = VariantStreamScanner::new().scan(vcf.as_bytes(), &index()).unwrap();

        assert_eq!(outcome.observation.get("rsA"), Some(Dosage::Called(1)));
        assert_eq!(outcome.observation.get("rsB"), Some(Dosage::Called(2)));
        assert_eq!(outcome.observation.len(), 2);
        assert_eq!(outcome.stats.matched, 2);
        assert_eq!(outcome.stats.data_lines, 3);
        assert_eq!(outcome.stats.header_samples, Some(2));
        assert!(outcome.stats.early_exit);
    }

    #[test]
    fn test_second_sample_column() {
        let vcf = format!("{}{}{}", HEADER, data_line(100, "0/1", "0/0"), data_line(200, "1/1", "0|1"));

        let outcome = VariantStreamScanner::new()
            .with_sample_index(1)
            .scan(vcf.as_bytes(), &index())
            .unwrap();

        assert_eq!(outcome.observation.get("rsA"), Some(Dosage::Called(0)));
        assert_eq!(outcome.observation.get("rsB"), Some(Dosage::Called(1)));
    }

    #[test]
    fn test_early_exit_stops_reading() {
        let prefix = format!("{}{}{}", HEADER, data_line(100, "0/1", "0/0"), data_line(200, "1/1", "0/0"));
        let reader = BufReader::new(io::Cursor::new(prefix.into_bytes()).chain(Poisoned));

        let outcome = VariantStreamScanner::new().scan(reader, &index()).unwrap();

        assert!(outcome.stats.early_exit);
        assert_eq!(outcome.stats.lines_scanned, 4);
    }

    #[test]
    fn test_runs_to_end_when_targets_absent() {
        let vcf = format!("{}{}{}", HEADER, data_line(100, "0/1", "0/0"), data_line(300, "1/1", "0/0"));

        let outcome = VariantStreamScanner::new().scan(vcf.as_bytes(), &index()).unwrap();

        assert!(!outcome.stats.early_exit);
        assert_eq!(outcome.stats.matched, 1);
        assert!(outcome.observation.get("rsB").is_none());
    }

    #[test]
    fn test_malformed_lines_are_counted() {
        let vcf = format!(
            "{}1\tnotanumber\t.\tA\tG\n1\n1\t200\t.\tA\tG\t.\tPASS\t.\tGT\n{}",
            HEADER,
            data_line(200, "1/1", "0/0"),
        );

        let outcome = VariantStreamScanner::new().scan(vcf.as_bytes(), &index()).unwrap();

        // Bad POS, missing POS, target line without sample column
        assert_eq!(outcome.stats.malformed, 3);
        assert_eq!(outcome.observation.get("rsB"), Some(Dosage::Called(2)));
    }

    #[test]
    fn test_short_non_target_lines_are_not_counted() {
        // Readable POS that is not a target: the rest of the line is never split
        let vcf = format!("{}1\t999\t.\tA\n{}", HEADER, data_line(200, "1/1", "0/0"));

        let outcome = VariantStreamScanner::new().scan(vcf.as_bytes(), &index()).unwrap();

        assert_eq!(outcome.stats.malformed, 0);
        assert_eq!(outcome.observation.get("rsB"), Some(Dosage::Called(2)));
    }

    #[test]
    fn test_missing_genotype_still_counts_as_matched() {
        let vcf = format!("{}{}", HEADER, data_line(100, "./.", "0/0"));

        let outcome = VariantStreamScanner::new().scan(vcf.as_bytes(), &index()).unwrap();

        assert_eq!(outcome.observation.get("rsA"), Some(Dosage::Missing));
        assert_eq!(outcome.stats.matched, 1);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let vcf = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\r\n\r\n1\t100\t.\tA\tG\t.\tPASS\t.\tGT\t1|1\r\n";

        let outcome = VariantStreamScanner::new().scan(vcf.as_bytes(), &index()).unwrap();

        assert_eq!(outcome.observation.get("rsA"), Some(Dosage::Called(2)));
        assert_eq!(outcome.stats.header_samples, Some(1));
    }

    #[test]
    fn test_gzip_stream() {
        let vcf = format!("{}{}{}", HEADER, data_line(100, "0/1", "0/0"), data_line(200, "1/1", "0/0"));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(vcf.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let outcome = VariantStreamScanner::new()
            .scan_stream(compressed.as_slice(), "upload.vcf.gz", &index())
            .unwrap();

        assert_eq!(outcome.observation.len(), 2);
    }

    #[test]
    fn test_plain_text_labelled_gz_fails_to_open() {
        let vcf = format!("{}{}", HEADER, data_line(100, "0/1", "0/0"));

        let result = VariantStreamScanner::new().scan_stream(vcf.as_bytes(), "upload.vcf.gz", &index());

        assert!(matches!(result, Err(ScanError::StreamOpen(_))));
    }

    #[test]
    fn test_corrupt_gzip_body_fails() {
        let mut bytes = vec![0x1f, 0x8b, 0x08, 0x00];
        bytes.extend_from_slice(&[0xff; 64]);

        let result = VariantStreamScanner::new().scan_stream(bytes.as_slice(), "upload.vcf.gz", &index());

        assert!(matches!(result, Err(ScanError::StreamOpen(_))));
    }

    #[test]
    fn test_compression_hint() {
        assert!(is_compressed_hint("chr1.vcf.gz"));
        assert!(is_compressed_hint("CHR1.VCF.GZ"));
        assert!(is_compressed_hint("chr1.vcf.bgz"));
        assert!(!is_compressed_hint("chr1.vcf"));
        assert!(!is_compressed_hint(""));
    }
}
