// ==============================================================================
// genotype_converter.rs - VCF Genotype to Dosage Conversion
// ==============================================================================
// Description: Decodes VCF GT fields into non-reference allele dosages
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// Algorithm:
//   Given the sample column of a VCF data line (e.g., "0|1:0.98:0,1,0"):
//   - GT is the first colon-delimited subfield
//   - Alleles are separated by "/" (unphased) or "|" (phased)
//   - 0/0 → 0, 0/1 or 1/0 → 1, 1/1 → 2
//   - Anything else ("./.", ".", "1/2", "A/G", haploid calls) → Missing
// ==============================================================================

use crate::models::Dosage;

/// Highest allele index the pipeline models (biallelic sites only)
const MAX_MODELED_ALLELE: u8 = 1;

/// Decode a VCF sample field into a dosage
///
/// Never fails: uploaded files are untrusted, so unparseable calls become
/// `Dosage::Missing` rather than aborting the scan.
///
/// # Examples
/// ```
/// use prs_engine::genotype_converter::decode_genotype;
/// use prs_engine::models::Dosage;
///
/// assert_eq!(decode_genotype("0/0"), Dosage::Called(0));
/// assert_eq!(decode_genotype("1|0:0.93"), Dosage::Called(1));
/// assert_eq!(decode_genotype("1/1"), Dosage::Called(2));
/// assert_eq!(decode_genotype("./."), Dosage::Missing);
/// ```
pub fn decode_genotype(sample_field: &str) -> Dosage {
    let gt = sample_field.split(':').next().unwrap_or("").trim();

    let mut alleles = gt.split(|c| c == '/' || c == '|');
    let (first, second) = match (alleles.next(), alleles.next(), alleles.next()) {
        (Some(a), Some(b), None) => (a, b),
        _ => return Dosage::Missing, // haploid, polyploid or empty
    };

    match (parse_allele(first), parse_allele(second)) {
        (Some(a), Some(b)) => Dosage::Called(a + b),
        _ => Dosage::Missing,
    }
}

/// Parse one allele token into a non-reference count (0 or 1)
fn parse_allele(token: &str) -> Option<u8> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u8 = token.parse().ok()?;
    if index > MAX_MODELED_ALLELE {
        return None;
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homozygous_reference() {
        assert_eq!(decode_genotype("0/0"), Dosage::Called(0));
        assert_eq!(decode_genotype("0|0"), Dosage::Called(0));
    }

    #[test]
    fn test_heterozygous() {
        for gt in ["0/1", "1/0", "0|1", "1|0"] {
            assert_eq!(decode_genotype(gt), Dosage::Called(1), "genotype {}", gt);
        }
    }

    #[test]
    fn test_homozygous_alternate() {
        assert_eq!(decode_genotype("1/1"), Dosage::Called(2));
        assert_eq!(decode_genotype("1|1"), Dosage::Called(2));
    }

    #[test]
    fn test_missing_calls() {
        assert_eq!(decode_genotype("./."), Dosage::Missing);
        assert_eq!(decode_genotype(".|."), Dosage::Missing);
        assert_eq!(decode_genotype("."), Dosage::Missing);
        assert_eq!(decode_genotype("0/."), Dosage::Missing);
        assert_eq!(decode_genotype(""), Dosage::Missing);
    }

    #[test]
    fn test_non_numeric_tokens() {
        assert_eq!(decode_genotype("A/G"), Dosage::Missing);
        assert_eq!(decode_genotype("-1/0"), Dosage::Missing);
        assert_eq!(decode_genotype("+1/0"), Dosage::Missing);
        assert_eq!(decode_genotype("0/1x"), Dosage::Missing);
    }

    #[test]
    fn test_multi_allelic_is_missing() {
        assert_eq!(decode_genotype("1/2"), Dosage::Missing);
        assert_eq!(decode_genotype("2|2"), Dosage::Missing);
        assert_eq!(decode_genotype("0/300"), Dosage::Missing);
    }

    #[test]
    fn test_ploidy_other_than_two() {
        assert_eq!(decode_genotype("1"), Dosage::Missing);
        assert_eq!(decode_genotype("0/1/1"), Dosage::Missing);
    }

    #[test]
    fn test_format_subfields_ignored() {
        assert_eq!(decode_genotype("0|1:0.98:0.01,0.97,0.02"), Dosage::Called(1));
        assert_eq!(decode_genotype("1/1:35:99"), Dosage::Called(2));
        assert_eq!(decode_genotype("./.:0:."), Dosage::Missing);
    }
}
