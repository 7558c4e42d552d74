//! Property-based tests using proptest.
//!
//! Invariants that must hold for any input:
//!   - genotype decoding is total and bounded
//!   - scores do not depend on where matching lines sit in the stream
//!   - percentiles are monotonic in the raw score
//!   - label simulation is a pure function of (scores, h², prevalence, seed)
//!   - feature vectors follow the requested order

use proptest::prelude::*;
use std::collections::HashMap;

use prs_engine::genotype_converter::decode_genotype;
use prs_engine::label_simulator::ScoreInput;
use prs_engine::models::{Dosage, FeatureImputation, GenotypeObservation, PopulationStats, SnpRecord};
use prs_engine::position_index::PositionIndex;
use prs_engine::{assemble_features, normalize, score_individual, simulate_labels};

const HEADER: &str = "##fileformat=VCFv4.2\n\
    #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample1\n";

const GENOTYPES: [&str; 8] = ["0/0", "0|1", "1/0", "1|1", "./.", ".", "0/2", "1/1"];

// ---------------------------------------------------------------------------
// 1. Decoder is total: any string yields missing or a dosage in 0..=2
// ---------------------------------------------------------------------------
proptest! {
    #[test]
    fn prop_decode_is_total(field in ".{0,12}") {
        match decode_genotype(&field) {
            Dosage::Called(d) => prop_assert!(d <= 2),
            Dosage::Missing => {}
        }
    }

    #[test]
    fn prop_decode_ignores_format_suffix(a in 0u8..2, b in 0u8..2, phased in any::<bool>(), suffix in "[0-9,.]{0,8}") {
        let sep = if phased { '|' } else { '/' };
        let field = format!("{}{}{}:{}", a, sep, b, suffix);
        prop_assert_eq!(decode_genotype(&field), Dosage::Called(a + b));
    }
}

// ---------------------------------------------------------------------------
// 2. Line order does not change the score
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_score_is_line_order_independent(
        rows in prop::collection::vec((1u64..500, -1.0f64..1.0, 0usize..GENOTYPES.len()), 1..20),
        noise in prop::collection::vec(500u64..1000, 0..10),
        rotate in 0usize..40,
    ) {
        let mut seen = std::collections::HashSet::new();
        let rows: Vec<_> = rows.into_iter().filter(|(pos, _, _)| seen.insert(*pos)).collect();

        let index = PositionIndex::new(
            rows.iter().map(|(pos, w, _)| SnpRecord::new(format!("rs{}", pos), *pos, *w, "T")),
        ).unwrap();

        let mut lines: Vec<String> = rows
            .iter()
            .map(|(pos, _, g)| format!("1\t{}\t.\tA\tG\t.\tPASS\t.\tGT\t{}\n", pos, GENOTYPES[*g]))
            .chain(noise.iter().map(|pos| format!("1\t{}\t.\tA\tG\t.\tPASS\t.\tGT\t1/1\n", pos)))
            .collect();

        let forward = format!("{}{}", HEADER, lines.concat());
        let len = lines.len();
        lines.rotate_left(rotate % len);
        lines.reverse();
        let shuffled = format!("{}{}", HEADER, lines.concat());

        let a = score_individual(forward.as_bytes(), "a.vcf", &index);
        let b = score_individual(shuffled.as_bytes(), "b.vcf", &index);

        match (a, b) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            (a, b) => prop_assert!(false, "diverged: {:?} vs {:?}", a, b),
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Percentile is monotonic in the raw score
// ---------------------------------------------------------------------------
proptest! {
    #[test]
    fn prop_normalize_is_monotonic(
        mean in -5.0f64..5.0,
        std_dev in 0.01f64..10.0,
        x in -50.0f64..50.0,
        delta in 0.0f64..50.0,
    ) {
        let stats = PopulationStats::new(mean, std_dev, 100, 10);
        let lo = normalize(x, &stats).unwrap();
        let hi = normalize(x + delta, &stats).unwrap();

        prop_assert!(lo.percentile <= hi.percentile);
        prop_assert!((0.0..=100.0).contains(&lo.percentile));
    }
}

// ---------------------------------------------------------------------------
// 4. Simulation is deterministic for a fixed seed
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_simulation_is_deterministic(
        scores in prop::collection::vec(-4.0f64..4.0, 1..50),
        h2 in 0.0f64..=1.0,
        prevalence in 0.01f64..0.99,
        seed in any::<u64>(),
    ) {
        let input = ScoreInput::Normalized(scores);
        let first = simulate_labels(&input, h2, prevalence, seed).unwrap();
        let second = simulate_labels(&input, h2, prevalence, seed).unwrap();

        prop_assert_eq!(&first, &second);
        for label in &first {
            prop_assert!(label.label <= 1);
            prop_assert!((0.0..=1.0).contains(&label.disease_probability));
        }
    }
}

// ---------------------------------------------------------------------------
// 5. Feature assembly follows the requested order
// ---------------------------------------------------------------------------
proptest! {
    #[test]
    fn prop_features_match_manual_construction(
        dosages in prop::collection::vec(0u8..=2, 1..15),
        raw in -3.0f64..3.0,
        rotate in 0usize..16,
    ) {
        let obs: GenotypeObservation = dosages
            .iter()
            .enumerate()
            .map(|(i, d)| (format!("rs{}", i), Dosage::Called(*d)))
            .collect();

        let mut order: Vec<String> = (0..dosages.len()).map(|i| format!("rs{}", i)).collect();
        order.push("prs_raw".to_string());
        let len = order.len();
        order.rotate_left(rotate % len);

        let manual: Vec<f64> = order
            .iter()
            .map(|name| match name.strip_prefix("rs").and_then(|i| i.parse::<usize>().ok()) {
                Some(i) => f64::from(dosages[i]),
                None => raw,
            })
            .collect();

        let fv = assemble_features(&order, &obs, raw, &HashMap::new(), FeatureImputation::default());
        prop_assert_eq!(&fv.values, &manual);
        prop_assert_eq!(fv.imputed(), 0);
    }
}
