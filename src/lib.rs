// ==============================================================================
// lib.rs - PRS Engine Library
// ==============================================================================
// Description: Polygenic risk score extraction, normalization and label simulation
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod config;
pub mod genotype_converter;
pub mod inference;
pub mod label_simulator;
pub mod models;
pub mod normalizer;
pub mod output;
pub mod parsers;
pub mod position_index;
pub mod processor;
pub mod scoring;
pub mod validator;

pub use inference::assemble_features;
pub use label_simulator::simulate_labels;
pub use normalizer::normalize;
pub use processor::{score_individual, PipelineError};
