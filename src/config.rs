// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Allocator configuration.
//!
//! Everything has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "resilience_margin": 1,
//!   "greedy": {
//!     "precedence": ["false_positive_potential", "duplicate_pairs", "occupant_count"],
//!     "hypothesis_sizes": { "min": 2, "max": 3 }
//!   }
//! }
//! ```

use crate::allocator::Strategy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum_macros::{Display, EnumString};

/// A greedy chamber-ranking criterion. Lower scores are more desirable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Criterion {
    /// Lowest chamber number.
    ChamberNumber,
    /// Fewest replicas already in the chamber.
    OccupantCount,
    /// Fewest co-located type pairs that already exist in another chamber.
    DuplicatePairs,
    /// Fewest hypothetical target sets that would make every chamber holding
    /// the type fire.
    FalsePositivePotential,
}

/// Target-set sizes the false-positive criterion scores against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HypothesisSizes {
    pub min: usize,
    pub max: usize,
}

impl Default for HypothesisSizes {
    fn default() -> Self {
        Self { min: 2, max: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyPolicy {
    /// Ranking criteria, highest precedence first.
    pub precedence: Vec<Criterion>,
    pub hypothesis_sizes: HypothesisSizes,
}

impl Default for GreedyPolicy {
    fn default() -> Self {
        Self {
            precedence: vec![
                Criterion::DuplicatePairs,
                Criterion::OccupantCount,
                Criterion::ChamberNumber,
            ],
            hypothesis_sizes: HypothesisSizes::default(),
        }
    }
}

impl GreedyPolicy {
    /// The precedence actually applied: as configured, with chamber number
    /// appended as the final tie-break when absent.
    pub fn effective_precedence(&self) -> Vec<Criterion> {
        let mut precedence = Vec::with_capacity(self.precedence.len() + 1);
        for &criterion in &self.precedence {
            if !precedence.contains(&criterion) {
                precedence.push(criterion);
            }
        }
        if !precedence.contains(&Criterion::ChamberNumber) {
            precedence.push(Criterion::ChamberNumber);
        }
        precedence
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Replicas beyond `bound + 1` for the reservation strategies; None means
    /// the strategy's own default.
    pub resilience_margin: Option<usize>,
    pub greedy: GreedyPolicy,
}

impl AllocatorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn margin_for(&self, strategy: Strategy) -> usize {
        self.resilience_margin.unwrap_or(match strategy {
            Strategy::Pattern => 2,
            _ => 0,
        })
    }

    /// Replicas per assay type for a reservation strategy.
    pub fn replicas_for(&self, strategy: Strategy, max_targets: usize) -> usize {
        max_targets + 1 + self.margin_for(strategy)
    }
}
