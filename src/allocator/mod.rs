// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Allocation strategies.
//!
//! Four interchangeable strategies fill an `Allocation` for an
//! `ExperimentDesign`:
//!
//! | Strategy | Guarantee | Method |
//! |---|---|---|
//! | `ExhaustiveGuard` | no false positives | per-type search of candidate chamber sets, testing hypotheses |
//! | `PruningGuard` | no false positives | first fit from a pool pruned by an overlap rule |
//! | `PatternAllocator` | overlap bound | rotated modular template, no search |
//! | `GreedyAllocator` | none | one replica at a time, ranked by configurable criteria |
//!
//! The reservation strategies (all but greedy) give every type the same
//! number of replicas, `bound + 1 + margin`, and ignore the design's
//! per-type replica counts.
//!
//! Pruning keeps reserved sets within `overlap_limit`, which is tight enough
//! to rule out false positives. The pattern scheme only keeps them within
//! `bound - 1` shared chambers.
//!
//! Each strategy is single-threaded and owns its `Allocation` until it
//! returns it, frozen. Independent runs can go in parallel: see
//! `crate::sweep`.

pub mod exhaustive;
pub mod greedy;
pub mod pattern;
pub mod pruning;
pub mod statistics;
pub mod tracer;

pub use exhaustive::ExhaustiveGuard;
pub use greedy::{GreedyAllocator, ReplicaPool};
pub use pattern::PatternAllocator;
pub use pruning::PruningGuard;
pub use statistics::{Counters, Statistics};
pub use tracer::{FocusTracer, LogTracer, NullTracer, RecordingTracer, TraceEvent, Tracer};

use crate::allocation::Allocation;
use crate::config::AllocatorConfig;
use crate::design::ExperimentDesign;
use crate::error::AllocError;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// An allocation strategy bound to one design.
pub trait Allocator {
    fn name(&self) -> &'static str;

    /// Run the strategy to completion, returning the frozen allocation.
    fn allocate(&mut self) -> Result<Allocation, AllocError>;

    fn statistics(&self) -> &Statistics;
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Strategy {
    Exhaustive,
    Pruning,
    Pattern,
    Greedy,
}

impl Strategy {
    /// Does the strategy reserve one chamber set per assay type?
    pub fn reserves(self) -> bool {
        !matches!(self, Strategy::Greedy)
    }

    /// Does the strategy guarantee no false positives up to the bound?
    pub fn guards_false_positives(self) -> bool {
        matches!(self, Strategy::Exhaustive | Strategy::Pruning)
    }

    /// Most chambers two reserved sets may share under this strategy, or
    /// None when overlap is not bounded.
    ///
    /// Pruning uses `overlap_limit`, which also rules out false positives.
    /// The pattern scheme only promises `bound - 1`.
    pub fn overlap_limit(self, bound: usize, replicas: usize) -> Option<usize> {
        match self {
            Strategy::Pruning => Some(overlap_limit(bound, replicas)),
            Strategy::Pattern => Some(bound.saturating_sub(1)),
            Strategy::Exhaustive | Strategy::Greedy => None,
        }
    }

    pub fn build<'a>(
        self,
        design: &'a ExperimentDesign,
        config: &AllocatorConfig,
        tracer: Box<dyn Tracer + 'a>,
    ) -> Box<dyn Allocator + 'a> {
        match self {
            Strategy::Exhaustive => {
                Box::new(ExhaustiveGuard::new(design, config).with_tracer(tracer))
            }
            Strategy::Pruning => Box::new(PruningGuard::new(design, config).with_tracer(tracer)),
            Strategy::Pattern => {
                Box::new(PatternAllocator::new(design, config).with_tracer(tracer))
            }
            Strategy::Greedy => {
                Box::new(GreedyAllocator::new(design, config).with_tracer(tracer))
            }
        }
    }
}

/// Most chambers two reserved sets may share.
///
/// Never more than `bound - 1`. Also small enough that `bound` other types,
/// each sharing at most this many chambers with a set of `replicas`, cannot
/// cover the whole set between them.
pub fn overlap_limit(bound: usize, replicas: usize) -> usize {
    if bound == 0 {
        return 0;
    }
    (bound - 1).min(replicas.saturating_sub(1) / bound)
}
