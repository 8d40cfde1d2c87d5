// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Invariant checks on a finished allocation.
//!
//! These do not trust the allocators: the false-positive check enumerates
//! every hypothesis of every size up to the bound.

use crate::allocation::Allocation;
use crate::allocator::Strategy;
use crate::config::AllocatorConfig;
use crate::design::{AssayType, Chamber, ExperimentDesign, TypeSet};
use crate::targets::{CardinalityBound, TargetUniverse};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("chamber {chamber} mixes <{a}> and <{b}>")]
    DontMix { chamber: usize, a: String, b: String },

    #[error("chamber {chamber} holds <{assay}> {count} times")]
    RepeatedOccupant {
        chamber: usize,
        assay: String,
        count: usize,
    },

    #[error("<{assay}> has no reserved chamber set")]
    Unreserved { assay: String },

    #[error("chamber set {chambers} is reserved by both <{a}> and <{b}>")]
    SharedReservation { chambers: String, a: String, b: String },

    #[error("<{assay}> would be called falsely when {targets} are present")]
    FalsePositive { assay: String, targets: String },

    #[error("<{a}> and <{b}> share {shared} chambers, more than {limit}")]
    ExcessOverlap {
        a: String,
        b: String,
        shared: usize,
        limit: usize,
    },
}

/// No chamber holds both members of a don't-mix pair.
pub fn check_no_mix(design: &ExperimentDesign, alloc: &Allocation) -> Vec<Violation> {
    let mut violations = Vec::new();
    for chamber in design.all_chambers().iter() {
        let present = alloc.assay_types_present_in(chamber);
        for &(a, b) in design.dont_mix() {
            if present.contains(a) && present.contains(b) {
                violations.push(Violation::DontMix {
                    chamber: chamber.number(),
                    a: design.name(a).to_string(),
                    b: design.name(b).to_string(),
                });
            }
        }
    }
    violations
}

/// No chamber holds two replicas of one type.
pub fn check_single_occupancy(design: &ExperimentDesign, alloc: &Allocation) -> Vec<Violation> {
    let mut violations = Vec::new();
    for chamber in design.all_chambers().iter() {
        let mut counts: HashMap<AssayType, usize> = HashMap::new();
        for assay in alloc.occupants(chamber) {
            *counts.entry(assay.assay_type).or_default() += 1;
        }
        let mut repeated: Vec<(AssayType, usize)> =
            counts.into_iter().filter(|&(_, n)| n > 1).collect();
        repeated.sort();
        violations.extend(repeated.into_iter().map(|(t, count)| Violation::RepeatedOccupant {
            chamber: chamber.number(),
            assay: design.name(t).to_string(),
            count,
        }));
    }
    violations
}

/// Every type reserves exactly one set, and no two types reserve the same.
pub fn check_reservations(design: &ExperimentDesign, alloc: &Allocation) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut seen = HashMap::new();
    for assay_type in design.assay_types_in_priority_order() {
        let Some(chambers) = alloc.reservation(assay_type) else {
            violations.push(Violation::Unreserved {
                assay: design.name(assay_type).to_string(),
            });
            continue;
        };
        match seen.get(&chambers) {
            Some(&other) => violations.push(Violation::SharedReservation {
                chambers: chambers.to_string(),
                a: design.name(other).to_string(),
                b: design.name(assay_type).to_string(),
            }),
            None => {
                seen.insert(chambers, assay_type);
            }
        }
    }
    violations
}

/// No hypothesis of up to `bound` targets lacking a type makes every
/// chamber holding that type fire.
pub fn check_no_false_positives(design: &ExperimentDesign, alloc: &Allocation) -> Vec<Violation> {
    let universe = TargetUniverse::create(
        design,
        CardinalityBound::Range {
            min: 1,
            max: design.max_targets(),
        },
    );
    let mut violations = Vec::new();
    for assay_type in design.assay_types_in_priority_order() {
        let chambers = alloc.chambers_for(assay_type);
        let defeat = universe
            .iter()
            .filter(|h| !h.contains(assay_type))
            .find(|&h| chambers.is_subset(alloc.chambers_containing_any(h)));
        if let Some(targets) = defeat {
            violations.push(Violation::FalsePositive {
                assay: design.name(assay_type).to_string(),
                targets: design.format_types(targets),
            });
        }
    }
    violations
}

/// No two reserved sets share more than `limit` chambers.
pub fn check_overlap(design: &ExperimentDesign, alloc: &Allocation, limit: usize) -> Vec<Violation> {
    let reserved = alloc.reserved_chamber_sets();
    let mut violations = Vec::new();
    for (i, &(a, set_a)) in reserved.iter().enumerate() {
        for &(b, set_b) in &reserved[i + 1..] {
            let shared = set_a.intersection(set_b).len();
            if shared > limit {
                violations.push(Violation::ExcessOverlap {
                    a: design.name(a).to_string(),
                    b: design.name(b).to_string(),
                    shared,
                    limit,
                });
            }
        }
    }
    violations
}

/// Every check that the strategy promises to pass.
pub fn verify(
    design: &ExperimentDesign,
    alloc: &Allocation,
    strategy: Strategy,
    config: &AllocatorConfig,
) -> Vec<Violation> {
    let mut violations = check_no_mix(design, alloc);
    violations.extend(check_single_occupancy(design, alloc));
    if strategy.reserves() {
        violations.extend(check_reservations(design, alloc));
    }
    if strategy.guards_false_positives() {
        violations.extend(check_no_false_positives(design, alloc));
    }
    let replicas = config.replicas_for(strategy, design.max_targets());
    if let Some(limit) = strategy.overlap_limit(design.max_targets(), replicas) {
        violations.extend(check_overlap(design, alloc, limit));
    }
    violations
}

/// Chambers that fire when exactly `present` targets are in the sample.
pub fn firing_chambers(alloc: &Allocation, present: TypeSet) -> Vec<Chamber> {
    alloc.chambers_containing_any(present).iter().collect()
}
