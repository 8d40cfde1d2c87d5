// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Greedy multi-criteria placement.
//!
//! Every replica the design asks for goes into a depletable pool. Replicas
//! are taken in (type priority, replica) order and each is put in the most
//! desirable legal chamber, where desirability is a lexicographic ranking
//! over the configured `Criterion`s. Replicas with no legal chamber stay in
//! the pool; if any remain at the end, the run fails and names them.
//!
//! There is no false-positive guarantee. The criteria only make one less
//! likely.

use super::statistics::{Counters, Statistics};
use super::tracer::{LogTracer, TraceEvent, Tracer};
use super::Allocator;
use crate::allocation::Allocation;
use crate::config::{AllocatorConfig, Criterion};
use crate::design::{Assay, AssayType, Chamber, ExperimentDesign};
use crate::error::{AllocError, InfeasibleReason};
use crate::targets::{CardinalityBound, TargetUniverse};
use log::{debug, info};
use std::collections::VecDeque;

/// The replicas still to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaPool {
    assays: VecDeque<Assay>,
}

impl ReplicaPool {
    /// Every replica of every type, in (type priority, replica) order.
    pub fn new(design: &ExperimentDesign) -> Self {
        let assays = design
            .assay_types_in_priority_order()
            .flat_map(|t| (1..=design.replicas(t)).map(move |r| Assay::new(t, r as u16)))
            .collect();
        Self { assays }
    }

    pub fn take(&mut self) -> Option<Assay> {
        self.assays.pop_front()
    }

    pub fn len(&self) -> usize {
        self.assays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Assay> + '_ {
        self.assays.iter().copied()
    }
}

pub struct GreedyAllocator<'a> {
    design: &'a ExperimentDesign,
    precedence: Vec<Criterion>,
    hypotheses: TargetUniverse,
    tracer: Box<dyn Tracer + 'a>,
    statistics: Statistics,
}

impl<'a> GreedyAllocator<'a> {
    pub fn new(design: &'a ExperimentDesign, config: &AllocatorConfig) -> Self {
        let precedence = config.greedy.effective_precedence();
        let hypotheses = if precedence.contains(&Criterion::FalsePositivePotential) {
            let sizes = config.greedy.hypothesis_sizes;
            TargetUniverse::create(
                design,
                CardinalityBound::Range {
                    min: sizes.min,
                    max: sizes.max,
                },
            )
        } else {
            TargetUniverse::over(&[], CardinalityBound::Exactly(1))
        };
        Self {
            design,
            precedence,
            hypotheses,
            tracer: Box::new(LogTracer),
            statistics: Statistics::new(),
        }
    }

    pub fn with_tracer(mut self, tracer: Box<dyn Tracer + 'a>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn precedence(&self) -> &[Criterion] {
        &self.precedence
    }

    /// Legal chambers for this type, most desirable first.
    pub fn chambers_in_desirability_order(
        &self,
        alloc: &Allocation,
        assay_type: AssayType,
    ) -> Vec<Chamber> {
        let mut scored: Vec<(Vec<usize>, Chamber)> = self
            .design
            .all_chambers()
            .iter()
            .filter(|&c| {
                self.design
                    .can_go_into(assay_type, alloc.assay_types_present_in(c))
            })
            .map(|c| (self.scores(alloc, assay_type, c), c))
            .collect();
        scored.sort();
        scored.into_iter().map(|(_, c)| c).collect()
    }

    fn scores(&self, alloc: &Allocation, assay_type: AssayType, chamber: Chamber) -> Vec<usize> {
        self.precedence
            .iter()
            .map(|criterion| match criterion {
                Criterion::ChamberNumber => chamber.number(),
                Criterion::OccupantCount => alloc.occupant_count(chamber),
                Criterion::DuplicatePairs => duplicate_pairs_made(alloc, assay_type, chamber),
                Criterion::FalsePositivePotential => {
                    self.false_positive_potential(alloc, assay_type, chamber)
                }
            })
            .collect()
    }

    /// How many hypotheses without this type would make every chamber
    /// holding it fire, once it is also in `chamber`.
    pub fn false_positive_potential(
        &self,
        alloc: &Allocation,
        assay_type: AssayType,
        chamber: Chamber,
    ) -> usize {
        let mut chambers = alloc.chambers_for(assay_type);
        chambers.insert(chamber);
        self.hypotheses
            .iter()
            .filter(|h| !h.contains(assay_type))
            .filter(|&h| chambers.is_subset(alloc.chambers_containing_any(h)))
            .count()
    }

    fn trace(&mut self, event: TraceEvent) {
        self.tracer.trace(self.design, &event);
    }
}

/// Of the pairs `assay_type` would form in `chamber`, how many already share
/// another chamber.
pub fn duplicate_pairs_made(alloc: &Allocation, assay_type: AssayType, chamber: Chamber) -> usize {
    let mine = alloc.chambers_for(assay_type);
    alloc
        .assay_types_present_in(chamber)
        .iter()
        .filter(|&incumbent| mine.intersects(alloc.chambers_for(incumbent)))
        .count()
}

impl Allocator for GreedyAllocator<'_> {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn allocate(&mut self) -> Result<Allocation, AllocError> {
        let mut alloc = Allocation::new(self.design);
        let mut pool = ReplicaPool::new(self.design);
        let mut unplaced: Vec<Assay> = Vec::new();

        while let Some(assay) = pool.take() {
            let ranked = self.chambers_in_desirability_order(&alloc, assay.assay_type);
            self.statistics
                .add(Counters::CandidatesConsidered, ranked.len() as u64);
            match ranked.first() {
                Some(&chamber) => {
                    alloc.place(assay, chamber)?;
                    self.statistics.increment(Counters::ReplicasPlaced);
                    self.trace(TraceEvent::ReplicaPlaced { assay, chamber });
                }
                None => {
                    debug!("{} has no legal chamber", self.design.label(assay));
                    self.trace(TraceEvent::ReplicaUnplaced { assay });
                    unplaced.push(assay);
                }
            }
        }

        if let Some(first) = unplaced.first() {
            return Err(AllocError::Infeasible {
                assay: self.design.name(first.assay_type).to_string(),
                reason: InfeasibleReason::NoLegalChamber {
                    unplaced: unplaced.iter().map(|&a| self.design.label(a)).collect(),
                },
            });
        }

        alloc.freeze();
        info!(
            "greedy: {} replicas in {} chambers ({})",
            alloc.total_replicas(),
            self.design.num_chambers(),
            self.statistics
        );
        Ok(alloc)
    }

    fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}
