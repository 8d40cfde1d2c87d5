// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Diagonal pattern placement.
//!
//! Lay the allocation out as a grid, one row per assay type and one column
//! per chamber. The first row is computed by modular arithmetic: replica k
//! goes in column `(types * k) mod chambers`, moving right to the next
//! unused column on a collision. Every later row is the row above rotated
//! one column to the right. No search is done, so the result is only
//! checked: each row must share at most `bound - 1` chambers with every row
//! above it, and must not meet a don't-mix partner. That limit does not by
//! itself rule out false positives once `bound` is 3 or more.

use super::statistics::{Counters, Statistics};
use super::tracer::{LogTracer, TraceEvent, Tracer};
use super::{Allocator, Strategy};
use crate::allocation::Allocation;
use crate::config::AllocatorConfig;
use crate::design::{AssayType, Chamber, ChamberSet, ExperimentDesign};
use crate::error::{AllocError, InfeasibleReason};
use log::{debug, info};

pub struct PatternAllocator<'a> {
    design: &'a ExperimentDesign,
    replicas: usize,
    limit: usize,
    tracer: Box<dyn Tracer + 'a>,
    statistics: Statistics,
}

impl<'a> PatternAllocator<'a> {
    pub fn new(design: &'a ExperimentDesign, config: &AllocatorConfig) -> Self {
        let replicas = config.replicas_for(Strategy::Pattern, design.max_targets());
        Self {
            design,
            replicas,
            limit: design.max_targets().saturating_sub(1),
            tracer: Box::new(LogTracer),
            statistics: Statistics::new(),
        }
    }

    pub fn with_tracer(mut self, tracer: Box<dyn Tracer + 'a>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// The first row, as zero-based chamber indices in replica order.
    ///
    /// Returns None when the chambers run out of unused columns.
    pub fn template(&self) -> Option<Vec<usize>> {
        let num_types = self.design.num_assay_types();
        let num_chambers = self.design.num_chambers();
        let mut template: Vec<usize> = Vec::with_capacity(self.replicas);
        for replica in 0..self.replicas {
            let mut chamber = (num_types * replica) % num_chambers;
            if template.contains(&chamber) {
                chamber = (0..num_chambers.saturating_sub(1))
                    .map(|k| (chamber + 1 + k) % num_chambers)
                    .find(|c| !template.contains(c))?;
            }
            template.push(chamber);
        }
        Some(template)
    }

    /// The template rotated `shift` columns, as a chamber set.
    pub fn row(&self, template: &[usize], shift: usize) -> ChamberSet {
        let num_chambers = self.design.num_chambers();
        template
            .iter()
            .map(|&c| Chamber::new((c + shift) % num_chambers + 1))
            .collect()
    }

    fn check_row(
        &self,
        alloc: &Allocation,
        assay_type: AssayType,
        chambers: ChamberSet,
    ) -> Result<(), InfeasibleReason> {
        for chamber in chambers.iter() {
            if !self
                .design
                .can_go_into(assay_type, alloc.assay_types_present_in(chamber))
            {
                return Err(InfeasibleReason::DontMixConflict {
                    chamber: chamber.number(),
                });
            }
        }
        for (earlier, set) in alloc.reserved_chamber_sets() {
            let shared = set.intersection(chambers).len();
            if shared > self.limit {
                return Err(InfeasibleReason::ExcessOverlap {
                    with: self.design.name(earlier).to_string(),
                    shared,
                    limit: self.limit,
                });
            }
        }
        Ok(())
    }
}

impl Allocator for PatternAllocator<'_> {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn allocate(&mut self) -> Result<Allocation, AllocError> {
        let mut alloc = Allocation::new(self.design);
        let mut types = self.design.assay_types_in_priority_order();
        let Some(first) = types.next() else {
            alloc.freeze();
            return Ok(alloc);
        };

        let template = self.template().ok_or_else(|| AllocError::Infeasible {
            assay: self.design.name(first).to_string(),
            reason: InfeasibleReason::NoUnusedDiagonal,
        })?;
        debug!("pattern template {:?}", template);

        for (shift, assay_type) in std::iter::once(first).chain(types).enumerate() {
            let chambers = self.row(&template, shift);
            self.statistics.increment(Counters::CandidatesConsidered);
            self.check_row(&alloc, assay_type, chambers)
                .map_err(|reason| AllocError::Infeasible {
                    assay: self.design.name(assay_type).to_string(),
                    reason,
                })?;
            alloc.reserve(assay_type, chambers)?;
            self.statistics.add(Counters::ReplicasPlaced, chambers.len() as u64);
            let event = TraceEvent::Reserved {
                assay_type,
                chambers,
            };
            self.tracer.trace(self.design, &event);
        }

        alloc.freeze();
        info!(
            "pattern: {} types in {} chambers ({})",
            self.design.num_assay_types(),
            self.design.num_chambers(),
            self.statistics
        );
        Ok(alloc)
    }

    fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}
