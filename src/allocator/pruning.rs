// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Pool pruning.
//!
//! Start from every chamber set of the required size, in lexicographic
//! order. Each assay type takes the first set it may legally occupy; then
//! every remaining set sharing more than `overlap_limit` chambers with it is
//! discarded. No hypothesis is ever enumerated: with every pair of reserved
//! sets sharing at most `overlap_limit` chambers, `bound` targets cannot
//! cover any other type's set between them.

use super::statistics::{Counters, Statistics};
use super::tracer::{LogTracer, TraceEvent, Tracer};
use super::{overlap_limit, Allocator, Strategy};
use crate::allocation::Allocation;
use crate::config::AllocatorConfig;
use crate::design::{AssayType, Chamber, ChamberSet, ExperimentDesign};
use crate::error::{AllocError, InfeasibleReason};
use crate::targets::Combinations;
use log::{debug, info};

pub struct PruningGuard<'a> {
    design: &'a ExperimentDesign,
    replicas: usize,
    limit: usize,
    tracer: Box<dyn Tracer + 'a>,
    statistics: Statistics,
}

impl<'a> PruningGuard<'a> {
    pub fn new(design: &'a ExperimentDesign, config: &AllocatorConfig) -> Self {
        let replicas = config.replicas_for(Strategy::Pruning, design.max_targets());
        Self {
            design,
            replicas,
            limit: overlap_limit(design.max_targets(), replicas),
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

    /// Most chambers two reserved sets may share.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Every chamber set of the required size, lexicographic.
    pub fn initial_pool(&self) -> Vec<ChamberSet> {
        Combinations::new(self.design.num_chambers(), self.replicas)
            .map(|combination| combination.iter().map(|&i| Chamber::new(i + 1)).collect())
            .collect()
    }

    /// Reserve the first compatible pool member, then prune.
    fn allocate_type(
        &mut self,
        alloc: &mut Allocation,
        pool: &mut Vec<ChamberSet>,
        assay_type: AssayType,
    ) -> Result<(), AllocError> {
        let position = pool.iter().position(|&set| {
            set.iter()
                .all(|c| self.design.can_go_into(assay_type, alloc.assay_types_present_in(c)))
        });
        self.statistics
            .add(Counters::CandidatesConsidered, position.map_or(pool.len(), |p| p + 1) as u64);
        let Some(position) = position else {
            return Err(AllocError::Infeasible {
                assay: self.design.name(assay_type).to_string(),
                reason: InfeasibleReason::PoolExhausted {
                    remaining: pool.len(),
                },
            });
        };

        let chambers = pool.remove(position);
        alloc.reserve(assay_type, chambers)?;
        self.statistics.add(Counters::ReplicasPlaced, chambers.len() as u64);
        self.trace(TraceEvent::Reserved {
            assay_type,
            chambers,
        });
        debug!("<{}> reserved {}", self.design.name(assay_type), chambers);

        let before = pool.len();
        let limit = self.limit;
        pool.retain(|&set| set.intersection(chambers).len() <= limit);
        let removed = before - pool.len();
        self.statistics.add(Counters::PoolEntriesPruned, removed as u64);
        self.trace(TraceEvent::PoolPruned {
            assay_type,
            removed,
            remaining: pool.len(),
        });
        Ok(())
    }

    fn trace(&mut self, event: TraceEvent) {
        self.tracer.trace(self.design, &event);
    }
}

impl Allocator for PruningGuard<'_> {
    fn name(&self) -> &'static str {
        "pruning"
    }

    fn allocate(&mut self) -> Result<Allocation, AllocError> {
        let mut alloc = Allocation::new(self.design);
        if self.design.num_assay_types() > 0 {
            let mut pool = self.initial_pool();
            debug!("pool of {} chamber sets", pool.len());
            for assay_type in self.design.assay_types_in_priority_order() {
                self.allocate_type(&mut alloc, &mut pool, assay_type)?;
            }
        }
        alloc.freeze();
        info!(
            "pruning: {} types in {} chambers ({})",
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
