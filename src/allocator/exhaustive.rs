// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Exhaustive vulnerability search.
//!
//! For each assay type P, in priority order, try every chamber set of the
//! required size that P may legally occupy, least crowded first. Reserve
//! the first that leaves the allocation invulnerable and move on; if none
//! does, the design is infeasible.
//!
//! # Vulnerability
//!
//! A reserved set S of type Q is vulnerable to a hypothesis H (a set of
//! targets present, not containing Q) when every chamber of S holds some
//! type in H: S would all-fire and Q would be called falsely.
//!
//! Reserving a set for P can only change conclusions about:
//!
//! - P's own new set, against every hypothesis lacking P;
//! - earlier sets sharing a chamber with P's set, against hypotheses that
//!   contain P but not the reserving type. Any other hypothesis was already
//!   ruled out when the earlier set was checked.
//!
//! Hypotheses are only those of the largest size that can exclude a type,
//! `min(bound, types - 1)`; a smaller defeating hypothesis extends to one of
//! that size.

use super::statistics::{Counters, Statistics};
use super::tracer::{LogTracer, TraceEvent, Tracer};
use super::{Allocator, Strategy};
use crate::allocation::Allocation;
use crate::config::AllocatorConfig;
use crate::design::{AssayType, Chamber, ChamberSet, ExperimentDesign, TypeSet};
use crate::error::{AllocError, InfeasibleReason};
use crate::targets::{CardinalityBound, Combinations, TargetUniverse};
use log::{debug, info};

/// The hypothesis that defeats a reserved set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vulnerability {
    pub victim: AssayType,
    pub targets: TypeSet,
}

pub struct ExhaustiveGuard<'a> {
    design: &'a ExperimentDesign,
    replicas: usize,
    tracer: Box<dyn Tracer + 'a>,
    statistics: Statistics,
}

impl<'a> ExhaustiveGuard<'a> {
    pub fn new(design: &'a ExperimentDesign, config: &AllocatorConfig) -> Self {
        Self {
            design,
            replicas: config.replicas_for(Strategy::Exhaustive, design.max_targets()),
            tracer: Box::new(LogTracer),
            statistics: Statistics::new(),
        }
    }

    pub fn with_tracer(mut self, tracer: Box<dyn Tracer + 'a>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Replicas reserved per assay type.
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Chamber sets `assay_type` may occupy, least crowded first, then
    /// lexicographic.
    pub fn candidate_sets(&self, alloc: &Allocation, assay_type: AssayType) -> Vec<ChamberSet> {
        let chambers: Vec<Chamber> = self
            .design
            .all_chambers()
            .iter()
            .filter(|&c| {
                self.design
                    .can_go_into(assay_type, alloc.assay_types_present_in(c))
            })
            .collect();
        let mut sets: Vec<ChamberSet> = Combinations::new(chambers.len(), self.replicas)
            .map(|combination| combination.iter().map(|&i| chambers[i]).collect())
            .collect();
        sets.sort_by_key(|&set| alloc.crowdedness(set));
        sets
    }

    /// Check the allocation after `newcomer` has just reserved `chambers`.
    pub fn find_vulnerability(
        &mut self,
        alloc: &Allocation,
        universe: &TargetUniverse,
        newcomer: AssayType,
        chambers: ChamberSet,
    ) -> Option<Vulnerability> {
        for targets in universe.iter().filter(|h| !h.contains(newcomer)) {
            self.statistics.increment(Counters::AllFireTests);
            if all_fire(alloc, chambers, targets) {
                return Some(Vulnerability {
                    victim: newcomer,
                    targets,
                });
            }
        }

        for (reserved_by, earlier) in alloc.reserved_chamber_sets() {
            if reserved_by == newcomer || !earlier.intersects(chambers) {
                continue;
            }
            for targets in universe.iter() {
                if targets.contains(reserved_by) {
                    self.statistics.increment(Counters::ReservingAssaySkips);
                    self.trace(TraceEvent::ReservingAssayPresent {
                        assay_type: newcomer,
                        reserved_by,
                        targets,
                    });
                    continue;
                }
                if !targets.contains(newcomer) {
                    self.statistics.increment(Counters::NewcomerAbsentSkips);
                    self.trace(TraceEvent::NewcomerAbsent {
                        assay_type: newcomer,
                        reserved_by,
                        targets,
                    });
                    continue;
                }
                self.statistics.increment(Counters::AllFireTests);
                if all_fire(alloc, earlier, targets) {
                    return Some(Vulnerability {
                        victim: reserved_by,
                        targets,
                    });
                }
            }
        }
        None
    }

    fn allocate_type(
        &mut self,
        alloc: &mut Allocation,
        universe: &TargetUniverse,
        assay_type: AssayType,
    ) -> Result<(), AllocError> {
        let candidates = self.candidate_sets(alloc, assay_type);
        for &chambers in &candidates {
            self.statistics.increment(Counters::CandidatesConsidered);
            if alloc.is_chamber_set_already_reserved(chambers) {
                self.statistics.increment(Counters::AlreadyReservedSkips);
                self.trace(TraceEvent::AlreadyReserved {
                    assay_type,
                    chambers,
                });
                continue;
            }

            alloc.checkpoint();
            alloc.reserve(assay_type, chambers)?;
            match self.find_vulnerability(alloc, universe, assay_type, chambers) {
                Some(Vulnerability { victim, targets }) => {
                    alloc.rewind();
                    self.statistics.increment(Counters::VulnerableRejections);
                    self.trace(TraceEvent::Vulnerable {
                        assay_type,
                        chambers,
                        victim,
                        targets,
                    });
                }
                None => {
                    alloc.commit();
                    self.statistics.add(Counters::ReplicasPlaced, chambers.len() as u64);
                    self.trace(TraceEvent::Reserved {
                        assay_type,
                        chambers,
                    });
                    debug!("<{}> reserved {}", self.design.name(assay_type), chambers);
                    return Ok(());
                }
            }
        }
        Err(AllocError::Infeasible {
            assay: self.design.name(assay_type).to_string(),
            reason: InfeasibleReason::NoInvulnerableChamberSet {
                candidates: candidates.len(),
            },
        })
    }

    fn trace(&mut self, event: TraceEvent) {
        self.tracer.trace(self.design, &event);
    }
}

/// Would every chamber in `chambers` fire if `targets` were present?
pub fn all_fire(alloc: &Allocation, chambers: ChamberSet, targets: TypeSet) -> bool {
    chambers.is_subset(alloc.chambers_containing_any(targets))
}

impl Allocator for ExhaustiveGuard<'_> {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn allocate(&mut self) -> Result<Allocation, AllocError> {
        let mut alloc = Allocation::new(self.design);
        let num_types = self.design.num_assay_types();
        if num_types > 0 {
            let size = self.design.max_targets().min(num_types - 1);
            let universe = TargetUniverse::create(self.design, CardinalityBound::Exactly(size));
            for assay_type in self.design.assay_types_in_priority_order() {
                self.allocate_type(&mut alloc, &universe, assay_type)?;
            }
        }
        alloc.freeze();
        info!(
            "exhaustive: {} types in {} chambers ({})",
            num_types,
            self.design.num_chambers(),
            self.statistics
        );
        Ok(alloc)
    }

    fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::RecordingTracer;
    use crate::design::DesignParams;

    fn design(assays: usize, chambers: usize, bound: usize) -> ExperimentDesign {
        ExperimentDesign::from_params(&DesignParams::new(assays, chambers, bound)).unwrap()
    }

    #[test]
    fn test_two_types_four_chambers() {
        let design = design(2, 4, 2);
        let mut allocator = ExhaustiveGuard::new(&design, &AllocatorConfig::default());
        assert_eq!(allocator.replicas(), 3);
        let alloc = allocator.allocate().unwrap();

        let a = design.type_named("A").unwrap();
        let b = design.type_named("B").unwrap();
        assert_eq!(alloc.reservation(a), Some(ChamberSet::from_numbers(&[1, 2, 3])));
        assert_eq!(alloc.reservation(b), Some(ChamberSet::from_numbers(&[1, 2, 4])));
        assert!(alloc.is_frozen());
    }

    #[test]
    fn test_candidates_least_crowded_first() {
        let design = design(2, 4, 2);
        let allocator = ExhaustiveGuard::new(&design, &AllocatorConfig::default());
        let mut alloc = Allocation::new(&design);
        alloc
            .reserve(AssayType::new(0), ChamberSet::from_numbers(&[1, 2, 3]))
            .unwrap();
        let candidates = allocator.candidate_sets(&alloc, AssayType::new(1));
        assert_eq!(
            candidates,
            vec![
                ChamberSet::from_numbers(&[1, 2, 4]),
                ChamberSet::from_numbers(&[1, 3, 4]),
                ChamberSet::from_numbers(&[2, 3, 4]),
                ChamberSet::from_numbers(&[1, 2, 3]),
            ]
        );
    }

    #[test]
    fn test_candidates_respect_dont_mix() {
        let design = ExperimentDesign::builder()
            .chambers(4)
            .max_targets(1)
            .assay("A", 2)
            .assay("B", 2)
            .dont_mix("A", "B")
            .build()
            .unwrap();
        let allocator = ExhaustiveGuard::new(&design, &AllocatorConfig::default());
        let mut alloc = Allocation::new(&design);
        alloc
            .reserve(AssayType::new(0), ChamberSet::from_numbers(&[1, 2]))
            .unwrap();
        assert_eq!(
            allocator.candidate_sets(&alloc, AssayType::new(1)),
            vec![ChamberSet::from_numbers(&[3, 4])]
        );
    }

    #[test]
    fn test_vulnerable_candidates_are_rejected() {
        // A takes {1,2,3} and B {1,2,4}. Every other set for C lies inside
        // the chambers of A and B, so {A,B} would call C falsely.
        let design = design(3, 4, 2);
        let mut recorder = RecordingTracer::default();
        let err = {
            let mut allocator = ExhaustiveGuard::new(&design, &AllocatorConfig::default())
                .with_tracer(Box::new(&mut recorder));
            let err = allocator.allocate().unwrap_err();
            let stats = allocator.statistics();
            assert_eq!(stats.get(Counters::VulnerableRejections), 2);
            assert_eq!(stats.get(Counters::AlreadyReservedSkips), 2);
            err
        };
        assert_eq!(
            err,
            AllocError::Infeasible {
                assay: "C".to_string(),
                reason: InfeasibleReason::NoInvulnerableChamberSet { candidates: 4 },
            }
        );

        let a_and_b = TypeSet::first_n(2);
        let c = design.type_named("C").unwrap();
        assert!(recorder.events.iter().any(|e| *e
            == TraceEvent::Vulnerable {
                assay_type: c,
                chambers: ChamberSet::from_numbers(&[1, 3, 4]),
                victim: c,
                targets: a_and_b,
            }));
    }

    #[test]
    fn test_skip_rules_are_counted() {
        let design = design(4, 4, 1);
        let mut allocator = ExhaustiveGuard::new(&design, &AllocatorConfig::default());
        allocator.allocate().unwrap();
        let stats = allocator.statistics();
        assert!(stats.get(Counters::ReservingAssaySkips) > 0);
        assert!(stats.get(Counters::NewcomerAbsentSkips) > 0);
        assert_eq!(stats.get(Counters::ReplicasPlaced), 4 * 2);
    }

    #[test]
    fn test_infeasible_names_the_type() {
        // Three chambers hold exactly one set of three.
        let design = design(2, 3, 2);
        let mut allocator = ExhaustiveGuard::new(&design, &AllocatorConfig::default());
        let err = allocator.allocate().unwrap_err();
        assert_eq!(err.unplaced_assay(), Some("B"));
    }

    #[test]
    fn test_no_types_gives_empty_allocation() {
        let design = design(0, 3, 2);
        let alloc = ExhaustiveGuard::new(&design, &AllocatorConfig::default())
            .allocate()
            .unwrap();
        assert_eq!(alloc.total_replicas(), 0);
    }

    #[test]
    fn test_single_type() {
        let design = design(1, 3, 2);
        let alloc = ExhaustiveGuard::new(&design, &AllocatorConfig::default())
            .allocate()
            .unwrap();
        assert_eq!(
            alloc.reservation(AssayType::new(0)),
            Some(ChamberSet::from_numbers(&[1, 2, 3]))
        );
    }
}
