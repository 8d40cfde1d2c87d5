// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The allocation state store.
//!
//! An `Allocation` is a bidirectional index between chambers and the assay
//! replicas they hold, plus, for reservation-style allocators, the chamber
//! set reserved by each assay type and its inverse.
//!
//! # Invariants
//!
//! - An assay type occupies a chamber at most once.
//! - Each reserved chamber set has exactly one reserving assay type, and each
//!   assay type reserves at most one chamber set.
//! - Every chamber and assay type referred to is known to the design the
//!   allocation was created for.
//!
//! Don't-mix rules are the allocators' responsibility: the store has no
//! view of the design beyond its dimensions. See `crate::verify`.
//!
//! # Rollback
//!
//! Every mutation is logged on a `Trail` while a checkpoint is open, so
//! speculative work can be undone exactly with `rewind`. `unreserve` is the
//! explicit inverse of `reserve`.

pub mod trail;

pub use trail::Trail;

use crate::design::{Assay, AssayType, Chamber, ChamberSet, ExperimentDesign, TypeSet};
use crate::error::StateError;
use std::collections::{BTreeSet, HashMap};

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Placed { assay: Assay, chamber: Chamber },
    Reserved { assay_type: AssayType, chambers: ChamberSet },
    Unreserved { assay_type: AssayType, chambers: ChamberSet },
}

#[derive(Debug, Clone)]
pub struct Allocation {
    num_chambers: usize,
    num_types: usize,
    /// Replicas by chamber index.
    occupants: Vec<BTreeSet<Assay>>,
    /// Assay types by chamber index.
    types_in: Vec<TypeSet>,
    /// Chambers by assay type index.
    chambers_of: Vec<ChamberSet>,
    /// Reserved chamber set by assay type index.
    reservations: Vec<Option<ChamberSet>>,
    reserved_by: HashMap<ChamberSet, AssayType>,
    trail: Trail<Change>,
}

impl Allocation {
    /// An empty allocation sized for the design.
    pub fn new(design: &ExperimentDesign) -> Self {
        Self::with_dimensions(design.num_chambers(), design.num_assay_types())
    }

    pub fn with_dimensions(num_chambers: usize, num_types: usize) -> Self {
        Self {
            num_chambers,
            num_types,
            occupants: vec![BTreeSet::new(); num_chambers],
            types_in: vec![TypeSet::empty(); num_chambers],
            chambers_of: vec![ChamberSet::empty(); num_types],
            reservations: vec![None; num_types],
            reserved_by: HashMap::new(),
            trail: Trail::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Put one replica in one chamber.
    pub fn place(&mut self, assay: Assay, chamber: Chamber) -> Result<(), StateError> {
        self.check_mutable()?;
        self.check_type(assay.assay_type)?;
        self.check_chamber(chamber)?;
        if self.types_in[chamber.index()].contains(assay.assay_type) {
            return Err(StateError::DuplicateOccupant {
                index: assay.assay_type.index(),
                chamber: chamber.number(),
            });
        }
        self.insert_occupant(assay, chamber);
        self.trail.record(Change::Placed { assay, chamber });
        Ok(())
    }

    /// Reserve a chamber set for an assay type, placing replicas 1..=r in
    /// ascending chamber order.
    pub fn reserve(&mut self, assay_type: AssayType, chambers: ChamberSet) -> Result<(), StateError> {
        self.check_mutable()?;
        self.check_type(assay_type)?;
        if chambers.is_empty() {
            return Err(StateError::EmptyChamberSet);
        }
        for chamber in chambers.iter() {
            self.check_chamber(chamber)?;
        }
        if self.reservations[assay_type.index()].is_some() {
            return Err(StateError::AlreadyReserved {
                index: assay_type.index(),
            });
        }
        if self.reserved_by.contains_key(&chambers) {
            return Err(StateError::ChamberSetAlreadyReserved {
                chambers: chambers.to_string(),
            });
        }
        if let Some(chamber) = self.chambers_of[assay_type.index()]
            .intersection(chambers)
            .iter()
            .next()
        {
            return Err(StateError::DuplicateOccupant {
                index: assay_type.index(),
                chamber: chamber.number(),
            });
        }
        self.insert_reservation(assay_type, chambers);
        self.trail.record(Change::Reserved {
            assay_type,
            chambers,
        });
        Ok(())
    }

    /// Remove an assay type's reservation and the replicas it placed,
    /// returning the chamber set it held.
    pub fn unreserve(&mut self, assay_type: AssayType) -> Result<ChamberSet, StateError> {
        self.check_mutable()?;
        self.check_type(assay_type)?;
        let chambers = self.reservations[assay_type.index()].ok_or(StateError::NotReserved {
            index: assay_type.index(),
        })?;
        self.remove_reservation(assay_type, chambers);
        self.trail.record(Change::Unreserved {
            assay_type,
            chambers,
        });
        Ok(chambers)
    }

    /// Open a checkpoint; changes from here on can be undone with `rewind`.
    pub fn checkpoint(&mut self) -> usize {
        self.trail.checkpoint()
    }

    /// Undo every change since the most recent checkpoint.
    ///
    /// Returns false if there was no checkpoint.
    pub fn rewind(&mut self) -> bool {
        let Some(changes) = self.trail.rewind() else {
            return false;
        };
        for change in changes {
            match change {
                Change::Placed { assay, chamber } => self.remove_occupant(assay, chamber),
                Change::Reserved {
                    assay_type,
                    chambers,
                } => self.remove_reservation(assay_type, chambers),
                Change::Unreserved {
                    assay_type,
                    chambers,
                } => self.insert_reservation(assay_type, chambers),
            }
        }
        true
    }

    /// Close the most recent checkpoint, keeping its changes.
    pub fn commit(&mut self) -> bool {
        self.trail.commit()
    }

    /// Make the allocation read-only. Allocators freeze before returning.
    pub fn freeze(&mut self) {
        self.trail.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.trail.is_frozen()
    }

    /// Number of open checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.trail.checkpoint_depth()
    }

    fn check_mutable(&self) -> Result<(), StateError> {
        if self.trail.is_frozen() {
            Err(StateError::Frozen)
        } else {
            Ok(())
        }
    }

    fn check_type(&self, assay_type: AssayType) -> Result<(), StateError> {
        if assay_type.index() < self.num_types {
            Ok(())
        } else {
            Err(StateError::UnknownAssayType {
                index: assay_type.index(),
                num_types: self.num_types,
            })
        }
    }

    fn check_chamber(&self, chamber: Chamber) -> Result<(), StateError> {
        if chamber.number() <= self.num_chambers {
            Ok(())
        } else {
            Err(StateError::UnknownChamber {
                chamber: chamber.number(),
                num_chambers: self.num_chambers,
            })
        }
    }

    fn insert_occupant(&mut self, assay: Assay, chamber: Chamber) {
        self.occupants[chamber.index()].insert(assay);
        self.types_in[chamber.index()].insert(assay.assay_type);
        self.chambers_of[assay.assay_type.index()].insert(chamber);
    }

    fn remove_occupant(&mut self, assay: Assay, chamber: Chamber) {
        self.occupants[chamber.index()].remove(&assay);
        self.types_in[chamber.index()].remove(assay.assay_type);
        self.chambers_of[assay.assay_type.index()].remove(chamber);
    }

    fn insert_reservation(&mut self, assay_type: AssayType, chambers: ChamberSet) {
        for (i, chamber) in chambers.iter().enumerate() {
            self.insert_occupant(Assay::new(assay_type, (i + 1) as u16), chamber);
        }
        self.reservations[assay_type.index()] = Some(chambers);
        self.reserved_by.insert(chambers, assay_type);
    }

    fn remove_reservation(&mut self, assay_type: AssayType, chambers: ChamberSet) {
        for (i, chamber) in chambers.iter().enumerate() {
            self.remove_occupant(Assay::new(assay_type, (i + 1) as u16), chamber);
        }
        self.reservations[assay_type.index()] = None;
        self.reserved_by.remove(&chambers);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn num_chambers(&self) -> usize {
        self.num_chambers
    }

    pub fn num_assay_types(&self) -> usize {
        self.num_types
    }

    pub fn assay_types_present_in(&self, chamber: Chamber) -> TypeSet {
        self.types_in[chamber.index()]
    }

    /// The replicas in a chamber, in (type, replica) order.
    pub fn occupants(&self, chamber: Chamber) -> impl Iterator<Item = Assay> + '_ {
        self.occupants[chamber.index()].iter().copied()
    }

    pub fn occupant_count(&self, chamber: Chamber) -> usize {
        self.occupants[chamber.index()].len()
    }

    /// Every chamber holding a replica of this type.
    pub fn chambers_for(&self, assay_type: AssayType) -> ChamberSet {
        self.chambers_of[assay_type.index()]
    }

    /// The chamber set reserved for this type, if any.
    pub fn reservation(&self, assay_type: AssayType) -> Option<ChamberSet> {
        self.reservations[assay_type.index()]
    }

    /// All reservations, in priority order of the reserving type.
    pub fn reserved_chamber_sets(&self) -> Vec<(AssayType, ChamberSet)> {
        self.reservations
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|set| (AssayType::new(i), set)))
            .collect()
    }

    pub fn is_chamber_set_already_reserved(&self, chambers: ChamberSet) -> bool {
        self.reserved_by.contains_key(&chambers)
    }

    pub fn which_assay_reserved(&self, chambers: ChamberSet) -> Option<AssayType> {
        self.reserved_by.get(&chambers).copied()
    }

    /// Chambers holding at least one of the given types.
    pub fn chambers_containing_any(&self, types: TypeSet) -> ChamberSet {
        types
            .iter()
            .fold(ChamberSet::empty(), |acc, t| acc.union(self.chambers_of[t.index()]))
    }

    /// Every unordered pair of distinct types sharing this chamber.
    pub fn assay_type_pairs_in(&self, chamber: Chamber) -> Vec<(AssayType, AssayType)> {
        let types: Vec<AssayType> = self.types_in[chamber.index()].iter().collect();
        let mut pairs = Vec::new();
        for (i, &a) in types.iter().enumerate() {
            for &b in &types[i + 1..] {
                pairs.push((a, b));
            }
        }
        pairs
    }

    /// Every unordered pair of types sharing at least one chamber.
    pub fn unique_assay_type_pairs(&self) -> BTreeSet<(AssayType, AssayType)> {
        (1..=self.num_chambers)
            .flat_map(|n| self.assay_type_pairs_in(Chamber::new(n)))
            .collect()
    }

    /// Sum of occupant counts across a chamber set.
    pub fn crowdedness(&self, chambers: ChamberSet) -> usize {
        chambers.iter().map(|c| self.occupant_count(c)).sum()
    }

    /// Number of replicas placed in total.
    pub fn total_replicas(&self) -> usize {
        self.occupants.iter().map(BTreeSet::len).sum()
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// One line per chamber, e.g. "003 A1,B2".
    pub fn format_chambers(&self, design: &ExperimentDesign) -> Vec<String> {
        (1..=self.num_chambers)
            .map(|n| {
                let chamber = Chamber::new(n);
                let mut labels: Vec<String> =
                    self.occupants(chamber).map(|a| design.label(a)).collect();
                labels.sort();
                format!("{} {}", chamber, labels.join(","))
            })
            .collect()
    }

    /// Chambers laid out row-major in `columns` columns, each cell padded to
    /// the widest line.
    pub fn format_table(&self, design: &ExperimentDesign, columns: usize) -> String {
        let lines = self.format_chambers(design);
        let width = lines.iter().map(String::len).max().unwrap_or(0);
        let mut table = String::new();
        for row in lines.chunks(columns.max(1)) {
            let cells: Vec<String> = row.iter().map(|l| format!("{:<width$}", l)).collect();
            table.push_str(cells.join("  ").trim_end());
            table.push('\n');
        }
        table
    }
}

impl PartialEq for Allocation {
    /// Compares content; the undo history is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.num_chambers == other.num_chambers
            && self.num_types == other.num_types
            && self.occupants == other.occupants
            && self.reservations == other.reservations
    }
}

impl Eq for Allocation {}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: usize) -> AssayType {
        AssayType::new(i)
    }

    #[test]
    fn test_reserve_indexes_both_ways() {
        let mut alloc = Allocation::with_dimensions(4, 2);
        let set = ChamberSet::from_numbers(&[1, 2, 3]);
        alloc.reserve(t(0), set).unwrap();

        assert_eq!(alloc.reservation(t(0)), Some(set));
        assert_eq!(alloc.chambers_for(t(0)), set);
        assert!(alloc.is_chamber_set_already_reserved(set));
        assert_eq!(alloc.which_assay_reserved(set), Some(t(0)));
        assert!(alloc.assay_types_present_in(Chamber::new(2)).contains(t(0)));
        assert!(alloc.assay_types_present_in(Chamber::new(4)).is_empty());

        let replicas: Vec<u16> = (1..=3)
            .flat_map(|n| alloc.occupants(Chamber::new(n)).map(|a| a.replica).collect::<Vec<_>>())
            .collect();
        assert_eq!(replicas, vec![1, 2, 3]);
        assert_eq!(alloc.total_replicas(), 3);
    }

    #[test]
    fn test_reserve_rejects_reserved_set() {
        let mut alloc = Allocation::with_dimensions(4, 2);
        let set = ChamberSet::from_numbers(&[1, 2]);
        alloc.reserve(t(0), set).unwrap();
        assert_eq!(
            alloc.reserve(t(1), set),
            Err(StateError::ChamberSetAlreadyReserved {
                chambers: "{1,2}".to_string()
            })
        );
        assert_eq!(
            alloc.reserve(t(0), ChamberSet::from_numbers(&[3, 4])),
            Err(StateError::AlreadyReserved { index: 0 })
        );
    }

    #[test]
    fn test_unknown_chambers_and_types_are_rejected() {
        let mut alloc = Allocation::with_dimensions(4, 2);
        assert_eq!(
            alloc.reserve(t(0), ChamberSet::from_numbers(&[4, 5])),
            Err(StateError::UnknownChamber {
                chamber: 5,
                num_chambers: 4
            })
        );
        assert_eq!(
            alloc.place(Assay::new(t(2), 1), Chamber::new(1)),
            Err(StateError::UnknownAssayType {
                index: 2,
                num_types: 2
            })
        );
        assert_eq!(
            alloc.reserve(t(0), ChamberSet::empty()),
            Err(StateError::EmptyChamberSet)
        );
        assert_eq!(alloc, Allocation::with_dimensions(4, 2));
    }

    #[test]
    fn test_place_rejects_second_replica_in_chamber() {
        let mut alloc = Allocation::with_dimensions(3, 1);
        alloc.place(Assay::new(t(0), 1), Chamber::new(2)).unwrap();
        assert_eq!(
            alloc.place(Assay::new(t(0), 2), Chamber::new(2)),
            Err(StateError::DuplicateOccupant {
                index: 0,
                chamber: 2
            })
        );
    }

    #[test]
    fn test_unreserve_restores_prior_state() {
        let mut alloc = Allocation::with_dimensions(5, 3);
        alloc.reserve(t(0), ChamberSet::from_numbers(&[1, 2, 3])).unwrap();
        let before = alloc.clone();

        let set = ChamberSet::from_numbers(&[2, 4, 5]);
        alloc.reserve(t(1), set).unwrap();
        assert_eq!(alloc.unreserve(t(1)), Ok(set));
        assert_eq!(alloc, before);
        assert!(!alloc.is_chamber_set_already_reserved(set));
        assert_eq!(alloc.unreserve(t(1)), Err(StateError::NotReserved { index: 1 }));
    }

    #[test]
    fn test_rewind_undoes_speculation() {
        let mut alloc = Allocation::with_dimensions(5, 3);
        alloc.reserve(t(0), ChamberSet::from_numbers(&[1, 2, 3])).unwrap();
        let before = alloc.clone();

        alloc.checkpoint();
        alloc.reserve(t(1), ChamberSet::from_numbers(&[3, 4, 5])).unwrap();
        alloc.unreserve(t(0)).unwrap();
        alloc.place(Assay::new(t(2), 1), Chamber::new(1)).unwrap();
        assert!(alloc.rewind());

        assert_eq!(alloc, before);
        assert_eq!(alloc.checkpoint_depth(), 0);
        assert!(!alloc.rewind());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut alloc = Allocation::with_dimensions(4, 2);
        alloc.checkpoint();
        alloc.reserve(t(0), ChamberSet::from_numbers(&[1, 2])).unwrap();
        assert!(alloc.commit());
        assert!(!alloc.rewind());
        assert!(alloc.reservation(t(0)).is_some());
    }

    #[test]
    fn test_frozen_allocation_is_read_only() {
        let mut alloc = Allocation::with_dimensions(4, 2);
        alloc.reserve(t(0), ChamberSet::from_numbers(&[1, 2])).unwrap();
        alloc.freeze();
        assert!(alloc.is_frozen());
        assert_eq!(alloc.unreserve(t(0)), Err(StateError::Frozen));
        assert_eq!(
            alloc.place(Assay::new(t(1), 1), Chamber::new(3)),
            Err(StateError::Frozen)
        );
    }

    #[test]
    fn test_pair_queries() {
        let mut alloc = Allocation::with_dimensions(3, 3);
        alloc.reserve(t(0), ChamberSet::from_numbers(&[1, 2])).unwrap();
        alloc.reserve(t(1), ChamberSet::from_numbers(&[1, 3])).unwrap();
        alloc.reserve(t(2), ChamberSet::from_numbers(&[1, 2, 3])).unwrap();

        assert_eq!(
            alloc.assay_type_pairs_in(Chamber::new(1)),
            vec![(t(0), t(1)), (t(0), t(2)), (t(1), t(2))]
        );
        assert_eq!(alloc.unique_assay_type_pairs().len(), 3);
        assert_eq!(alloc.crowdedness(ChamberSet::from_numbers(&[1, 2])), 5);
        assert_eq!(
            alloc.chambers_containing_any(TypeSet::from_types(&[t(0), t(1)])),
            ChamberSet::first_n(3)
        );
    }

    #[test]
    fn test_format_chambers_and_table() {
        let design = ExperimentDesign::builder()
            .chambers(3)
            .max_targets(1)
            .assay("A", 2)
            .assay("B", 2)
            .build()
            .unwrap();
        let mut alloc = Allocation::new(&design);
        alloc.reserve(t(0), ChamberSet::from_numbers(&[1, 2])).unwrap();
        alloc.reserve(t(1), ChamberSet::from_numbers(&[2, 3])).unwrap();

        assert_eq!(
            alloc.format_chambers(&design),
            vec!["001 A1", "002 A2,B1", "003 B2"]
        );
        assert_eq!(
            alloc.format_table(&design, 2),
            "001 A1     002 A2,B1\n003 B2\n"
        );
    }
}
