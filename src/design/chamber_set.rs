// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Chamber and ChamberSet types.
//!
//! Chambers are numbered from 1. A ChamberSet is a compact bitset where bit
//! `n - 1` represents chamber `n`, so that reserved chamber-sets can be hashed,
//! compared and intersected in O(1).
//!
//! # Examples
//!
//! ```
//! use assay_alloc::design::{Chamber, ChamberSet};
//!
//! let mut set = ChamberSet::empty();
//! set.insert(Chamber::new(1));
//! set.insert(Chamber::new(4));
//! set.insert(Chamber::new(7));
//!
//! assert_eq!(set.len(), 3);
//! assert_eq!(format!("{}", set), "{1,4,7}");
//!
//! let other = ChamberSet::from_numbers(&[4, 7, 9]);
//! assert_eq!(set.intersection(other).len(), 2);
//! ```

use serde::{Serialize, Serializer};
use std::fmt;

/// Largest number of chambers an experiment may use (bitset width).
pub const MAX_CHAMBERS: usize = 128;

/// A chamber, numbered 1..=MAX_CHAMBERS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chamber(u8);

impl Chamber {
    /// Create a chamber from its 1-based number, panicking if out of range.
    ///
    /// # Panics
    ///
    /// Panics if `number` is 0 or greater than `MAX_CHAMBERS`.
    pub fn new(number: usize) -> Self {
        assert!(
            (1..=MAX_CHAMBERS).contains(&number),
            "Chamber out of range: {}",
            number
        );
        Self((number - 1) as u8)
    }

    /// Try to create a chamber, returning None if out of range.
    pub fn try_new(number: usize) -> Option<Self> {
        if (1..=MAX_CHAMBERS).contains(&number) {
            Some(Self((number - 1) as u8))
        } else {
            None
        }
    }

    /// The 1-based chamber number.
    pub fn number(self) -> usize {
        self.0 as usize + 1
    }

    /// The 0-based index (for array indexing).
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Chamber {
    /// Format a chamber as a zero-padded three digit number, e.g. "007".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.number())
    }
}

impl Serialize for Chamber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.number() as u64)
    }
}

/// A set of chambers represented as a bitset.
///
/// Equality and hashing are structural, which is what the reservation index
/// relies on: the same chambers always make the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChamberSet(u128);

impl ChamberSet {
    /// Create an empty chamber set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The set of chambers 1..=n.
    ///
    /// # Panics
    ///
    /// Panics if `n > MAX_CHAMBERS`.
    pub fn first_n(n: usize) -> Self {
        assert!(n <= MAX_CHAMBERS, "Too many chambers: {}", n);
        if n == MAX_CHAMBERS {
            Self(u128::MAX)
        } else {
            Self((1u128 << n) - 1)
        }
    }

    /// Create a chamber set from chambers.
    pub fn from_chambers(chambers: &[Chamber]) -> Self {
        chambers.iter().copied().collect()
    }

    /// Create a chamber set from 1-based chamber numbers.
    ///
    /// # Panics
    ///
    /// Panics if any number is out of range.
    pub fn from_numbers(numbers: &[usize]) -> Self {
        numbers.iter().map(|&n| Chamber::new(n)).collect()
    }

    /// Create a chamber set from a raw bit value.
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    /// Check if the set contains a specific chamber.
    pub fn contains(self, chamber: Chamber) -> bool {
        (self.0 >> chamber.index()) & 1 != 0
    }

    /// Insert a chamber into the set.
    pub fn insert(&mut self, chamber: Chamber) {
        self.0 |= 1u128 << chamber.index();
    }

    /// Remove a chamber from the set.
    pub fn remove(&mut self, chamber: Chamber) {
        self.0 &= !(1u128 << chamber.index());
    }

    /// Number of chambers in the set.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying bitset value.
    pub fn bits(self) -> u128 {
        self.0
    }

    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// True when the two sets share at least one chamber.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Iterate over the chambers in ascending order.
    pub fn iter(self) -> impl Iterator<Item = Chamber> {
        ChamberSetIter { bits: self.0 }
    }

    /// The 1-based chamber numbers, ascending.
    pub fn numbers(self) -> Vec<usize> {
        self.iter().map(Chamber::number).collect()
    }
}

/// Iterator over chambers in a ChamberSet.
struct ChamberSetIter {
    bits: u128,
}

impl Iterator for ChamberSetIter {
    type Item = Chamber;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bits == 0 {
            return None;
        }
        let index = self.bits.trailing_zeros() as u8;
        self.bits &= self.bits - 1;
        Some(Chamber(index))
    }
}

impl FromIterator<Chamber> for ChamberSet {
    fn from_iter<I: IntoIterator<Item = Chamber>>(iter: I) -> Self {
        let mut set = Self::empty();
        for chamber in iter {
            set.insert(chamber);
        }
        set
    }
}

impl fmt::Display for ChamberSet {
    /// Format a chamber set as "{1,4,7}".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, chamber) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", chamber.number())?;
        }
        write!(f, "}}")
    }
}

impl Serialize for ChamberSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Chamber::number))
    }
}
