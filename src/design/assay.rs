// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Assay identities.
//!
//! An `AssayType` is the position of an assay type in the design's priority
//! order, so that sets of types can be held in a `TypeSet` bitset. Names
//! ("A", "Staph-C", ...) live in the `ExperimentDesign`.
//!
//! An `Assay` is one physical replica of a type: the type plus a 1-based
//! replica index. Equality, hashing and ordering are structural.

use std::fmt;

/// Largest number of assay types an experiment may declare (bitset width).
pub const MAX_ASSAY_TYPES: usize = 128;

/// An assay type, identified by its index in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssayType(u8);

impl AssayType {
    /// Create an assay type from its priority index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= MAX_ASSAY_TYPES`.
    pub fn new(index: usize) -> Self {
        assert!(
            index < MAX_ASSAY_TYPES,
            "Assay type out of range: {}",
            index
        );
        Self(index as u8)
    }

    /// Get the priority index (for array indexing).
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One replica of an assay type, e.g. type "B", replica 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Assay {
    pub assay_type: AssayType,
    /// 1-based replica number.
    pub replica: u16,
}

impl Assay {
    pub fn new(assay_type: AssayType, replica: u16) -> Self {
        Self {
            assay_type,
            replica,
        }
    }
}

/// A set of assay types represented as a bitset over priority indices.
///
/// Used both for chamber occupancy (which types are in a chamber) and for
/// hypothetical targets-present sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeSet(u128);

impl TypeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The set of the first `n` types in priority order.
    pub fn first_n(n: usize) -> Self {
        assert!(n <= MAX_ASSAY_TYPES, "Too many assay types: {}", n);
        if n == MAX_ASSAY_TYPES {
            Self(u128::MAX)
        } else {
            Self((1u128 << n) - 1)
        }
    }

    pub fn from_types(types: &[AssayType]) -> Self {
        types.iter().copied().collect()
    }

    pub fn contains(self, assay_type: AssayType) -> bool {
        (self.0 >> assay_type.index()) & 1 != 0
    }

    pub fn insert(&mut self, assay_type: AssayType) {
        self.0 |= 1u128 << assay_type.index();
    }

    pub fn remove(&mut self, assay_type: AssayType) {
        self.0 &= !(1u128 << assay_type.index());
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when the two sets share at least one type.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterate over the types in priority order.
    pub fn iter(self) -> impl Iterator<Item = AssayType> {
        TypeSetIter { bits: self.0 }
    }
}

struct TypeSetIter {
    bits: u128,
}

impl Iterator for TypeSetIter {
    type Item = AssayType;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bits == 0 {
            return None;
        }
        let index = self.bits.trailing_zeros() as u8;
        self.bits &= self.bits - 1;
        Some(AssayType(index))
    }
}

impl FromIterator<AssayType> for TypeSet {
    fn from_iter<I: IntoIterator<Item = AssayType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for assay_type in iter {
            set.insert(assay_type);
        }
        set
    }
}

impl fmt::Display for TypeSet {
    /// Format by priority index, e.g. "<0,3>". Use the design for names.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for (i, t) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", t.index())?;
        }
        write!(f, ">")
    }
}

/// Generated assay name for a priority index: "A".."Z", then "AA", "AB", ...
pub fn letter_name(index: usize) -> String {
    let mut name = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}
