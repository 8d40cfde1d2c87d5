// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Hypothetical "targets present" sets.
//!
//! The allocators cannot know which targets an experiment will meet, so they
//! test their placements against a bounded universe of hypotheses: every
//! set of assay types whose size falls within a cardinality bound. The
//! universe is enumerated lexicographically over priority order, so every
//! algorithm built on it is reproducible.
//!
//! Enumerating only the largest size of interest is enough for the
//! false-positive test: a smaller set that makes a chamber set all-fire also
//! does so as part of any superset that still excludes the reserving assay.

use crate::design::{AssayType, ExperimentDesign, TypeSet};

/// k-subsets of 0..n in lexicographic order.
///
/// # Examples
///
/// ```
/// use assay_alloc::targets::Combinations;
///
/// let pairs: Vec<Vec<usize>> = Combinations::new(3, 2).collect();
/// assert_eq!(pairs, vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
/// ```
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            started: false,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }
        let k = self.indices.len();
        // Rightmost index that can still move right.
        let Some(i) = (0..k).rev().find(|&i| self.indices[i] < self.n - k + i) else {
            self.done = true;
            return None;
        };
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// n choose k, or None on overflow.
pub fn binomial(n: usize, k: usize) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // Exact at every step: result is C(n, i) * (n - i) / (i + 1) = C(n, i + 1).
        result = result.checked_mul((n - i) as u128)? / (i as u128 + 1);
    }
    Some(result)
}

/// Which sizes of target set to hypothesise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityBound {
    Exactly(usize),
    /// Every size from `min` to `max` inclusive, smallest first.
    Range { min: usize, max: usize },
}

impl CardinalityBound {
    fn sizes(self) -> std::ops::RangeInclusive<usize> {
        match self {
            CardinalityBound::Exactly(k) => k..=k,
            CardinalityBound::Range { min, max } => min..=max,
        }
    }
}

/// An ordered sequence of hypothetical targets-present sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUniverse {
    sets: Vec<TypeSet>,
}

impl TargetUniverse {
    /// Every subset of the design's assay types whose size is within `bound`.
    pub fn create(design: &ExperimentDesign, bound: CardinalityBound) -> Self {
        let types: Vec<AssayType> = design.assay_types_in_priority_order().collect();
        Self::over(&types, bound)
    }

    /// Every subset of `types` whose size is within `bound`, enumerated
    /// lexicographically over the order given.
    pub fn over(types: &[AssayType], bound: CardinalityBound) -> Self {
        let sets = bound
            .sizes()
            .flat_map(|k| Combinations::new(types.len(), k))
            .map(|combination| combination.iter().map(|&i| types[i]).collect())
            .collect();
        Self { sets }
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeSet> + '_ {
        self.sets.iter().copied()
    }

    pub fn sets(&self) -> &[TypeSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
