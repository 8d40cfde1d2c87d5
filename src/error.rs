// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Error types.
//!
//! - `DesignError`: the experiment parameters are malformed (construction time).
//! - `StateError`: the allocation state store was asked to do something that
//!   would break one of its invariants.
//! - `AllocError`: what `Allocator::allocate` returns. `Infeasible` is the
//!   normal failure mode and always names the assay type that could not be
//!   placed. Nothing here is transient: the same inputs fail the same way.

use thiserror::Error;

/// Malformed experiment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("experiment needs at least one chamber")]
    NoChambers,

    #[error("{requested} chambers requested, at most {max} supported")]
    TooManyChambers { requested: usize, max: usize },

    #[error("{requested} assay types requested, at most {max} supported")]
    TooManyAssayTypes { requested: usize, max: usize },

    #[error("assay type <{name}> declared more than once")]
    DuplicateAssayType { name: String },

    #[error("{context} refers to unknown assay type <{name}>")]
    UnknownAssayType { name: String, context: &'static str },

    #[error("assay type <{name}> cannot be paired with itself in a don't-mix rule")]
    SelfDontMix { name: String },

    #[error("assay type <{name}> must have at least one replica")]
    ZeroReplicas { name: String },

    #[error("simultaneous-targets bound must be at least 1")]
    ZeroTargetBound,

    #[error("{requested} don't-mix pairs requested, only {max} can be drawn")]
    TooManyDontMixPairs { requested: usize, max: usize },

    #[error("{requested} targets present requested, only {max} assay types exist")]
    TooManyTargetsPresent { requested: usize, max: usize },
}

/// Misuse of the allocation state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("chamber {chamber} does not exist (experiment has {num_chambers})")]
    UnknownChamber { chamber: usize, num_chambers: usize },

    #[error("assay type index {index} does not exist (experiment has {num_types})")]
    UnknownAssayType { index: usize, num_types: usize },

    #[error("assay type index {index} already occupies chamber {chamber}")]
    DuplicateOccupant { index: usize, chamber: usize },

    #[error("chamber set {chambers} is already reserved")]
    ChamberSetAlreadyReserved { chambers: String },

    #[error("assay type index {index} already has a reservation")]
    AlreadyReserved { index: usize },

    #[error("assay type index {index} has no reservation")]
    NotReserved { index: usize },

    #[error("cannot reserve an empty chamber set")]
    EmptyChamberSet,

    #[error("allocation is frozen")]
    Frozen,
}

/// Why an allocator could not place an assay type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfeasibleReason {
    /// Every candidate chamber-set was either taken or vulnerable.
    NoInvulnerableChamberSet { candidates: usize },

    /// No chamber-set left in the pruned pool accepts the assay.
    PoolExhausted { remaining: usize },

    /// The pattern placement shares too many chambers with an earlier assay.
    ExcessOverlap {
        with: String,
        shared: usize,
        limit: usize,
    },

    /// The template ran out of distinct diagonals.
    NoUnusedDiagonal,

    /// The pattern placement puts the assay beside a don't-mix partner.
    DontMixConflict { chamber: usize },

    /// Some replicas had no legal chamber left.
    NoLegalChamber { unplaced: Vec<String> },
}

impl std::fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfeasibleReason::NoInvulnerableChamberSet { candidates } => {
                write!(
                    f,
                    "none of {} candidate chamber sets avoids false positives",
                    candidates
                )
            }
            InfeasibleReason::PoolExhausted { remaining } => {
                write!(
                    f,
                    "none of the {} chamber sets left in the pool is compatible",
                    remaining
                )
            }
            InfeasibleReason::ExcessOverlap {
                with,
                shared,
                limit,
            } => {
                write!(
                    f,
                    "shares {} chambers with <{}>, more than the {} permitted",
                    shared, with, limit
                )
            }
            InfeasibleReason::NoUnusedDiagonal => write!(f, "no unused diagonals left"),
            InfeasibleReason::DontMixConflict { chamber } => {
                write!(f, "chamber {} holds a don't-mix partner", chamber)
            }
            InfeasibleReason::NoLegalChamber { unplaced } => {
                write!(f, "no legal chamber for: {}", unplaced.join(", "))
            }
        }
    }
}

/// Failure of an allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error(transparent)]
    InvalidDesign(#[from] DesignError),

    #[error("cannot allocate <{assay}>: {reason}")]
    Infeasible {
        assay: String,
        reason: InfeasibleReason,
    },

    #[error("allocation state error: {0}")]
    State(#[from] StateError),
}

impl AllocError {
    /// The assay type that could not be placed, when the run was infeasible.
    pub fn unplaced_assay(&self) -> Option<&str> {
        match self {
            AllocError::Infeasible { assay, .. } => Some(assay),
            _ => None,
        }
    }
}

/// Failure to load an `AllocatorConfig` or `DesignParams` file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasible_message_names_assay() {
        let err = AllocError::Infeasible {
            assay: "C".to_string(),
            reason: InfeasibleReason::PoolExhausted { remaining: 0 },
        };
        assert_eq!(
            err.to_string(),
            "cannot allocate <C>: none of the 0 chamber sets left in the pool is compatible"
        );
        assert_eq!(err.unplaced_assay(), Some("C"));
    }

    #[test]
    fn test_design_error_converts() {
        let err: AllocError = DesignError::NoChambers.into();
        assert_eq!(err, AllocError::InvalidDesign(DesignError::NoChambers));
        assert_eq!(err.unplaced_assay(), None);
    }

    #[test]
    fn test_excess_overlap_message() {
        let reason = InfeasibleReason::ExcessOverlap {
            with: "A".to_string(),
            shared: 3,
            limit: 1,
        };
        assert_eq!(
            reason.to_string(),
            "shares 3 chambers with <A>, more than the 1 permitted"
        );
    }
}
