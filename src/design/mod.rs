// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The experiment mandate and the value types it is expressed in.
//!
//! - Chamber: a numbered test chamber (1-based)
//! - ChamberSet: bitset of chambers
//! - AssayType: an assay type, by priority index
//! - Assay: one replica of an assay type
//! - TypeSet: bitset of assay types
//! - ExperimentDesign: the immutable mandate every allocator works from

pub mod assay;
pub mod chamber_set;
pub mod experiment;

pub use assay::{letter_name, Assay, AssayType, TypeSet, MAX_ASSAY_TYPES};
pub use chamber_set::{Chamber, ChamberSet, MAX_CHAMBERS};
pub use experiment::{DesignBuilder, DesignParams, ExperimentDesign};
