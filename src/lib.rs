// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Combinatorial allocation of assay replicas to test chambers.
//!
//! A multiplexed diagnostic experiment runs several assay types at once.
//! Each type is deployed as replicas spread over a fixed number of
//! chambers, and a chamber fires when any target it holds is present. A
//! type is called positive when every chamber holding it fires. The
//! allocation problem is to place the replicas so that, with up to a
//! bounded number of targets present, no type is called positive unless its
//! own target is among them.
//!
//! # Architecture
//!
//! ## Immutable inputs
//!
//! - `ExperimentDesign`: the assay types in priority order, their replica
//!   counts, the chamber count, the target bound, don't-mix pairs, and an
//!   optional set of simulated targets for reports.
//! - `TargetUniverse`: the hypothetical target sets a candidate placement is
//!   tested against.
//!
//! ## Mutable state
//!
//! - `Allocation`: which assays occupy which chambers, and which chamber set
//!   each type has reserved. Changes made after a checkpoint are logged on a
//!   trail so a speculative reservation can be undone exactly.
//!
//! # Strategies
//!
//! 1. **ExhaustiveGuard**: for each type, search candidate chamber sets
//!    least crowded first, rejecting any that would let some bounded set of
//!    other targets fire all of a type's chambers.
//! 2. **PruningGuard**: first fit from a pool of chamber sets, pruned after
//!    each reservation so that no two reserved sets overlap too much.
//! 3. **PatternAllocator**: one modular-arithmetic template, rotated per type.
//! 4. **GreedyAllocator**: place replicas one at a time by ranked criteria.
//!    No false-positive guarantee.
//!
//! All four implement `Allocator` and are selected at run time with
//! `Strategy`.
//!
//! # Example
//!
//! ```
//! use assay_alloc::{AllocatorConfig, ExperimentDesign, NullTracer, Strategy};
//!
//! let design = ExperimentDesign::builder()
//!     .chambers(4)
//!     .max_targets(2)
//!     .assay("A", 3)
//!     .assay("B", 3)
//!     .build()
//!     .unwrap();
//! let mut allocator =
//!     Strategy::Exhaustive.build(&design, &AllocatorConfig::default(), Box::new(NullTracer));
//! let alloc = allocator.allocate().unwrap();
//! assert_eq!(alloc.total_replicas(), 6);
//! ```

pub mod allocation;
pub mod allocator;
pub mod config;
pub mod design;
pub mod error;
pub mod report;
pub mod sweep;
pub mod targets;
pub mod verify;

// Re-export commonly used types
pub use allocation::{Allocation, Trail};
pub use allocator::{
    Allocator, ExhaustiveGuard, GreedyAllocator, NullTracer, PatternAllocator, PruningGuard,
    Strategy, TraceEvent, Tracer,
};
pub use config::{AllocatorConfig, Criterion};
pub use design::{Assay, AssayType, Chamber, ChamberSet, DesignParams, ExperimentDesign, TypeSet};
pub use error::{AllocError, DesignError, InfeasibleReason, StateError};
pub use report::ExperimentReporter;
pub use targets::{CardinalityBound, TargetUniverse};
