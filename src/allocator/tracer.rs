// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Diagnostic observers.
//!
//! Allocators report what they are doing to a `Tracer` supplied at
//! construction. To follow one assay type through a run, wrap a tracer in a
//! `FocusTracer`.

use crate::design::{Assay, AssayType, Chamber, ChamberSet, ExperimentDesign, TypeSet};

/// Something an allocator did or decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// A candidate chamber set was skipped because another type holds it.
    AlreadyReserved {
        assay_type: AssayType,
        chambers: ChamberSet,
    },
    /// All-fire test avoided: the hypothesis contains the reserving type.
    ReservingAssayPresent {
        assay_type: AssayType,
        reserved_by: AssayType,
        targets: TypeSet,
    },
    /// All-fire test avoided: the hypothesis lacks the newcomer.
    NewcomerAbsent {
        assay_type: AssayType,
        reserved_by: AssayType,
        targets: TypeSet,
    },
    /// A candidate was rejected: `targets` would make every chamber of
    /// `victim`'s set fire.
    Vulnerable {
        assay_type: AssayType,
        chambers: ChamberSet,
        victim: AssayType,
        targets: TypeSet,
    },
    Reserved {
        assay_type: AssayType,
        chambers: ChamberSet,
    },
    PoolPruned {
        assay_type: AssayType,
        removed: usize,
        remaining: usize,
    },
    ReplicaPlaced {
        assay: Assay,
        chamber: Chamber,
    },
    ReplicaUnplaced {
        assay: Assay,
    },
}

impl TraceEvent {
    /// The assay type being placed when this happened.
    pub fn assay_type(&self) -> AssayType {
        match *self {
            TraceEvent::AlreadyReserved { assay_type, .. }
            | TraceEvent::ReservingAssayPresent { assay_type, .. }
            | TraceEvent::NewcomerAbsent { assay_type, .. }
            | TraceEvent::Vulnerable { assay_type, .. }
            | TraceEvent::Reserved { assay_type, .. }
            | TraceEvent::PoolPruned { assay_type, .. } => assay_type,
            TraceEvent::ReplicaPlaced { assay, .. } | TraceEvent::ReplicaUnplaced { assay } => {
                assay.assay_type
            }
        }
    }

    /// Human-readable description using the design's names.
    pub fn describe(&self, design: &ExperimentDesign) -> String {
        let name = |t: AssayType| design.name(t).to_string();
        match *self {
            TraceEvent::AlreadyReserved {
                assay_type,
                chambers,
            } => format!("<{}>: {} already reserved", name(assay_type), chambers),
            TraceEvent::ReservingAssayPresent {
                assay_type,
                reserved_by,
                targets,
            } => format!(
                "<{}>: {} contains reserving <{}>",
                name(assay_type),
                design.format_types(targets),
                name(reserved_by)
            ),
            TraceEvent::NewcomerAbsent {
                assay_type,
                reserved_by,
                targets,
            } => format!(
                "<{}>: {} cannot newly defeat <{}>",
                name(assay_type),
                design.format_types(targets),
                name(reserved_by)
            ),
            TraceEvent::Vulnerable {
                assay_type,
                chambers,
                victim,
                targets,
            } => format!(
                "<{}>: {} rejected, {} would all-fire the set of <{}>",
                name(assay_type),
                chambers,
                design.format_types(targets),
                name(victim)
            ),
            TraceEvent::Reserved {
                assay_type,
                chambers,
            } => format!("<{}>: reserved {}", name(assay_type), chambers),
            TraceEvent::PoolPruned {
                assay_type,
                removed,
                remaining,
            } => format!(
                "<{}>: pruned {} from pool, {} remain",
                name(assay_type),
                removed,
                remaining
            ),
            TraceEvent::ReplicaPlaced { assay, chamber } => {
                format!("{} placed in {}", design.label(assay), chamber)
            }
            TraceEvent::ReplicaUnplaced { assay } => {
                format!("{} has no legal chamber", design.label(assay))
            }
        }
    }
}

pub trait Tracer {
    fn trace(&mut self, design: &ExperimentDesign, event: &TraceEvent);
}

impl<T: Tracer + ?Sized> Tracer for &mut T {
    fn trace(&mut self, design: &ExperimentDesign, event: &TraceEvent) {
        (**self).trace(design, event);
    }
}

/// Forwards every event to `log::trace!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&mut self, design: &ExperimentDesign, event: &TraceEvent) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", event.describe(design));
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn trace(&mut self, _design: &ExperimentDesign, _event: &TraceEvent) {}
}

/// Keeps every event.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl Tracer for RecordingTracer {
    fn trace(&mut self, _design: &ExperimentDesign, event: &TraceEvent) {
        self.events.push(*event);
    }
}

/// Passes on only the events about one assay type.
#[derive(Debug, Clone)]
pub struct FocusTracer<T> {
    focus: AssayType,
    inner: T,
}

impl<T: Tracer> FocusTracer<T> {
    pub fn new(focus: AssayType, inner: T) -> Self {
        Self { focus, inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Tracer> Tracer for FocusTracer<T> {
    fn trace(&mut self, design: &ExperimentDesign, event: &TraceEvent) {
        if event.assay_type() == self.focus {
            self.inner.trace(design, event);
        }
    }
}
