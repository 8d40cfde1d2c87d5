// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The four strategies behind the `Allocator` trait object.

mod common;

use assay_alloc::allocator::{Counters, FocusTracer, RecordingTracer};
use assay_alloc::verify::verify;
use assay_alloc::{
    AllocatorConfig, ChamberSet, ExperimentDesign, NullTracer, Strategy, TraceEvent,
};
use common::{assay_type, assert_verified, design};
use std::io::Write;
use strum::IntoEnumIterator;

#[test]
fn test_every_strategy_through_the_trait() {
    let cases = [
        (Strategy::Exhaustive, design(2, 4, 2)),
        (Strategy::Exhaustive, design(4, 4, 1)),
        (Strategy::Pruning, design(3, 7, 2)),
        (Strategy::Pattern, design(4, 24, 3)),
        (Strategy::Greedy, ExperimentDesign::reference_example()),
    ];
    for (strategy, design) in &cases {
        let mut allocator = strategy.build(design, &AllocatorConfig::default(), Box::new(NullTracer));
        assert_eq!(allocator.name(), strategy.to_string());
        let alloc = allocator
            .allocate()
            .unwrap_or_else(|e| panic!("{strategy}: {e}"));
        assert!(alloc.is_frozen());
        assert!(allocator.statistics().get(Counters::ReplicasPlaced) > 0);
        assert_verified(design, &alloc, *strategy);
    }
}

#[test]
fn test_pattern_overlap_up_to_one_less_than_the_bound() {
    let wide = design(2, 10, 3);
    let alloc = Strategy::Pattern
        .build(&wide, &AllocatorConfig::default(), Box::new(NullTracer))
        .allocate()
        .unwrap();
    let sets = alloc.reserved_chamber_sets();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].1.intersection(sets[1].1).len(), 2);
    assert_verified(&wide, &alloc, Strategy::Pattern);

    // One more shared chamber is too many.
    let narrow = design(2, 9, 3);
    let err = Strategy::Pattern
        .build(&narrow, &AllocatorConfig::default(), Box::new(NullTracer))
        .allocate()
        .unwrap_err();
    assert_eq!(err.unplaced_assay(), Some("B"));
    assert!(err.to_string().contains("shares 3 chambers with <A>"), "{err}");
}

#[test]
fn test_strategies_parse_from_their_names() {
    for strategy in Strategy::iter() {
        assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
    }
}

#[test]
fn test_focus_tracer_follows_one_type() {
    let design = design(2, 4, 2);
    let b = assay_type(&design, "B");
    let mut focus = FocusTracer::new(b, RecordingTracer::default());
    Strategy::Exhaustive
        .build(&design, &AllocatorConfig::default(), Box::new(&mut focus))
        .allocate()
        .unwrap();

    let events = focus.into_inner().events;
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.assay_type() == b));
    assert_eq!(
        events.last(),
        Some(&TraceEvent::Reserved {
            assay_type: b,
            chambers: ChamberSet::from_numbers(&[1, 2, 4]),
        })
    );
}

#[test]
fn test_config_file_sets_the_margin() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"resilience_margin": 1}}"#).unwrap();
    let config = AllocatorConfig::load(file.path()).unwrap();

    let design = design(2, 6, 1);
    let alloc = Strategy::Pruning
        .build(&design, &config, Box::new(NullTracer))
        .allocate()
        .unwrap();
    assert_eq!(
        alloc.reservation(assay_type(&design, "A")),
        Some(ChamberSet::from_numbers(&[1, 2, 3]))
    );
    assert_eq!(
        alloc.reservation(assay_type(&design, "B")),
        Some(ChamberSet::from_numbers(&[4, 5, 6]))
    );
    assert!(verify(&design, &alloc, Strategy::Pruning, &config).is_empty());
}
