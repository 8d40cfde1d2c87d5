// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use assay_alloc::verify::verify;
use assay_alloc::{
    Allocation, AllocatorConfig, AssayType, DesignParams, ExperimentDesign, NullTracer, Strategy,
};

/// A design named A, B, C... with `bound + 1` replicas per type.
pub fn design(assays: usize, chambers: usize, bound: usize) -> ExperimentDesign {
    ExperimentDesign::from_params(&DesignParams::new(assays, chambers, bound))
        .unwrap_or_else(|e| panic!("design({assays}, {chambers}, {bound}): {e}"))
}

pub fn assay_type(design: &ExperimentDesign, name: &str) -> AssayType {
    design
        .type_named(name)
        .unwrap_or_else(|| panic!("no assay type <{name}>"))
}

/// Run `strategy` with the default config and no tracing.
pub fn run(design: &ExperimentDesign, strategy: Strategy) -> Result<Allocation, assay_alloc::AllocError> {
    strategy
        .build(design, &AllocatorConfig::default(), Box::new(NullTracer))
        .allocate()
}

/// Fail with every violation the strategy should have prevented.
pub fn assert_verified(design: &ExperimentDesign, alloc: &Allocation, strategy: Strategy) {
    let violations = verify(design, alloc, strategy, &AllocatorConfig::default());
    assert!(
        violations.is_empty(),
        "{strategy} allocation violates:\n{}\n{}",
        violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        alloc.format_table(design, 4)
    );
}
