// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Parameter sweeps.
//!
//! A sweep tries one allocation per (targets, assays, chambers) grid point
//! and records whether it worked. Grid points share nothing, so they run in
//! parallel; results come back in grid order regardless.

use crate::allocator::{NullTracer, Strategy};
use crate::config::AllocatorConfig;
use crate::design::{DesignParams, ExperimentDesign};
use crate::error::AllocError;
use crate::targets::binomial;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepGrid {
    pub targets: Vec<usize>,
    pub assays: Vec<usize>,
    pub chambers: Vec<usize>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            targets: vec![3, 4, 5],
            assays: vec![13, 16, 18, 20, 22, 25],
            chambers: vec![14, 17, 19, 21, 23, 26],
        }
    }
}

impl SweepGrid {
    /// Grid points with targets outermost and chambers innermost.
    pub fn points(&self) -> Vec<(usize, usize, usize)> {
        let mut points =
            Vec::with_capacity(self.targets.len() * self.assays.len() * self.chambers.len());
        for &targets in &self.targets {
            for &assays in &self.assays {
                for &chambers in &self.chambers {
                    points.push((targets, assays, chambers));
                }
            }
        }
        points
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub targets: usize,
    pub assays: usize,
    pub chambers: usize,
    pub worked: bool,
    /// Why the design or the allocation failed.
    pub failure: Option<String>,
}

impl SweepOutcome {
    pub const HEADER: &'static str = "TARGETS, ASSAYS, CHAMBERS, WORKED";

    pub fn line(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.targets,
            self.assays,
            self.chambers,
            if self.worked { "y" } else { "" }
        )
    }
}

fn attempt(
    strategy: Strategy,
    config: &AllocatorConfig,
    targets: usize,
    assays: usize,
    chambers: usize,
) -> Result<(), AllocError> {
    let design = ExperimentDesign::from_params(&DesignParams::new(assays, chambers, targets))?;
    let mut allocator = strategy.build(&design, config, Box::new(NullTracer));
    allocator.allocate().map(|_| ())
}

/// Try every grid point with `strategy`. Failures are recorded, not
/// propagated.
pub fn run_sweep(
    grid: &SweepGrid,
    strategy: Strategy,
    config: &AllocatorConfig,
) -> Vec<SweepOutcome> {
    let outcomes: Vec<SweepOutcome> = grid
        .points()
        .into_par_iter()
        .map(|(targets, assays, chambers)| {
            let result = attempt(strategy, config, targets, assays, chambers);
            SweepOutcome {
                targets,
                assays,
                chambers,
                worked: result.is_ok(),
                failure: result.err().map(|e| e.to_string()),
            }
        })
        .collect();
    info!(
        "{} sweep: {} of {} grid points worked",
        strategy,
        outcomes.iter().filter(|o| o.worked).count(),
        outcomes.len()
    );
    outcomes
}

/// Chambers needed to tell apart every choice of `sim_targets` present
/// targets among `assays`: `ceil(log2(C(assays, sim_targets)))`.
///
/// None when the binomial coefficient does not fit in a u128.
pub fn chambers_required(assays: usize, sim_targets: usize) -> Option<usize> {
    let combinations = binomial(assays, sim_targets)?;
    if combinations <= 1 {
        return Some(0);
    }
    Some((u128::BITS - (combinations - 1).leading_zeros()) as usize)
}
