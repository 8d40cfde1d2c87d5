// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! CLI for assay-alloc: allocate assay replicas to test chambers.

use assay_alloc::allocator::LogTracer;
use assay_alloc::report::ExperimentReporter;
use assay_alloc::sweep::{chambers_required, run_sweep, SweepGrid, SweepOutcome};
use assay_alloc::verify::verify;
use assay_alloc::{AllocatorConfig, DesignParams, ExperimentDesign, Strategy};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "assay-alloc")]
#[command(about = "Allocate assay replicas to test chambers without false-positive calls")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    shared: Shared,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Shared {
    /// Allocation strategy: exhaustive, pruning, pattern or greedy.
    /// Defaults to exhaustive, or greedy for the reference example, or
    /// pruning for sweeps.
    #[arg(long, global = true)]
    strategy: Option<Strategy>,

    /// Allocator configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Check the finished allocation against every invariant the strategy promises
    #[arg(long, global = true)]
    verify: bool,

    /// More logging; repeat for more detail. RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate a design built from numeric parameters.
    Allocate {
        /// Number of assay types, named A, B, C...
        #[arg(long, default_value = "4")]
        assays: usize,

        /// Number of chambers
        #[arg(long, default_value = "8")]
        chambers: usize,

        /// Most targets that may be present at once
        #[arg(long, default_value = "2")]
        targets: usize,

        /// Replicas per assay type (default: targets + 1)
        #[arg(long)]
        replicas: Option<usize>,

        /// Number of don't-mix pairs
        #[arg(long, default_value = "0")]
        dontmix: usize,

        /// Number of simulated targets present, for the report
        #[arg(long, default_value = "0")]
        present: usize,

        /// Read the parameters from a JSON file instead
        #[arg(long, conflicts_with_all = ["assays", "chambers", "targets", "replicas", "dontmix", "present"])]
        params: Option<PathBuf>,
    },

    /// Allocate the built-in 14-assay, 8-chamber example.
    Reference,

    /// Try an allocation at every grid point and report which worked.
    Sweep {
        /// Target bounds to try (comma-separated)
        #[arg(long, value_delimiter = ',')]
        targets: Option<Vec<usize>>,

        /// Assay counts to try (comma-separated)
        #[arg(long, value_delimiter = ',')]
        assays: Option<Vec<usize>>,

        /// Chamber counts to try (comma-separated)
        #[arg(long, value_delimiter = ',')]
        chambers: Option<Vec<usize>>,
    },

    /// Estimate the chambers needed to distinguish every set of present targets.
    ChambersRequired {
        /// Assay counts (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "20,40,80")]
        assays: Vec<usize>,

        /// Simultaneous target counts (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "3,4,5")]
        targets: Vec<usize>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

fn load_config(shared: &Shared) -> AllocatorConfig {
    match &shared.config {
        Some(path) => AllocatorConfig::load(path)
            .unwrap_or_else(|e| fail(format!("{}: {e}", path.display()))),
        None => AllocatorConfig::default(),
    }
}

/// Reservation strategies fix their own replica count, so a requested
/// one has no effect there.
fn ignored_replicas(
    requested: Option<usize>,
    strategy: Strategy,
    config: &AllocatorConfig,
    max_targets: usize,
) -> Option<String> {
    let requested = requested?;
    if !strategy.reserves() {
        return None;
    }
    Some(format!(
        "{strategy} ignores replicas = {requested}; it places {} of each assay",
        config.replicas_for(strategy, max_targets)
    ))
}

fn allocate(
    design: &ExperimentDesign,
    strategy: Strategy,
    config: &AllocatorConfig,
    shared: &Shared,
) {
    let mut allocator = strategy.build(design, config, Box::new(LogTracer));
    let alloc = match allocator.allocate() {
        Ok(alloc) => alloc,
        Err(e) => fail(e),
    };
    log::info!("{}: {}", allocator.name(), allocator.statistics());

    let reporter = ExperimentReporter::new(design, &alloc);
    if shared.json {
        match reporter.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => fail(e),
        }
    } else {
        for line in reporter.lines() {
            println!("{line}");
        }
    }

    if shared.verify {
        let violations = verify(design, &alloc, strategy, config);
        if !violations.is_empty() {
            for violation in &violations {
                eprintln!("violation: {violation}");
            }
            std::process::exit(2);
        }
        eprintln!("verified: no violations");
    }
}

fn sweep(grid: SweepGrid, strategy: Strategy, shared: &Shared) {
    let config = load_config(shared);
    let outcomes = run_sweep(&grid, strategy, &config);
    if shared.json {
        match serde_json::to_string_pretty(&outcomes) {
            Ok(json) => println!("{json}"),
            Err(e) => fail(e),
        }
        return;
    }
    println!("{}", SweepOutcome::HEADER);
    for outcome in &outcomes {
        println!("{}", outcome.line());
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.shared.verbose);
    let shared = &cli.shared;

    match cli.command {
        Commands::Allocate {
            assays,
            chambers,
            targets,
            replicas,
            dontmix,
            present,
            params,
        } => {
            let params = match params {
                Some(path) => DesignParams::load(&path)
                    .unwrap_or_else(|e| fail(format!("{}: {e}", path.display()))),
                None => DesignParams {
                    replicas,
                    dontmix,
                    targets_present: present,
                    ..DesignParams::new(assays, chambers, targets)
                },
            };
            let design = ExperimentDesign::from_params(&params).unwrap_or_else(|e| fail(e));
            let strategy = shared.strategy.unwrap_or(Strategy::Exhaustive);
            let config = load_config(shared);
            if let Some(warning) =
                ignored_replicas(params.replicas, strategy, &config, design.max_targets())
            {
                log::warn!("{warning}");
            }
            allocate(&design, strategy, &config, shared);
        }
        Commands::Reference => {
            let design = ExperimentDesign::reference_example();
            let config = load_config(shared);
            allocate(&design, shared.strategy.unwrap_or(Strategy::Greedy), &config, shared);
        }
        Commands::Sweep {
            targets,
            assays,
            chambers,
        } => {
            let defaults = SweepGrid::default();
            let grid = SweepGrid {
                targets: targets.unwrap_or(defaults.targets),
                assays: assays.unwrap_or(defaults.assays),
                chambers: chambers.unwrap_or(defaults.chambers),
            };
            sweep(grid, shared.strategy.unwrap_or(Strategy::Pruning), shared);
        }
        Commands::ChambersRequired { assays, targets } => {
            for &n in &assays {
                for &k in &targets {
                    match chambers_required(n, k) {
                        Some(required) => println!(
                            "sim_targets: {k}, assays {n}, chambers required: {required}"
                        ),
                        None => println!("sim_targets: {k}, assays {n}, chambers required: too many"),
                    }
                }
            }
        }
    }
}
