//! Headless tactics runner.
//!
//! Runs the decision engine without a game client: against scenario files
//! in the built-in sandbox, or as a JSON lines service on stdin/stdout.
//!
//! # Usage
//!
//! ```bash
//! # Serve decisions for a game adapter
//! cargo run -p tactics_headless -- serve --units scenarios/units.ron
//!
//! # Run one scenario, printing intents as JSON lines
//! cargo run -p tactics_headless -- run --scenario scenarios/kiting_duel.ron
//!
//! # Run every scenario in a directory in parallel
//! cargo run -p tactics_headless -- batch --dir scenarios --output results/batch.json
//!
//! # Check a scenario runs identically twice
//! cargo run -p tactics_headless -- verify --scenario scenarios/squad_push.ron
//! ```
//!
//! Output (stdout): JSON lines. Logs (stderr): human-readable tracing output.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tactics_core::config::TacticsConfig;
use tactics_core::data::UnitTypeRegistry;
use tactics_core::engine::TacticsEngine;
use tactics_core::pathing::StraightLine;
use tactics_headless::{
    batch::{run_batch, BatchConfig},
    runner::{serve, verify_determinism, ScenarioRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless runner for the RTS tactical decision engine")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer JSON snapshot lines on stdin with intent lines on stdout
    Serve {
        /// RON file of unit types
        #[arg(short, long)]
        units: PathBuf,

        /// RON file of tactics configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run one scenario in the sandbox
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's tick limit
        #[arg(short, long)]
        ticks: Option<u64>,

        /// RON file of tactics configuration overriding the scenario's
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only print the final summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run every scenario in a directory
    Batch {
        /// Directory of scenario files
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Override every scenario's tick limit
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Write results JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also check each scenario for determinism
        #[arg(long)]
        verify: bool,
    },

    /// Load and check a scenario without running it
    Validate {
        /// Scenario file to check
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// Run a scenario twice and compare intent hashes
    Verify {
        /// Scenario file to check
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for JSON lines)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Serve { units, config } => cmd_serve(&units, config.as_deref()),
        Commands::Run {
            scenario,
            ticks,
            config,
            quiet,
        } => cmd_run(&scenario, ticks, config.as_deref(), quiet),
        Commands::Batch {
            dir,
            parallel,
            ticks,
            output,
            verify,
        } => cmd_batch(&dir, parallel, ticks, output.as_deref(), verify),
        Commands::Validate { scenario } => cmd_validate(&scenario),
        Commands::Verify { scenario } => cmd_verify(&scenario),
    }
}

/// Print an error and exit with status 1.
fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn load_scenario(path: &Path) -> Scenario {
    Scenario::load(path).unwrap_or_else(|e| fail(e))
}

fn load_config(path: &Path) -> TacticsConfig {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("Failed to read {}: {e}", path.display())));
    let config = TacticsConfig::from_ron_str(&path.display().to_string(), &text)
        .unwrap_or_else(|e| fail(e));
    config.validate().unwrap_or_else(|e| fail(e));
    config
}

/// Serve decisions over stdin/stdout
fn cmd_serve(units: &Path, config: Option<&Path>) {
    let text = std::fs::read_to_string(units)
        .unwrap_or_else(|e| fail(format!("Failed to read {}: {e}", units.display())));
    let registry = UnitTypeRegistry::from_ron_str(&units.display().to_string(), &text)
        .unwrap_or_else(|e| fail(e));
    let config = config.map(load_config).unwrap_or_default();
    let mut engine = TacticsEngine::new(registry, config).unwrap_or_else(|e| fail(e));

    tracing::info!(units = %units.display(), "Serving decisions on stdin");
    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = serve(&mut engine, &StraightLine, stdin.lock(), stdout.lock()) {
        fail(format!("Serve session failed: {e}"));
    }
}

/// Run a single scenario in the sandbox
fn cmd_run(path: &Path, ticks: Option<u64>, config: Option<&Path>, quiet: bool) {
    let mut scenario = load_scenario(path);
    if let Some(ticks) = ticks {
        scenario.ticks = ticks;
    }
    let runner = match config {
        Some(config) => ScenarioRunner::with_config(&scenario, load_config(config)),
        None => ScenarioRunner::new(&scenario),
    }
    .unwrap_or_else(|e| fail(e));

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = if quiet {
        runner.run(None)
    } else {
        runner.run(Some(&mut out))
    };
    let summary = result.unwrap_or_else(|e| fail(e));

    eprintln!();
    eprintln!("═══════════════════════════════════════");
    eprintln!("  Scenario: {}", summary.scenario);
    eprintln!("  Ticks:    {}", summary.ticks_run);
    match summary.winner {
        Some(winner) => eprintln!("  Winner:   {winner:?}"),
        None => eprintln!("  Winner:   undecided"),
    }
    eprintln!(
        "  Alive:    {} friendly / {} enemy",
        summary.friendly_alive, summary.enemy_alive
    );
    eprintln!("  Intents:  {}", summary.intents_issued);
    for (state, count) in &summary.state_counts {
        eprintln!("    {state:<12} {count}");
    }
    eprintln!("  Hash:     {:016x}", summary.intent_hash);
    eprintln!("═══════════════════════════════════════");
}

/// Run a directory of scenarios
fn cmd_batch(dir: &Path, parallel: usize, ticks: Option<u64>, output: Option<&Path>, verify: bool) {
    let mut config = BatchConfig::from_dir(dir)
        .unwrap_or_else(|e| fail(format!("Failed to read {}: {e}", dir.display())))
        .with_parallel(parallel);
    if let Some(ticks) = ticks {
        config = config.with_max_ticks(ticks);
    }
    if verify {
        config = config.with_determinism_check();
    }
    if config.scenarios.is_empty() {
        fail(format!("No scenarios found in {}", dir.display()));
    }

    let results = run_batch(config);
    for entry in &results.runs {
        let winner = entry
            .summary
            .winner
            .map_or_else(|| "undecided".to_string(), |w| format!("{w:?}"));
        let check = match entry.deterministic {
            Some(true) => " [deterministic]",
            Some(false) => " [DIVERGED]",
            None => "",
        };
        eprintln!(
            "  {:<24} {:>4} ticks  {:<10}{check}",
            entry.summary.scenario, entry.summary.ticks_run, winner
        );
    }
    for error in &results.errors {
        eprintln!("  {}: {}", error.path.display(), error.message);
    }

    if let Some(output) = output {
        results
            .save(output)
            .unwrap_or_else(|e| fail(format!("Failed to write {}: {e}", output.display())));
        eprintln!("Results saved to {}", output.display());
    }
    if !results.errors.is_empty() || !results.all_deterministic() {
        std::process::exit(1);
    }
}

/// Check a scenario file
fn cmd_validate(path: &Path) {
    let scenario = load_scenario(path);
    scenario.validate().unwrap_or_else(|e| fail(e));
    eprintln!(
        "OK: {} ({} unit types, {} entities, {} groups)",
        scenario.name,
        scenario.unit_types.len(),
        scenario.entities.len(),
        scenario.groups.len()
    );
}

/// Verify a scenario is deterministic
fn cmd_verify(path: &Path) {
    let scenario = load_scenario(path);
    match verify_determinism(&scenario) {
        Ok(true) => eprintln!("PASS: {} is deterministic", scenario.name),
        Ok(false) => fail(format!("{} produced different intent streams", scenario.name)),
        Err(e) => fail(e),
    }
}
