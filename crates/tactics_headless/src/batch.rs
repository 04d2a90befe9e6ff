//! Batch runner over many scenario files.
//!
//! Runs scenarios in parallel using rayon and collects one summary per
//! scenario, optionally checking each one for determinism.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tactics_core::components::Alliance;
use tactics_core::config::TacticsConfig;

use crate::runner::{verify_determinism, RunSummary, ScenarioRunner};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario files to run.
    pub scenarios: Vec<PathBuf>,
    /// Maximum parallel runs (0 = use rayon default).
    pub parallel: usize,
    /// Tick limit override for every scenario.
    pub max_ticks: Option<u64>,
    /// Configuration override for every scenario.
    pub config: Option<TacticsConfig>,
    /// Run each scenario twice and compare hashes.
    pub verify_determinism: bool,
}

impl BatchConfig {
    /// Config for a list of scenario files.
    #[must_use]
    pub fn new(scenarios: Vec<PathBuf>) -> Self {
        Self {
            scenarios,
            ..Default::default()
        }
    }

    /// Collect every `.ron` scenario in a directory, sorted by path.
    ///
    /// Files whose name starts with `units` hold shared unit types and are
    /// skipped.
    pub fn from_dir(dir: &Path) -> std::io::Result<Self> {
        let mut scenarios: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "ron"))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with("units"))
            })
            .collect();
        scenarios.sort();
        Ok(Self::new(scenarios))
    }

    /// Limit the number of parallel runs.
    #[must_use]
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Override the tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Override the tactics configuration.
    #[must_use]
    pub fn with_config(mut self, config: TacticsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Check every scenario for determinism.
    #[must_use]
    pub fn with_determinism_check(mut self) -> Self {
        self.verify_determinism = true;
        self
    }
}

/// Result of one scenario in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Scenario file.
    pub path: PathBuf,
    /// Run summary.
    pub summary: RunSummary,
    /// Determinism check outcome, when requested.
    pub deterministic: Option<bool>,
}

/// Error during a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Scenario file.
    pub path: PathBuf,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Successful runs, in scenario order.
    pub runs: Vec<BatchEntry>,
    /// Scenarios that failed to load or run.
    pub errors: Vec<BatchError>,
    /// Total runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }

    /// Number of runs won by one side.
    #[must_use]
    pub fn wins(&self, alliance: Alliance) -> usize {
        self.runs
            .iter()
            .filter(|r| r.summary.winner == Some(alliance))
            .count()
    }

    /// Whether every checked scenario was deterministic.
    #[must_use]
    pub fn all_deterministic(&self) -> bool {
        self.runs.iter().all(|r| r.deterministic != Some(false))
    }
}

fn run_one(path: &Path, config: &BatchConfig) -> Result<BatchEntry, ScenarioError> {
    let mut scenario = Scenario::load(path)?;
    if let Some(ticks) = config.max_ticks {
        scenario.ticks = ticks;
    }
    if let Some(override_config) = &config.config {
        scenario.config = Some(override_config.clone());
    }
    let summary = ScenarioRunner::new(&scenario)?.run(None)?;
    let deterministic = if config.verify_determinism {
        Some(verify_determinism(&scenario)?)
    } else {
        None
    };
    Ok(BatchEntry {
        path: path.to_path_buf(),
        summary,
        deterministic,
    })
}

/// Run every scenario in the batch.
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        scenarios = config.scenarios.len(),
        parallel = config.parallel,
        "Starting batch run"
    );

    let run_all = || -> Vec<Result<BatchEntry, BatchError>> {
        config
            .scenarios
            .par_iter()
            .map(|path| {
                run_one(path, &config).map_err(|e| BatchError {
                    path: path.clone(),
                    message: e.to_string(),
                })
            })
            .collect()
    };

    let outcomes = if config.parallel > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!(error = %e, "Failed to build thread pool, using the global pool");
                run_all()
            }
        }
    } else {
        run_all()
    };

    let mut runs = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(entry) => runs.push(entry),
            Err(error) => {
                warn!(path = %error.path.display(), message = %error.message, "Scenario failed");
                errors.push(error);
            }
        }
    }

    let results = BatchResults {
        config,
        runs,
        errors,
        duration_seconds: start.elapsed().as_secs_f64(),
    };
    info!(
        runs = results.runs.len(),
        errors = results.errors.len(),
        friendly_wins = results.wins(Alliance::Friendly),
        seconds = results.duration_seconds,
        "Batch run complete"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKIRMISH: &str = r#"Scenario(
        name: "Skirmish",
        ticks: 40,
        unit_types: [
            UnitTypeData(
                id: (1),
                name: "ranger",
                health_max: 100.0,
                radius: 0.5,
                speed: 4.0,
                weapons: [Weapon(range: 5.0, damage: 10.0, period: 1.4)],
            ),
        ],
        entities: [
            CombatEntity(id: 1, unit_type: (1), alliance: Friendly, position: Some((x: 0.0, y: 0.0)), health: Some(100.0)),
            CombatEntity(id: 2, unit_type: (1), alliance: Enemy, position: Some((x: 10.0, y: 0.0)), health: Some(100.0)),
        ],
    )"#;

    fn write_scenarios(dir: &Path) {
        std::fs::write(dir.join("a_skirmish.ron"), SKIRMISH).unwrap();
        std::fs::write(dir.join("b_broken.ron"), "Scenario(name: ").unwrap();
        std::fs::write(dir.join("units.ron"), "[]").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
    }

    #[test]
    fn test_from_dir_skips_unit_files() {
        let dir = tempfile::tempdir().unwrap();
        write_scenarios(dir.path());
        let config = BatchConfig::from_dir(dir.path()).unwrap();
        let names: Vec<_> = config
            .scenarios
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        assert_eq!(names, vec!["a_skirmish.ron", "b_broken.ron"]);
    }

    #[test]
    fn test_batch_collects_runs_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_scenarios(dir.path());
        let config = BatchConfig::from_dir(dir.path())
            .unwrap()
            .with_parallel(2)
            .with_max_ticks(10)
            .with_determinism_check();

        let results = run_batch(config);
        assert_eq!(results.runs.len(), 1);
        assert_eq!(results.errors.len(), 1);
        assert!(results.runs[0].summary.ticks_run <= 10);
        assert!(results.all_deterministic());
    }

    #[test]
    fn test_results_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        write_scenarios(dir.path());
        let results = run_batch(BatchConfig::from_dir(dir.path()).unwrap().with_max_ticks(5));

        let path = dir.path().join("out").join("results.json");
        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.runs.len(), results.runs.len());
        assert_eq!(loaded.runs[0].summary, results.runs[0].summary);
    }
}
