//! Drives the decision engine, either against the sandbox or over stdin.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::io::{self, BufRead, Write};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tactics_core::components::{Alliance, EntityId};
use tactics_core::config::TacticsConfig;
use tactics_core::engagement::EngagementState;
use tactics_core::engine::TacticsEngine;
use tactics_core::intents::IntentBatch;
use tactics_core::pathing::{NavGrid, PathService, StraightLine};
use tactics_core::snapshot::WorldSnapshot;
use tactics_core::tracking::SightingMemory;

use crate::protocol::{Command, Response, UnitStateOutput};
use crate::sandbox::{Sandbox, StepEvents};
use crate::scenario::{Scenario, ScenarioError};

/// Outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Decision passes executed.
    pub ticks_run: u64,
    /// Side left standing, if the battle was decided.
    pub winner: Option<Alliance>,
    /// Friendly units alive at the end.
    pub friendly_alive: usize,
    /// Enemy units alive at the end.
    pub enemy_alive: usize,
    /// Intents issued over the whole run.
    pub intents_issued: u64,
    /// Unit-ticks spent in each engagement state.
    pub state_counts: BTreeMap<String, u64>,
    /// Final engagement state of each surviving friendly unit.
    pub final_states: BTreeMap<EntityId, EngagementState>,
    /// Hash of every intent batch in order.
    pub intent_hash: u64,
    /// Hash of the final sandbox world.
    pub world_hash: u64,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

/// Runs a scenario: engine decisions fed into the sandbox, one pass per step.
pub struct ScenarioRunner {
    name: String,
    ticks: u64,
    engine: TacticsEngine,
    sandbox: Sandbox,
    grid: Option<NavGrid>,
    hasher: DefaultHasher,
    intents_issued: u64,
    state_counts: BTreeMap<String, u64>,
}

impl ScenarioRunner {
    /// Build a runner using the scenario's own configuration.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let config = scenario.tactics_config()?;
        Self::with_config(scenario, config)
    }

    /// Build a runner with a configuration override.
    pub fn with_config(scenario: &Scenario, config: TacticsConfig) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let engine = TacticsEngine::new(scenario.registry()?, config)?;
        Ok(Self {
            name: scenario.name.clone(),
            ticks: scenario.ticks,
            engine,
            sandbox: Sandbox::new(scenario.opening_snapshot()),
            grid: scenario.nav_grid()?,
            hasher: DefaultHasher::new(),
            intents_issued: 0,
            state_counts: BTreeMap::new(),
        })
    }

    /// Override the number of passes to run.
    #[must_use]
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    /// The engine being driven.
    #[must_use]
    pub fn engine(&self) -> &TacticsEngine {
        &self.engine
    }

    /// The sandbox world.
    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// One decision pass followed by one sandbox step.
    pub fn step(&mut self) -> (IntentBatch, StepEvents) {
        let path: &dyn PathService = match &self.grid {
            Some(grid) => grid,
            None => &StraightLine,
        };
        let batch = self.engine.step(self.sandbox.snapshot(), path);

        batch.tick.hash(&mut self.hasher);
        batch.intents().hash(&mut self.hasher);
        self.intents_issued += batch.len() as u64;
        for unit in self.sandbox.snapshot().alive_sorted(Alliance::Friendly) {
            if let Some(state) = self.engine.unit_state(unit.id) {
                *self.state_counts.entry(state.as_str().to_string()).or_insert(0) += 1;
            }
        }

        self.sandbox.apply_intents(&batch);
        let events = self
            .sandbox
            .advance(self.engine.registry(), self.engine.config());
        for &dead in &events.deaths {
            self.engine.on_unit_destroyed(dead);
        }
        (batch, events)
    }

    /// Run to the tick limit or until one side is wiped out, writing one
    /// JSON line per pass to `out` when given.
    pub fn run(mut self, mut out: Option<&mut dyn Write>) -> Result<RunSummary, ScenarioError> {
        let start = Instant::now();
        info!(scenario = %self.name, ticks = self.ticks, "Starting scenario run");

        let mut ticks_run = 0;
        while ticks_run < self.ticks && !self.sandbox.is_finished() {
            let (batch, events) = self.step();
            ticks_run += 1;
            if !events.deaths.is_empty() {
                debug!(tick = batch.tick, deaths = ?events.deaths, "Units destroyed");
            }
            if let Some(out) = out.as_mut() {
                let response = Response::Intents {
                    tick: batch.tick,
                    states: self.friendly_states(),
                    intents: batch.intents().to_vec(),
                };
                out.write_all(response.to_json_line().as_bytes())?;
            }
        }

        let summary = self.summary(ticks_run, start);
        if let Some(out) = out.as_mut() {
            let finished = Response::Finished {
                ticks: summary.ticks_run,
                winner: summary.winner,
                intent_hash: summary.intent_hash,
            };
            out.write_all(finished.to_json_line().as_bytes())?;
            out.flush()?;
        }
        info!(
            scenario = %summary.scenario,
            ticks = summary.ticks_run,
            winner = ?summary.winner,
            intent_hash = format_args!("{:016x}", summary.intent_hash),
            "Scenario run complete"
        );
        Ok(summary)
    }

    fn friendly_states(&self) -> Vec<UnitStateOutput> {
        self.sandbox
            .snapshot()
            .alive_sorted(Alliance::Friendly)
            .iter()
            .filter_map(|u| {
                self.engine
                    .unit_state(u.id)
                    .map(|state| UnitStateOutput { unit: u.id, state })
            })
            .collect()
    }

    fn summary(&self, ticks_run: u64, start: Instant) -> RunSummary {
        RunSummary {
            scenario: self.name.clone(),
            ticks_run,
            winner: self.sandbox.winner(),
            friendly_alive: self.sandbox.alive_count(Alliance::Friendly),
            enemy_alive: self.sandbox.alive_count(Alliance::Enemy),
            intents_issued: self.intents_issued,
            state_counts: self.state_counts.clone(),
            final_states: self
                .friendly_states()
                .into_iter()
                .map(|s| (s.unit, s.state))
                .collect(),
            intent_hash: self.hasher.finish(),
            world_hash: self.sandbox.state_hash(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Run a scenario twice and compare the intent streams.
pub fn verify_determinism(scenario: &Scenario) -> Result<bool, ScenarioError> {
    let first = ScenarioRunner::new(scenario)?.run(None)?;
    let second = ScenarioRunner::new(scenario)?.run(None)?;
    let matches = first.intent_hash == second.intent_hash && first.world_hash == second.world_hash;
    if !matches {
        warn!(
            scenario = %scenario.name,
            first = format_args!("{:016x}", first.intent_hash),
            second = format_args!("{:016x}", second.intent_hash),
            "Scenario runs diverged"
        );
    }
    Ok(matches)
}

// ============================================================================
// Serve mode
// ============================================================================

fn states_for(engine: &TacticsEngine<impl SightingMemory>, snapshot: &WorldSnapshot) -> Vec<UnitStateOutput> {
    snapshot
        .alive_sorted(Alliance::Friendly)
        .iter()
        .filter_map(|u| engine.unit_state(u.id).map(|state| UnitStateOutput { unit: u.id, state }))
        .collect()
}

/// Answer protocol commands from `input` until `quit` or end of input.
///
/// Returns the number of decision passes served. Malformed lines produce an
/// error response and the session continues.
pub fn serve<M: SightingMemory>(
    engine: &mut TacticsEngine<M>,
    path: &dyn PathService,
    input: impl BufRead,
    mut output: impl Write,
) -> io::Result<u64> {
    let mut passes = 0;
    output.write_all(Response::ready(engine.registry().len()).to_json_line().as_bytes())?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match Command::from_json(line) {
            Err(e) => {
                warn!(error = %e, "Rejected protocol line");
                Response::error(format!("Invalid command: {e}"), None)
            }
            Ok(Command::Snapshot(snapshot)) => {
                let batch = engine.step(&snapshot, path);
                passes += 1;
                Response::Intents {
                    tick: batch.tick,
                    states: states_for(engine, &snapshot),
                    intents: batch.intents().to_vec(),
                }
            }
            Ok(Command::UnitDestroyed { unit }) => {
                engine.on_unit_destroyed(unit);
                Response::ack("unit_destroyed")
            }
            Ok(Command::EndSession) => {
                engine.end_session();
                Response::ack("end_session")
            }
            Ok(Command::Quit) => break,
        };
        output.write_all(response.to_json_line().as_bytes())?;
        output.flush()?;
    }

    output.write_all(Response::Bye.to_json_line().as_bytes())?;
    output.flush()?;
    info!(passes, "Serve session closed");
    Ok(passes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactics_test_utils::fixtures::roster;

    const CLASH: &str = r#"
        Scenario(
            name: "Clash",
            ticks: 60,
            unit_types: [
                UnitTypeData(
                    id: (1),
                    name: "ranger",
                    health_max: 100.0,
                    radius: 0.5,
                    speed: 4.0,
                    weapons: [Weapon(range: 5.0, damage: 10.0, period: 1.4)],
                ),
                UnitTypeData(
                    id: (2),
                    name: "brute",
                    health_max: 60.0,
                    radius: 0.5,
                    speed: 2.5,
                    weapons: [Weapon(range: 0.1, damage: 8.0, period: 1.4)],
                ),
            ],
            entities: [
                CombatEntity(id: 1, unit_type: (1), alliance: Friendly, position: Some((x: 0.0, y: 0.0)), health: Some(100.0)),
                CombatEntity(id: 2, unit_type: (1), alliance: Friendly, position: Some((x: 0.0, y: 2.0)), health: Some(100.0)),
                CombatEntity(id: 10, unit_type: (2), alliance: Enemy, position: Some((x: 12.0, y: 1.0)), health: Some(60.0)),
            ],
        )
    "#;

    #[test]
    fn test_run_writes_json_lines() {
        let scenario = Scenario::from_ron_str(CLASH).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let summary = ScenarioRunner::new(&scenario)
            .unwrap()
            .with_ticks(5)
            .run(Some(&mut out))
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len() as u64, summary.ticks_run + 1);
        assert!(lines[0].contains(r#""type":"intents""#));
        assert!(lines.last().unwrap().contains(r#""type":"finished""#));
    }

    #[test]
    fn test_rangers_beat_lone_brute() {
        let scenario = Scenario::from_ron_str(CLASH).unwrap();
        let summary = ScenarioRunner::new(&scenario).unwrap().run(None).unwrap();
        assert_eq!(summary.winner, Some(Alliance::Friendly));
        assert_eq!(summary.enemy_alive, 0);
        assert!(summary.ticks_run < 60);
        assert!(summary.intents_issued > 0);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let scenario = Scenario::from_ron_str(CLASH).unwrap();
        assert!(verify_determinism(&scenario).unwrap());
    }

    #[test]
    fn test_serve_answers_each_command() {
        let mut engine = TacticsEngine::new(roster(), TacticsConfig::default()).unwrap();
        let input = concat!(
            r#"{"cmd":"snapshot","tick":1,"entities":["#,
            r#"{"id":1,"unit_type":1,"alliance":"Friendly","position":{"x":0.0,"y":0.0},"health":100.0},"#,
            r#"{"id":2,"unit_type":2,"alliance":"Enemy","position":{"x":4.0,"y":0.0},"health":150.0}"#,
            "]}\n",
            "not json\n",
            "\n",
            r#"{"cmd":"unit_destroyed","unit":2}"#,
            "\n",
            r#"{"cmd":"end_session"}"#,
            "\n",
            r#"{"cmd":"quit"}"#,
            "\n",
        );
        let mut output: Vec<u8> = Vec::new();
        let passes = serve(&mut engine, &StraightLine, input.as_bytes(), &mut output).unwrap();
        assert_eq!(passes, 1);

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].contains(r#""type":"ready""#));
        assert!(lines[1].contains(r#""type":"intents""#));
        assert!(lines[2].contains(r#""type":"error""#));
        assert!(lines[3].contains(r#""cmd":"unit_destroyed""#));
        assert!(lines[4].contains(r#""cmd":"end_session""#));
        assert!(lines[5].contains(r#""type":"bye""#));
        assert_eq!(engine.steps(), 0);
    }
}
