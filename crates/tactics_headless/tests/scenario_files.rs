//! Checks the sample scenarios shipped in `scenarios/`.

use std::path::PathBuf;

use tactics_core::engagement::EngagementState;
use tactics_headless::batch::{run_batch, BatchConfig};
use tactics_headless::runner::ScenarioRunner;
use tactics_headless::scenario::Scenario;

fn scenario_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

fn load(name: &str) -> Scenario {
    Scenario::load(scenario_dir().join(name)).expect("sample scenario loads")
}

#[test]
fn test_all_samples_validate() {
    let config = BatchConfig::from_dir(&scenario_dir()).expect("scenario dir readable");
    assert!(config.scenarios.len() >= 4);
    for path in &config.scenarios {
        let scenario = Scenario::load(path).expect("sample scenario loads");
        assert!(
            scenario.validate().is_ok(),
            "{} failed validation",
            path.display()
        );
    }
}

#[test]
fn test_samples_run_deterministically() {
    let config = BatchConfig::from_dir(&scenario_dir())
        .expect("scenario dir readable")
        .with_max_ticks(30)
        .with_determinism_check();
    let results = run_batch(config);
    assert!(results.errors.is_empty(), "errors: {:?}", results.errors);
    assert!(results.all_deterministic());
}

#[test]
fn test_kiting_duel_opens_kiting() {
    let scenario = load("kiting_duel.ron");
    let mut runner = ScenarioRunner::new(&scenario).expect("runner");
    runner.step();
    assert_eq!(runner.engine().unit_state(1), Some(EngagementState::Kiting));
    runner.step();
    assert_ne!(runner.engine().unit_state(1), Some(EngagementState::Retreating));
}

#[test]
fn test_outgunned_brute_retreats() {
    let scenario = load("outgunned.ron");
    let mut runner = ScenarioRunner::new(&scenario).expect("runner");
    let (batch, _) = runner.step();
    assert_eq!(runner.engine().unit_state(1), Some(EngagementState::Retreating));
    assert!(batch.for_unit(1).is_some());
}

#[test]
fn test_squad_push_assigns_anchor() {
    let scenario = load("squad_push.ron");
    let mut runner = ScenarioRunner::new(&scenario).expect("runner");
    runner.step();
    let anchor = runner.engine().state().anchors.anchor(1);
    assert!(anchor.is_some_and(|a| [1, 2, 3, 4, 5].contains(&a)));
}
