//! Headless runner for the tactical decision engine.
//!
//! Two ways to drive [`tactics_core::engine::TacticsEngine`] without a game
//! client:
//!
//! - **Serve**: a game adapter writes world snapshots as JSON lines on stdin
//!   and reads intent batches back from stdout
//! - **Sandbox**: scenario files set up a battle that a small deterministic
//!   world plays out, feeding every decision back into the next snapshot
//!
//! Logs go to stderr so stdout stays machine-readable.
//!
//! See the [`protocol`] module for the message format.
//!
//! # Example
//!
//! ```bash
//! # Run a scenario
//! cargo run -p tactics_headless -- run --scenario scenarios/kiting_duel.ron
//!
//! # Verify determinism
//! cargo run -p tactics_headless -- verify --scenario scenarios/squad_push.ron
//! ```

pub mod batch;
pub mod protocol;
pub mod runner;
pub mod sandbox;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use protocol::{Command, Response};
pub use runner::{serve, verify_determinism, RunSummary, ScenarioRunner};
pub use sandbox::Sandbox;
pub use scenario::{Scenario, ScenarioError};
