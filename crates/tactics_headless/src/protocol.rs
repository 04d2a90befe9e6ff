//! JSON lines protocol for the decision service.
//!
//! The `serve` command reads one JSON object per line from stdin and writes
//! one JSON object per line to stdout:
//!
//! **Input (stdin):** snapshots and lifecycle events from the game adapter
//! **Output (stdout):** intent batches and acknowledgements
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","unit_types":8}
//! -> {"cmd":"snapshot","tick":1,"entities":[...]}
//! <- {"type":"intents","tick":1,"intents":[...],"states":[...]}
//! -> {"cmd":"unit_destroyed","unit":1001}
//! <- {"type":"ack","cmd":"unit_destroyed"}
//! -> {"cmd":"end_session"}
//! <- {"type":"ack","cmd":"end_session"}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use serde::{Deserialize, Serialize};

use tactics_core::components::{Alliance, EntityId};
use tactics_core::engagement::EngagementState;
use tactics_core::intents::UnitIntent;
use tactics_core::snapshot::WorldSnapshot;

/// Protocol version reported in the ready line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (adapter -> service)
// ============================================================================

/// Messages the game adapter sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Run one decision pass.
    Snapshot(WorldSnapshot),

    /// An entity was destroyed.
    UnitDestroyed { unit: EntityId },

    /// The match ended; drop all session state.
    EndSession,

    /// Stop serving.
    Quit,
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name for acknowledgements.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::UnitDestroyed { .. } => "unit_destroyed",
            Self::EndSession => "end_session",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Output Responses (service -> adapter)
// ============================================================================

/// Engagement state of one friendly unit after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStateOutput {
    pub unit: EntityId,
    pub state: EngagementState,
}

/// Messages written to stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Service is ready.
    Ready { version: String, unit_types: usize },

    /// Result of one decision pass.
    Intents {
        tick: u64,
        intents: Vec<UnitIntent>,
        states: Vec<UnitStateOutput>,
    },

    /// Command handled without output.
    Ack { cmd: String },

    /// Malformed or rejected input.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Sandbox run finished.
    Finished {
        ticks: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<Alliance>,
        intent_hash: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(unit_types: usize) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            unit_types,
        }
    }

    /// Create an acknowledgement.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to a JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot_command() {
        let json = r#"{"cmd":"snapshot","tick":3,"entities":[
            {"id":1,"unit_type":1,"alliance":"Friendly","position":{"x":1.5,"y":0.0},"health":40.0}
        ]}"#;
        let cmd = Command::from_json(json).unwrap();
        let Command::Snapshot(snapshot) = cmd else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.tick, 3);
        assert_eq!(snapshot.entities.len(), 1);
        assert!(snapshot.entities[0].alive);
    }

    #[test]
    fn test_parse_unit_destroyed() {
        let cmd = Command::from_json(r#"{"cmd":"unit_destroyed","unit":42}"#).unwrap();
        assert!(matches!(cmd, Command::UnitDestroyed { unit: 42 }));
        assert_eq!(cmd.name(), "unit_destroyed");
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_serialize_intents_response() {
        let resp = Response::Intents {
            tick: 7,
            intents: vec![UnitIntent::attack(1, 2)],
            states: vec![UnitStateOutput {
                unit: 1,
                state: EngagementState::Attacking,
            }],
        };
        let json = resp.to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"intents""#));
        assert!(json.contains(r#""kind":"attack""#));
        assert!(json.contains(r#""state":"attacking""#));
    }

    #[test]
    fn test_error_omits_missing_cmd() {
        let json = Response::error("bad line", None).to_json_line();
        assert!(!json.contains("cmd"));
    }
}
