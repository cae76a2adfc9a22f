// SPDX-License-Identifier: MIT

//! Progress events emitted while a run executes

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        at: DateTime<Utc>,
    },
    NodeStarted {
        run_id: Uuid,
        step: usize,
        node: String,
        at: DateTime<Utc>,
    },
    NodeCompleted {
        run_id: Uuid,
        step: usize,
        node: String,
        /// Channels written by this node, in update order
        channels: Vec<String>,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    /// Transition chosen after a node (or START)
    Routed {
        run_id: Uuid,
        from: String,
        /// Decision key when the edge is conditional
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        to: String,
        at: DateTime<Utc>,
    },
    RunCompleted {
        run_id: Uuid,
        steps: usize,
        state: Value,
        at: DateTime<Utc>,
    },
    RunFailed {
        run_id: Uuid,
        steps: usize,
        error: String,
        state: Value,
        at: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::NodeStarted { run_id, .. }
            | RunEvent::NodeCompleted { run_id, .. }
            | RunEvent::Routed { run_id, .. }
            | RunEvent::RunCompleted { run_id, .. }
            | RunEvent::RunFailed { run_id, .. } => *run_id,
        }
    }

    /// Whether this is the last event of a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::RunCompleted { .. } | RunEvent::RunFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let run_id = Uuid::new_v4();
        let event = RunEvent::Routed {
            run_id,
            from: "weather_agent".to_string(),
            key: Some("end".to_string()),
            to: "__end__".to_string(),
            at: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "routed");
        assert_eq!(value["key"], "end");
        assert_eq!(value["run_id"], json!(run_id.to_string()));
        assert_eq!(event.run_id(), run_id);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_plain_route_omits_key() {
        let event = RunEvent::Routed {
            run_id: Uuid::new_v4(),
            from: "a".to_string(),
            key: None,
            to: "b".to_string(),
            at: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("key").is_none());
    }
}
