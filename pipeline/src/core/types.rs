//! Shared status types for sessions and agents.
//!
//! Serialized forms are part of the persisted document contract and must stay
//! stable (`in-progress`, `completed`, `failed`, `success`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a session (one assessment run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in-progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single agent across its attempts.
///
/// `Success` requires at least one successful attempt; `Failed` is only set
/// after the final permitted attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStatus {
    InProgress,
    Success,
    Failed,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::InProgress => "in-progress",
            AgentStatus::Success => "success",
            AgentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_kebab_case() {
        let encoded = serde_json::to_string(&SessionStatus::InProgress).expect("serialize");
        assert_eq!(encoded, "\"in-progress\"");
        let decoded: AgentStatus = serde_json::from_str("\"success\"").expect("parse");
        assert_eq!(decoded, AgentStatus::Success);
    }

    #[test]
    fn only_in_progress_is_not_terminal() {
        assert!(!SessionStatus::InProgress.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
    }
}
