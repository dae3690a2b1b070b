//! Test-only helpers: session fixtures and scripted agent invokers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{TimeZone, Utc};

use crate::core::types::SessionStatus;
use crate::io::session_store::Session;
use crate::retry::{AgentInvoker, AgentRun, AttemptFailure, AttemptRequest, Sleeper};

/// Deterministic in-progress session with the given id.
pub fn session_fixture(id: &str) -> Session {
    Session {
        id: id.to_string(),
        web_url: "https://target.example.com".to_string(),
        repo_path: "/repos/target".to_string(),
        status: SessionStatus::InProgress,
        started_at: Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_default(),
        output_path: None,
    }
}

/// One scripted invocation result.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Succeed { cost_usd: f64 },
    Fail {
        message: String,
        checkpoint: Option<String>,
    },
}

impl ScriptedStep {
    pub fn succeed(cost_usd: f64) -> Self {
        ScriptedStep::Succeed { cost_usd }
    }

    pub fn fail(message: &str) -> Self {
        ScriptedStep::Fail {
            message: message.to_string(),
            checkpoint: None,
        }
    }

    pub fn with_checkpoint(self, token: &str) -> Self {
        match self {
            ScriptedStep::Fail { message, .. } => ScriptedStep::Fail {
                message,
                checkpoint: Some(token.to_string()),
            },
            other => other,
        }
    }
}

/// Owned copy of an [`AttemptRequest`] for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub agent: String,
    pub attempt_number: u32,
    pub checkpoint: Option<String>,
}

/// Invoker that replays a fixed queue of results.
pub struct ScriptedInvoker {
    steps: RefCell<VecDeque<ScriptedStep>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedInvoker {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: RefCell::new(steps.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }
}

impl AgentInvoker for ScriptedInvoker {
    fn invoke(&self, request: &AttemptRequest<'_>) -> Result<AgentRun, AttemptFailure> {
        self.requests.borrow_mut().push(RecordedRequest {
            agent: request.agent.to_string(),
            attempt_number: request.attempt_number,
            checkpoint: request.checkpoint.map(str::to_string),
        });
        match self.steps.borrow_mut().pop_front() {
            Some(ScriptedStep::Succeed { cost_usd }) => Ok(AgentRun { cost_usd }),
            Some(ScriptedStep::Fail {
                message,
                checkpoint,
            }) => Err(AttemptFailure {
                error: anyhow!(message),
                cost_usd: 0.0,
                checkpoint,
            }),
            None => Err(anyhow!("scripted invoker exhausted").into()),
        }
    }
}

/// Sleeper that records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.delays.borrow_mut().push(delay);
    }
}
