//! Typed error taxonomy surfaced to orchestrators.
//!
//! Most functions return `anyhow::Result`; the errors below are the ones callers
//! are expected to branch on, either directly or via `anyhow::Error::downcast_ref`.

use std::error::Error as StdError;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::classifier::{ErrorCategory, classify};
use crate::io::gate::GateError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A precondition was violated (e.g. a duplicate in-progress run). Never retried.
    #[error("validation error: {message}")]
    Validation {
        message: String,
        /// Id of the in-progress session that blocked the request, if any.
        conflicting_session: Option<String>,
    },
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// A persisted document could not be written.
    #[error("corrupted state at {}: {message}", path.display())]
    Corruption { path: PathBuf, message: String },
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Failure of an external tool or agent invocation, classified for retry.
#[derive(Debug, Error)]
#[error("{source_tool} failed: {message}")]
pub struct ToolError {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub source_tool: String,
    pub message: String,
    #[source]
    pub cause: Option<BoxError>,
}

/// Serializable view of a [`ToolError`] handed to retry loops and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolErrorRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub category: ErrorCategory,
    pub retryable: bool,
    pub source_tool: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ToolError {
    /// Wrap a failure raised by `tool`, classifying it by its full message chain.
    pub fn wrap<E>(tool: &str, error: E) -> Self
    where
        E: Into<BoxError>,
    {
        let cause: BoxError = error.into();
        let message = chain_message(cause.as_ref());
        let classification = classify(&message);
        Self {
            category: classification.category,
            retryable: classification.retryable,
            source_tool: tool.to_string(),
            message,
            cause: Some(cause),
        }
    }

    pub fn record(&self) -> ToolErrorRecord {
        ToolErrorRecord {
            kind: "tool",
            category: self.category,
            retryable: self.retryable,
            source_tool: self.source_tool.clone(),
            message: self.message.clone(),
            cause: self.cause.as_ref().map(|cause| cause.to_string()),
        }
    }
}

/// Join an error and its sources with `": "`, the way `{:#}` renders anyhow chains.
fn chain_message(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn wrap_classifies_rate_limit_as_retryable() {
        let err = ToolError::wrap("nmap", "HTTP 429 Too Many Requests");
        assert!(err.retryable);
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert_eq!(err.source_tool, "nmap");
        assert_eq!(err.to_string(), "nmap failed: HTTP 429 Too Many Requests");
    }

    #[test]
    fn wrap_reads_the_whole_anyhow_chain() {
        let inner: anyhow::Result<()> = Err(anyhow!("connection reset by peer"));
        let err = inner.context("fetch target").expect_err("error");
        let wrapped = ToolError::wrap("subfinder", err);
        assert_eq!(wrapped.message, "fetch target: connection reset by peer");
        assert!(wrapped.retryable);
    }

    #[test]
    fn record_serializes_with_tool_type() {
        let err = ToolError::wrap("whatweb", "authentication failed");
        let value = serde_json::to_value(err.record()).expect("serialize");
        assert_eq!(value["type"], "tool");
        assert_eq!(value["retryable"], false);
        assert_eq!(value["source_tool"], "whatweb");
        assert_eq!(value["category"], "authentication");
    }

    #[test]
    fn validation_error_downcasts_from_anyhow() {
        let err = anyhow::Error::new(PipelineError::Validation {
            message: "duplicate".to_string(),
            conflicting_session: Some("abc".to_string()),
        });
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Validation {
                conflicting_session,
                ..
            }) => assert_eq!(conflicting_session.as_deref(), Some("abc")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
