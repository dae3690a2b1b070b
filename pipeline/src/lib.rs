//! Run-state and phase-gating core for a multi-phase assessment pipeline.
//!
//! An external orchestrator drives a fixed, linear sequence of phases against a
//! single target. This crate owns the state that every phase depends on:
//!
//! - **[`core`]**: Pure, deterministic logic (error classification, backoff,
//!   metrics aggregation, phase artifact naming). No I/O.
//! - **[`io`]**: File-backed stores (session registry, run metrics, error log,
//!   config) and the phase gate that inspects a phase's output directory.
//!
//! Orchestration modules ([`session`], [`retry`]) combine the two into the
//! operations the `pipeline` CLI and external orchestrators call.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod retry;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
