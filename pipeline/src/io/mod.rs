//! I/O helpers for pipeline state.

pub mod atomic;
pub mod config;
pub mod error_log;
pub mod gate;
pub mod init;
pub mod metrics_store;
pub mod paths;
pub mod session_store;
