//! Ironflow daemon library.
//!
//! Exposes the daemon internals for integration testing; in production
//! `ironflow-daemon` runs as a binary (main.rs).

pub mod health;
pub mod metrics_server;
pub mod orchestrator;
