//! Core library for the `loadpulse` CLI.
//!
//! The engine drives a load profile against any [`engine::TargetClient`]:
//! a request source feeds an executor pool, outcomes flow through a bounded
//! channel into the aggregator, and the run controller owns the lifecycle.
//! The remaining modules provide the CLI argument types, configuration
//! loading, the HTTP target, and the URL-list scenario used by the binary.
pub mod args;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod scenario;
