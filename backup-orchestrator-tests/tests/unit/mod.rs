//! Unit tests for backup-orchestrator
//!
//! Configuration handling, source expansion and the shared pipeline, all
//! against the fake toolchain.

mod config;
mod sources;
