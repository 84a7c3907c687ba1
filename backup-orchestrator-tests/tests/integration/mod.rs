//! Integration tests against real external tools
//!
//! The tool round trips skip themselves when a binary is missing. gpg and
//! MySQL tests need extra setup and are ignored by default.
//! Run with: `cargo test -p backup-orchestrator-tests --test integration -- --ignored`

#[macro_use]
mod common;
mod gpg;
mod mysql;
mod tools;
