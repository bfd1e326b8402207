//! Library surface of the `ecg-omop` binary.
//!
//! The binary is a thin shell over [`commands`]; keeping the commands here
//! lets integration tests drive the full pipeline without spawning a process.

pub mod commands;
pub mod config;
pub mod logging;
pub mod summary;
pub mod types;
