//! abac-bench CLI - Command-line runner for the ABAC benchmark harness.
//!
//! This crate provides the `abac-bench` binary, which writes starter
//! configurations and drives the load and workload phases against the
//! in-memory store.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
