//! CLI module for sandloop - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the agent and
//! inspecting conversations and checkpoints.

pub mod commands;

pub use commands::Cli;
