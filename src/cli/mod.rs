//! Command Line Interface for Hashledger

pub mod commands;

pub use commands::run_cli;
