//! Hashledger - a single-node, append-only proof-of-work ledger
//!
//! This library implements:
//! - SHA-256 proof-of-work mining against a `2^(256 - difficulty)` target
//! - A hash-linked block store on top of sled with an atomic tip pointer
//! - UTXO accounting derived by walking the chain from tip to genesis
//! - A small command line interface

pub mod core;
pub mod crypto;
pub mod mining;
pub mod storage;
pub mod cli;
pub mod error;
pub mod config;

pub use error::{LedgerError, Result};
