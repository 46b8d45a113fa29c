//! Persistent block storage backed by sled

pub mod database;

pub use database::{Database, TIP_KEY};
