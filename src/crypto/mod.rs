//! Cryptographic primitives for Hashledger

pub mod hash;

pub use hash::Hash256;
