//! Proof-of-work mining for Hashledger

pub mod pow;
pub mod difficulty;

pub use pow::{ProofOfWork, MiningResult};
pub use difficulty::DifficultyTarget;
