use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};

pub const MIN_DIFFICULTY: u32 = 1;
pub const MAX_DIFFICULTY: u32 = 255;

/// The numeric threshold `2^(256 - difficulty)` as a 32-byte big-endian integer.
///
/// A hash satisfies the puzzle when, read as an unsigned big-endian integer,
/// it is strictly below the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyTarget {
    pub difficulty: u32,
    pub target_hash: [u8; 32],
}

impl DifficultyTarget {
    pub fn from_difficulty(difficulty: u32) -> Result<Self> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            return Err(LedgerError::InvalidDifficulty(difficulty));
        }

        // Position of the single set bit, counted from the least significant end
        let bit = (256 - difficulty) as usize;
        let mut target_hash = [0u8; 32];
        target_hash[31 - bit / 8] = 1 << (bit % 8);

        Ok(Self {
            difficulty,
            target_hash,
        })
    }

    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        // Byte arrays compare lexicographically, which is big-endian numeric order
        hash.as_bytes() < &self.target_hash
    }

    /// Average number of hashes needed to find a satisfying nonce.
    pub fn expected_attempts(&self) -> f64 {
        2f64.powi(self.difficulty as i32)
    }
}
