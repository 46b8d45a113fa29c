use crate::config::MiningConfig;
use crate::core::Block;
use crate::crypto::hash::Hash256;
use crate::mining::difficulty::DifficultyTarget;
use crate::{LedgerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Nonce bound matching a signed 64-bit counter.
pub const DEFAULT_MAX_NONCE: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningResult {
    pub nonce: u64,
    pub hash: Hash256,
}

/// Nonce search and re-verification for block headers.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    target: DifficultyTarget,
    max_nonce: u64,
    cancel: Arc<AtomicBool>,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<Self> {
        Ok(Self {
            target: DifficultyTarget::from_difficulty(difficulty)?,
            max_nonce: DEFAULT_MAX_NONCE,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_config(config: &MiningConfig) -> Result<Self> {
        Ok(Self::new(config.difficulty)?.with_max_nonce(config.max_nonce))
    }

    pub fn with_max_nonce(mut self, max_nonce: u64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    /// Share an externally owned flag; setting it stops any search in progress.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn difficulty(&self) -> u32 {
        self.target.difficulty
    }

    pub fn target(&self) -> &DifficultyTarget {
        &self.target
    }

    pub fn mine(&self, prev_hash: Option<&Hash256>, payload_digest: &Hash256) -> Result<MiningResult> {
        let difficulty = self.difficulty();
        log::debug!(
            "⛏️  Searching nonce at difficulty {} (~{:.0} attempts expected)",
            difficulty,
            self.target.expected_attempts()
        );

        let start_time = Instant::now();
        let mut data = header_bytes(prev_hash, payload_digest, 0, difficulty);
        let prefix_len = data.len() - 16;
        let mut nonce = 0u64;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                log::warn!("🛑 Mining cancelled at nonce {}", nonce);
                return Err(LedgerError::MiningCancelled(nonce));
            }

            data.truncate(prefix_len);
            data.extend_from_slice(&nonce.to_be_bytes());
            data.extend_from_slice(&(difficulty as u64).to_be_bytes());
            let hash = Hash256::sha256(&data);

            if self.target.is_met_by(&hash) {
                let elapsed = start_time.elapsed().as_secs_f64();
                let hashrate = if elapsed > 0.0 { (nonce + 1) as f64 / elapsed } else { 0.0 };
                log::info!(
                    "✅ Block mined! Nonce: {}, Time: {:.2}s, Hashrate: {:.2} H/s",
                    nonce,
                    elapsed,
                    hashrate
                );
                return Ok(MiningResult { nonce, hash });
            }

            if nonce >= self.max_nonce {
                return Err(LedgerError::MiningExhausted {
                    attempts: nonce.saturating_add(1),
                    difficulty,
                });
            }
            nonce += 1;
        }
    }

    /// Recompute the header digest from the block's stored nonce and
    /// difficulty. Valid iff it equals the stored hash and meets the target.
    pub fn validate(block: &Block) -> bool {
        let target = match DifficultyTarget::from_difficulty(block.difficulty) {
            Ok(target) => target,
            Err(_) => return false,
        };

        let data = header_bytes(
            block.prev_hash.as_ref(),
            &block.payload.digest(),
            block.nonce,
            block.difficulty,
        );
        let hash = Hash256::sha256(&data);

        hash == block.hash && target.is_met_by(&hash)
    }
}

/// Header layout: prev_hash || payload digest || nonce (BE u64) || difficulty (BE u64).
/// The genesis block contributes no prev_hash bytes.
pub fn header_bytes(
    prev_hash: Option<&Hash256>,
    payload_digest: &Hash256,
    nonce: u64,
    difficulty: u32,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(32 + 32 + 8 + 8);
    if let Some(prev) = prev_hash {
        data.extend_from_slice(prev.as_bytes());
    }
    data.extend_from_slice(payload_digest.as_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    data.extend_from_slice(&(difficulty as u64).to_be_bytes());
    data
}
