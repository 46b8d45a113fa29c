use crate::core::block::{Block, Payload};
use crate::core::utxo::UtxoResolver;
use crate::core::Transaction;
use crate::crypto::hash::Hash256;
use crate::mining::ProofOfWork;
use crate::storage::Database;
use crate::{LedgerError, Result};
use std::path::Path;

/// Handle to an open chain: the store plus the in-memory tip.
#[derive(Debug)]
pub struct Chain {
    tip: Hash256,
    db: Database,
    pow: ProofOfWork,
}

/// Lazy tip-to-genesis walk over stored blocks.
#[derive(Debug)]
pub struct ChainIterator<'a> {
    db: &'a Database,
    current: Option<Hash256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBlock {
    pub hash: Hash256,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    pub blocks_checked: u64,
    pub invalid_blocks: Vec<InvalidBlock>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.invalid_blocks.is_empty()
    }
}

impl Chain {
    pub fn initialize<P: AsRef<Path>>(path: P, pow: ProofOfWork, genesis_payload: Payload) -> Result<Self> {
        let path = path.as_ref();

        // A manifest without a tip is a store whose genesis commit never landed
        let existing = if Database::exists(path) {
            let db = Database::new(path)?;
            if db.get_tip()?.is_some() {
                return Err(LedgerError::AlreadyExists(path.to_path_buf()));
            }
            log::warn!("♻️  Reusing block store at {} that has no genesis block", path.display());
            Some(db)
        } else {
            None
        };

        // Mine before touching the disk so a failed search leaves no store behind
        let genesis = Block::genesis(genesis_payload, &pow)?;

        let db = match existing {
            Some(db) => db,
            None => Database::new(path)?,
        };
        db.save_genesis(&genesis)?;
        db.flush()?;

        log::info!("🌱 Genesis block {} created", genesis.hash);
        Ok(Self {
            tip: genesis.hash,
            db,
            pow,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P, pow: ProofOfWork) -> Result<Self> {
        let path = path.as_ref();
        if !Database::exists(path) {
            return Err(LedgerError::NotFound(path.to_path_buf()));
        }

        let db = Database::new(path)?;
        let tip = db
            .get_tip()?
            .ok_or_else(|| LedgerError::NotFound(path.to_path_buf()))?;

        log::debug!("⛓️  Opened chain at {} with tip {}", path.display(), tip);
        Ok(Self { tip, db, pow })
    }

    /// Mine `payload` on top of the current tip, then persist the block and
    /// the new tip pointer as one atomic update.
    pub fn append(&mut self, payload: Payload) -> Result<Block> {
        let persisted = self
            .db
            .get_tip()?
            .ok_or_else(|| LedgerError::CorruptChain("Tip pointer is missing".to_string()))?;
        if persisted != self.tip {
            return Err(LedgerError::TipMismatch {
                expected: self.tip,
                found: persisted,
            });
        }

        let block = Block::create(payload, Some(self.tip), &self.pow)?;
        self.db.append_block(&block, &self.tip)?;
        self.db.flush()?;
        self.tip = block.hash;

        log::info!("✅ Block {} added to blockchain", block.hash);
        Ok(block)
    }

    pub fn add_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        self.append(Payload::Transactions(transactions))
    }

    pub fn iter(&self) -> ChainIterator<'_> {
        ChainIterator {
            db: &self.db,
            current: Some(self.tip),
        }
    }

    pub fn utxo(&self) -> UtxoResolver<'_> {
        UtxoResolver::new(self)
    }

    pub fn tip(&self) -> Hash256 {
        self.tip
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        self.db.get_block(hash)
    }

    /// Number of blocks after genesis.
    pub fn height(&self) -> Result<u64> {
        let mut count = 0u64;
        for block in self.iter() {
            block?;
            count += 1;
        }
        Ok(count.saturating_sub(1))
    }

    /// Walk the whole chain re-checking proof of work and hash linkage.
    pub fn verify(&self) -> Result<ChainReport> {
        let mut report = ChainReport::default();
        let mut expected = Some(self.tip);

        for block in self.iter() {
            let block = block?;
            report.blocks_checked += 1;

            if expected != Some(block.hash) {
                report.invalid_blocks.push(InvalidBlock {
                    hash: block.hash,
                    reason: "Does not match the previous block's link".to_string(),
                });
            }
            if !ProofOfWork::validate(&block) {
                report.invalid_blocks.push(InvalidBlock {
                    hash: block.hash,
                    reason: format!("Invalid proof of work at difficulty {}", block.difficulty),
                });
            }
            expected = block.prev_hash;
        }

        Ok(report)
    }

    pub fn close(self) -> Result<()> {
        self.db.flush()
    }
}

impl<'a> Iterator for ChainIterator<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current.take()?;

        match self.db.get_block(&hash) {
            Ok(Some(block)) if block.hash == hash => {
                self.current = block.prev_hash;
                Some(Ok(block))
            }
            Ok(Some(block)) => Some(Err(LedgerError::CorruptChain(format!(
                "Block stored under {} carries hash {}",
                hash, block.hash
            )))),
            Ok(None) => Some(Err(LedgerError::CorruptChain(format!(
                "Block {} is missing from the store",
                hash
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_pow() -> ProofOfWork {
        ProofOfWork::new(8).unwrap()
    }

    fn genesis_payload() -> Payload {
        Payload::Data(b"Genesis".to_vec())
    }

    #[test]
    fn test_initialize_then_reopen_restores_tip() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocks");

        let mut chain = Chain::initialize(&path, test_pow(), genesis_payload())?;
        let block = chain.append(Payload::Data(b"first".to_vec()))?;
        assert_eq!(chain.tip(), block.hash);
        chain.close()?;

        let chain = Chain::open(&path, test_pow())?;
        assert_eq!(chain.tip(), block.hash);
        assert_eq!(chain.height()?, 1);

        Ok(())
    }

    #[test]
    fn test_initialize_twice_fails_without_mutation() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocks");

        let chain = Chain::initialize(&path, test_pow(), genesis_payload())?;
        let tip = chain.tip();
        chain.close()?;

        let result = Chain::initialize(&path, test_pow(), Payload::Data(b"again".to_vec()));
        assert!(matches!(result, Err(LedgerError::AlreadyExists(_))));

        let chain = Chain::open(&path, test_pow())?;
        assert_eq!(chain.tip(), tip);
        assert_eq!(chain.iter().count(), 1);

        Ok(())
    }

    #[test]
    fn test_open_missing_chain() {
        let temp_dir = TempDir::new().unwrap();
        let result = Chain::open(temp_dir.path().join("nothing"), test_pow());
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_traversal_visits_every_block_back_to_genesis() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let mut chain = Chain::initialize(temp_dir.path().join("blocks"), test_pow(), genesis_payload())?;

        let mut appended = Vec::new();
        for i in 0..3u8 {
            appended.push(chain.append(Payload::Data(vec![i]))?.hash);
        }

        let blocks: Vec<Block> = chain.iter().collect::<Result<_>>()?;
        assert_eq!(blocks.len(), appended.len() + 1);
        assert!(blocks.last().unwrap().is_genesis());
        assert!(blocks[..blocks.len() - 1].iter().all(|b| !b.is_genesis()));

        let visited: Vec<Hash256> = blocks[..3].iter().map(|b| b.hash).collect();
        appended.reverse();
        assert_eq!(visited, appended);

        for pair in blocks.windows(2) {
            assert_eq!(pair[0].prev_hash, Some(pair[1].hash));
        }

        Ok(())
    }

    #[test]
    fn test_missing_block_is_corrupt_chain() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let mut chain = Chain::initialize(temp_dir.path().join("blocks"), test_pow(), genesis_payload())?;
        let first = chain.append(Payload::Data(b"first".to_vec()))?;
        chain.append(Payload::Data(b"second".to_vec()))?;

        chain.db.remove_block(&first.hash)?;

        let results: Vec<Result<Block>> = chain.iter().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LedgerError::CorruptChain(_))));

        Ok(())
    }

    #[test]
    fn test_genesis_with_transactions() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let coinbase = Transaction::new_coinbase("alice", 100, "");
        let chain = Chain::initialize(
            temp_dir.path().join("blocks"),
            test_pow(),
            Payload::Transactions(vec![coinbase.clone()]),
        )?;

        let genesis = chain.get_block(&chain.tip())?.unwrap();
        assert_eq!(genesis.transactions(), &[coinbase]);
        assert_eq!(chain.height()?, 0);

        Ok(())
    }

    #[test]
    fn test_verify_accepts_mined_chain() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let mut chain = Chain::initialize(temp_dir.path().join("blocks"), test_pow(), genesis_payload())?;
        chain.append(Payload::Data(b"first".to_vec()))?;

        let report = chain.verify()?;
        assert!(report.is_valid());
        assert_eq!(report.blocks_checked, 2);

        Ok(())
    }

    #[test]
    fn test_cancelled_append_leaves_chain_untouched() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let pow = test_pow().with_cancel_flag(cancel.clone());
        let mut chain = Chain::initialize(temp_dir.path().join("blocks"), pow, genesis_payload())?;
        let tip = chain.tip();

        cancel.store(true, Ordering::Relaxed);
        let result = chain.append(Payload::Data(b"never".to_vec()));

        assert!(matches!(result, Err(LedgerError::MiningCancelled(_))));
        assert_eq!(chain.tip(), tip);
        assert_eq!(chain.iter().count(), 1);

        Ok(())
    }

    #[test]
    fn test_failed_genesis_leaves_no_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocks");
        let pow = test_pow().with_cancel_flag(Arc::new(AtomicBool::new(true)));

        let result = Chain::initialize(&path, pow, genesis_payload());

        assert!(matches!(result, Err(LedgerError::MiningCancelled(_))));
        assert!(!Database::exists(&path));
    }

    #[test]
    fn test_initialize_recovers_store_without_genesis() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocks");

        // Store created but the genesis commit never happened
        Database::new(&path)?.flush()?;
        assert!(Database::exists(&path));
        assert!(matches!(Chain::open(&path, test_pow()), Err(LedgerError::NotFound(_))));

        let chain = Chain::initialize(&path, test_pow(), genesis_payload())?;
        let tip = chain.tip();
        chain.close()?;

        let chain = Chain::open(&path, test_pow())?;
        assert_eq!(chain.tip(), tip);
        assert_eq!(chain.iter().count(), 1);

        Ok(())
    }
}
