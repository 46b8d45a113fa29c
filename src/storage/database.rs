use crate::core::Block;
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use sled::transaction::{abort, ConflictableTransactionResult, TransactionError, TransactionalTree};
use sled::Db;
use std::path::{Path, PathBuf};

/// Reserved key holding the hash of the most recent block. Every other key
/// in the store is a 32-byte block hash.
pub const TIP_KEY: &[u8] = b"lh";

// Written by sled on first open; its presence means a store already exists
const MANIFEST_FILE: &str = "conf";

#[derive(Debug, Clone)]
pub struct Database {
    db: Db,
    path: PathBuf,
}

impl Database {
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().join(MANIFEST_FILE).is_file()
    }

    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)?;

        log::debug!("📂 Opened block store at {}", path.display());
        Ok(Self { db, path })
    }

    pub fn get_tip(&self) -> Result<Option<Hash256>> {
        match self.db.get(TIP_KEY)? {
            Some(bytes) => Hash256::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| LedgerError::CorruptChain("Tip pointer is not a 32-byte hash".to_string())),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        match self.db.get(hash.as_bytes())? {
            Some(data) => Ok(Some(Block::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Store the genesis block and point the tip at it. Aborts without
    /// writing anything if a tip is already present.
    pub fn save_genesis(&self, block: &Block) -> Result<()> {
        self.save_block_and_tip(block, None)
    }

    /// Store `block` and advance the tip to it in one atomic unit, provided
    /// the persisted tip still equals `expected_tip`.
    pub fn append_block(&self, block: &Block, expected_tip: &Hash256) -> Result<()> {
        self.save_block_and_tip(block, Some(expected_tip))
    }

    fn save_block_and_tip(&self, block: &Block, expected_tip: Option<&Hash256>) -> Result<()> {
        let block_data = block.serialize()?;
        let hash_key: &[u8] = &block.hash.as_bytes()[..];

        self.commit(|tx| {
            let current_tip = tx.get(TIP_KEY)?;
            match (expected_tip, current_tip) {
                (None, None) => {}
                (None, Some(_)) => return abort(LedgerError::AlreadyExists(self.path.clone())),
                (Some(expected), Some(found)) if &found[..] == &expected.as_bytes()[..] => {}
                (Some(expected), Some(found)) => {
                    return abort(LedgerError::TipMismatch {
                        expected: *expected,
                        found: Hash256::from_slice(&found).unwrap_or_else(Hash256::zero),
                    })
                }
                (Some(_), None) => {
                    return abort(LedgerError::CorruptChain("Tip pointer is missing".to_string()))
                }
            }

            if tx.get(hash_key)?.is_some() {
                return abort(LedgerError::CorruptChain(format!(
                    "Block {} is already stored",
                    block.hash
                )));
            }

            tx.insert(hash_key, block_data.as_slice())?;
            tx.insert(TIP_KEY, hash_key)?;
            Ok(())
        })?;

        log::debug!("💾 Saved block {} and advanced tip", block.hash);
        Ok(())
    }

    fn commit<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&TransactionalTree) -> ConflictableTransactionResult<(), LedgerError>,
    {
        self.db.transaction(f).map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => LedgerError::Database(e),
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn remove_block(&self, hash: &Hash256) -> Result<()> {
        self.db.remove(hash.as_bytes())?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn key_count(&self) -> usize {
        self.db.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::Payload;
    use crate::mining::ProofOfWork;
    use tempfile::TempDir;

    fn mine(payload: &[u8], prev: Option<Hash256>) -> Block {
        let pow = ProofOfWork::new(8).unwrap();
        Block::create(Payload::Data(payload.to_vec()), prev, &pow).unwrap()
    }

    #[test]
    fn test_manifest_marks_existing_store() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocks");

        assert!(!Database::exists(&path));
        let db = Database::new(&path)?;
        assert!(Database::exists(&path));
        assert!(db.get_tip()?.is_none());

        Ok(())
    }

    #[test]
    fn test_genesis_and_append() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("blocks"))?;

        let genesis = mine(b"Genesis", None);
        db.save_genesis(&genesis)?;
        assert_eq!(db.get_tip()?, Some(genesis.hash));
        assert_eq!(db.get_block(&genesis.hash)?, Some(genesis.clone()));

        let next = mine(b"next", Some(genesis.hash));
        db.append_block(&next, &genesis.hash)?;
        assert_eq!(db.get_tip()?, Some(next.hash));
        assert!(db.get_block(&genesis.hash)?.is_some());
        assert!(db.get_block(&next.hash)?.is_some());

        Ok(())
    }

    #[test]
    fn test_second_genesis_is_rejected_without_writes() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("blocks"))?;

        let genesis = mine(b"Genesis", None);
        db.save_genesis(&genesis)?;
        let keys_before = db.key_count();

        let other = mine(b"Other genesis", None);
        assert!(matches!(db.save_genesis(&other), Err(LedgerError::AlreadyExists(_))));
        assert_eq!(db.key_count(), keys_before);
        assert_eq!(db.get_tip()?, Some(genesis.hash));
        assert!(db.get_block(&other.hash)?.is_none());

        Ok(())
    }

    #[test]
    fn test_append_with_stale_tip_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("blocks"))?;

        let genesis = mine(b"Genesis", None);
        db.save_genesis(&genesis)?;
        let first = mine(b"first", Some(genesis.hash));
        db.append_block(&first, &genesis.hash)?;

        let stale = mine(b"stale", Some(genesis.hash));
        let result = db.append_block(&stale, &genesis.hash);

        assert!(matches!(result, Err(LedgerError::TipMismatch { .. })));
        assert_eq!(db.get_tip()?, Some(first.hash));
        assert!(db.get_block(&stale.hash)?.is_none());

        Ok(())
    }
}
