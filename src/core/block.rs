use crate::core::Transaction;
use crate::crypto::hash::Hash256;
use crate::mining::ProofOfWork;
use crate::{LedgerError, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};

/// Leading byte of every persisted block. Bump when the layout changes.
pub const BLOCK_FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Transactions(Vec<Transaction>),
    Data(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: Hash256,
    pub payload: Payload,
    pub prev_hash: Option<Hash256>,
    pub nonce: u64,
    pub difficulty: u32,
}

impl Payload {
    pub fn digest(&self) -> Hash256 {
        match self {
            Payload::Data(data) => Hash256::sha256(data),
            Payload::Transactions(transactions) => {
                let mut ids = Vec::with_capacity(transactions.len() * 32);
                for tx in transactions {
                    ids.extend_from_slice(tx.id.as_bytes());
                }
                Hash256::sha256(&ids)
            }
        }
    }
}

impl Block {
    /// Mine a new block on top of `prev_hash`.
    pub fn create(payload: Payload, prev_hash: Option<Hash256>, pow: &ProofOfWork) -> Result<Self> {
        let result = pow.mine(prev_hash.as_ref(), &payload.digest())?;

        Ok(Self {
            hash: result.hash,
            payload,
            prev_hash,
            nonce: result.nonce,
            difficulty: pow.difficulty(),
        })
    }

    pub fn genesis(payload: Payload, pow: &ProofOfWork) -> Result<Self> {
        Self::create(payload, None, pow)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    pub fn transactions(&self) -> &[Transaction] {
        match &self.payload {
            Payload::Transactions(transactions) => transactions,
            Payload::Data(_) => &[],
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = codec().serialize(self)?;

        let mut data = Vec::with_capacity(body.len() + 1);
        data.push(BLOCK_FORMAT_VERSION);
        data.extend_from_slice(&body);
        Ok(data)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        match data.split_first() {
            Some((&BLOCK_FORMAT_VERSION, body)) => Ok(codec().deserialize(body)?),
            Some((version, _)) => Err(LedgerError::Encoding(format!(
                "Unsupported block format version {}",
                version
            ))),
            None => Err(LedgerError::Encoding("Empty block record".to_string())),
        }
    }
}

// Fixed-width little-endian integers with u64 length prefixes
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;

    fn test_pow() -> ProofOfWork {
        ProofOfWork::new(8).unwrap()
    }

    #[test]
    fn test_block_creation() {
        let transactions = vec![Transaction::new_coinbase("alice", 100, "Test coinbase")];

        let block = Block::genesis(Payload::Transactions(transactions), &test_pow()).unwrap();

        assert!(block.is_genesis());
        assert_eq!(block.difficulty, 8);
        assert_eq!(block.transactions().len(), 1);
        assert!(ProofOfWork::validate(&block));
    }

    #[test]
    fn test_created_blocks_validate() {
        let pow = test_pow();
        let genesis = Block::genesis(Payload::Data(b"Genesis".to_vec()), &pow).unwrap();
        let next = Block::create(Payload::Data(b"second".to_vec()), Some(genesis.hash), &pow).unwrap();

        assert!(ProofOfWork::validate(&genesis));
        assert!(ProofOfWork::validate(&next));
        assert_eq!(next.prev_hash, Some(genesis.hash));
        assert!(next.transactions().is_empty());
    }

    #[test]
    fn test_serialize_round_trip() {
        let pow = test_pow();
        let coinbase = Transaction::new_coinbase("alice", 100, "");
        let genesis = Block::genesis(Payload::Transactions(vec![coinbase]), &pow).unwrap();
        let data_block = Block::create(Payload::Data(vec![0, 1, 2, 255]), Some(genesis.hash), &pow).unwrap();

        for block in [genesis, data_block] {
            let encoded = block.serialize().unwrap();
            assert_eq!(encoded[0], BLOCK_FORMAT_VERSION);
            assert_eq!(Block::deserialize(&encoded).unwrap(), block);
        }
    }

    #[test]
    fn test_deserialize_rejects_bad_records() {
        let block = Block::genesis(Payload::Data(b"Genesis".to_vec()), &test_pow()).unwrap();
        let encoded = block.serialize().unwrap();

        assert!(matches!(Block::deserialize(&[]), Err(LedgerError::Encoding(_))));

        let mut wrong_version = encoded.clone();
        wrong_version[0] = BLOCK_FORMAT_VERSION + 1;
        assert!(matches!(Block::deserialize(&wrong_version), Err(LedgerError::Encoding(_))));

        let truncated = &encoded[..encoded.len() - 3];
        assert!(matches!(Block::deserialize(truncated), Err(LedgerError::Encoding(_))));

        let mut trailing = encoded;
        trailing.push(0);
        assert!(matches!(Block::deserialize(&trailing), Err(LedgerError::Encoding(_))));
    }

    #[test]
    fn test_payload_digest_depends_on_transaction_ids() {
        let a = Transaction::new_coinbase("alice", 100, "");
        let b = Transaction::new_coinbase("bob", 100, "");

        let ab = Payload::Transactions(vec![a.clone(), b.clone()]).digest();
        let ba = Payload::Transactions(vec![b, a]).digest();

        assert_ne!(ab, ba);
        assert_ne!(Payload::Data(b"x".to_vec()).digest(), Payload::Data(b"y".to_vec()).digest());
    }
}
