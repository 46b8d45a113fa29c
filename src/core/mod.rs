//! Core ledger components

pub mod blockchain;
pub mod block;
pub mod transaction;
pub mod utxo;

pub use blockchain::{Chain, ChainIterator, ChainReport};
pub use block::{Block, Payload};
pub use transaction::{Transaction, TxInput, TxOutput, OutPoint};
pub use utxo::{UtxoResolver, UtxoEntry};
