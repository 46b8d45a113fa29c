use crate::core::Chain;
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    /// Unlocking proof. Ownership is address matching, so this holds the
    /// spender's address (or arbitrary data for a coinbase).
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    pub fn new_coinbase(to: &str, reward: u64, data: &str) -> Self {
        let data = if data.is_empty() {
            format!("Coins to {}", to)
        } else {
            data.to_string()
        };

        let coinbase_input = TxInput {
            previous_output: OutPoint::null(),
            signature: data,
        };

        let output = TxOutput {
            value: reward,
            address: to.to_string(),
        };

        Self::new(vec![coinbase_input], vec![output])
    }

    /// Build a transfer from the unspent outputs `from` owns on `chain`.
    /// Any surplus over `amount` is returned to `from` as change.
    pub fn new_transfer(from: &str, to: &str, amount: u64, chain: &Chain) -> Result<Self> {
        if amount == 0 {
            return Err(LedgerError::InvalidInput("Amount must be greater than zero".to_string()));
        }

        let (accumulated, selection) = chain.utxo().find_spendable_outputs(from, amount)?;
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = Vec::new();
        for (txid, outs) in selection {
            for vout in outs {
                inputs.push(TxInput {
                    previous_output: OutPoint::new(txid, vout),
                    signature: from.to_string(),
                });
            }
        }

        let mut outputs = vec![TxOutput {
            value: amount,
            address: to.to_string(),
        }];

        let change = accumulated - amount;
        if change > 0 {
            outputs.push(TxOutput {
                value: change,
                address: from.to_string(),
            });
        }

        Ok(Self::new(inputs, outputs))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    // Covers inputs and outputs only; the id field itself is excluded
    fn compute_id(&self) -> Hash256 {
        let mut data = Vec::new();

        data.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            data.extend_from_slice(input.previous_output.txid.as_bytes());
            data.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            data.extend_from_slice(&(input.signature.len() as u32).to_le_bytes());
            data.extend_from_slice(input.signature.as_bytes());
        }

        data.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.value.to_le_bytes());
            data.extend_from_slice(&(output.address.len() as u32).to_le_bytes());
            data.extend_from_slice(output.address.as_bytes());
        }

        Hash256::sha256(&data)
    }
}

impl TxInput {
    pub fn can_unlock(&self, address: &str) -> bool {
        self.signature == address
    }
}

impl TxOutput {
    pub fn is_locked_with(&self, address: &str) -> bool {
        self.address == address
    }
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    pub fn null() -> Self {
        Self {
            txid: Hash256::zero(),
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == Hash256::zero() && self.vout == u32::MAX
    }
}
