use crate::core::{Chain, Transaction, TxOutput};
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntry {
    pub txid: Hash256,
    pub vout: u32,
    pub value: u64,
    pub address: String,
}

/// Answers balance and coin-selection queries by re-walking the chain from
/// tip to genesis on every call. There is no persisted UTXO index.
#[derive(Debug, Clone, Copy)]
pub struct UtxoResolver<'a> {
    chain: &'a Chain,
}

struct UnspentScan {
    transactions: Vec<Transaction>,
    entries: Vec<UtxoEntry>,
}

impl<'a> UtxoResolver<'a> {
    pub fn new(chain: &'a Chain) -> Self {
        Self { chain }
    }

    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self.scan(address)?.transactions)
    }

    pub fn find_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
        let entries = self.scan(address)?.entries;
        Ok(entries
            .into_iter()
            .map(|entry| TxOutput {
                value: entry.value,
                address: entry.address,
            })
            .collect())
    }

    pub fn find_utxo_entries(&self, address: &str) -> Result<Vec<UtxoEntry>> {
        Ok(self.scan(address)?.entries)
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        self.scan(address)?
            .entries
            .iter()
            .try_fold(0u64, |total, entry| total.checked_add(entry.value))
            .ok_or_else(|| LedgerError::ValueOverflow(address.to_string()))
    }

    /// Greedy first-fit selection in traversal order. Returns the amount
    /// gathered and the chosen output indices per transaction; when the
    /// address cannot cover `amount` the accumulation is simply short and the
    /// caller decides what to do.
    pub fn find_spendable_outputs(&self, address: &str, amount: u64) -> Result<(u64, BTreeMap<Hash256, Vec<u32>>)> {
        let mut accumulated = 0u64;
        let mut selection: BTreeMap<Hash256, Vec<u32>> = BTreeMap::new();

        for entry in self.scan(address)?.entries {
            if accumulated >= amount {
                break;
            }
            accumulated = accumulated
                .checked_add(entry.value)
                .ok_or_else(|| LedgerError::ValueOverflow(address.to_string()))?;
            selection.entry(entry.txid).or_default().push(entry.vout);
        }

        Ok((accumulated, selection))
    }

    fn scan(&self, address: &str) -> Result<UnspentScan> {
        let mut spent: HashMap<Hash256, HashSet<u32>> = HashMap::new();
        let mut scan = UnspentScan {
            transactions: Vec::new(),
            entries: Vec::new(),
        };

        // Newest blocks first: a spending input is always seen before the
        // output it consumes.
        for block in self.chain.iter() {
            let block = block?;

            for tx in block.transactions() {
                let spent_outputs = spent.get(&tx.id);
                let mut has_unspent = false;

                for (vout, output) in tx.outputs.iter().enumerate() {
                    let vout = vout as u32;
                    if spent_outputs.map_or(false, |outs| outs.contains(&vout)) {
                        continue;
                    }
                    if output.is_locked_with(address) {
                        has_unspent = true;
                        scan.entries.push(UtxoEntry {
                            txid: tx.id,
                            vout,
                            value: output.value,
                            address: output.address.clone(),
                        });
                    }
                }

                if has_unspent {
                    scan.transactions.push(tx.clone());
                }

                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        if input.can_unlock(address) {
                            spent
                                .entry(input.previous_output.txid)
                                .or_default()
                                .insert(input.previous_output.vout);
                        }
                    }
                }
            }
        }

        Ok(scan)
    }
}
