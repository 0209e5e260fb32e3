//! Computes the ordered mutation batches that keep the address and utxo
//! index families consistent across block connects and reorg disconnects.
//! The engine performs no writes itself; callers apply each returned batch
//! atomically before advancing the chain tip.

pub mod tables;

use std::sync::Arc;

use bitcoin::hashes::Hash;
use indexmap::IndexMap;
use tracing::trace;

use crate::error::Error;
use crate::services::{TimestampOracle, TransactionSource};
use crate::storage::encdec::Encode;
use crate::storage::table::IndexTable;
use crate::storage::{Mutation, RawKey, ServicePrefix};
use crate::types::{
    Direction, IndexedBlock, Network, ResolvedInput, ResolvedOutput, ResolvedTransaction,
};

use tables::{AddressIndexKV, AddressIndexKey, UtxoIndexKV, UtxoIndexKey, UtxoIndexValue};

/// Sole writer of both index families. Blocks are processed strictly
/// sequentially along the chain; no two blocks are ever in flight at once.
pub struct IndexingEngine {
    prefix: ServicePrefix,
    network: Network,
    timestamps: Arc<dyn TimestampOracle>,
    transactions: Arc<dyn TransactionSource>,
}

impl IndexingEngine {
    pub fn new(
        prefix: ServicePrefix,
        network: Network,
        timestamps: Arc<dyn TimestampOracle>,
        transactions: Arc<dyn TransactionSource>,
    ) -> Self {
        Self {
            prefix,
            network: network.normalized(),
            timestamps,
            transactions,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Mutations indexing one newly connected block: per resolvable output,
    /// an address-index put and a utxo-index put; per resolvable input, an
    /// address-index put (spend row) and a utxo-index delete of the consumed
    /// outpoint.
    pub fn on_block_connected(&self, block: &IndexedBlock) -> Result<Vec<Mutation>, Error> {
        let timestamp = self.timestamps.block_timestamp(&block.hash).ok_or_else(|| {
            Error::invariant(format!("missing timestamp for block {}", block.hash))
        })?;

        let mut ops = Vec::new();

        for tx in &block.txs {
            self.connect_transaction(tx, block.height, timestamp, &mut ops)?;
        }

        trace!(
            height = block.height,
            ops = ops.len(),
            "computed connect mutations"
        );

        Ok(ops)
    }

    /// Inverse mutations for a reorg. `blocks` is the disconnected chain
    /// segment oldest-first, as it was connected; it is undone newest-first
    /// (and transactions within a block in reverse) so that resurrections of
    /// chained spends are cancelled by the deletions of the outputs they
    /// reference. The flattened batch is compacted to one mutation per key.
    pub async fn on_blocks_disconnected(
        &self,
        blocks: &[IndexedBlock],
    ) -> Result<Vec<Mutation>, Error> {
        let mut ops = Vec::new();

        for block in blocks.iter().rev() {
            let timestamp = self.timestamps.block_timestamp(&block.hash).ok_or_else(|| {
                Error::invariant(format!("missing timestamp for block {}", block.hash))
            })?;

            for tx in block.txs.iter().rev() {
                self.disconnect_transaction(tx, block.height, timestamp, &mut ops)
                    .await?;
            }
        }

        let ops = compact(ops);

        trace!(
            blocks = blocks.len(),
            ops = ops.len(),
            "computed reorg undo mutations"
        );

        Ok(ops)
    }

    fn connect_transaction(
        &self,
        tx: &ResolvedTransaction,
        height: u32,
        timestamp: u32,
        ops: &mut Vec<Mutation>,
    ) -> Result<(), Error> {
        let before = ops.len();

        for (index, output) in tx.outputs.iter().enumerate() {
            self.connect_output(tx, index as u32, output, height, timestamp, ops);
        }

        check_cardinality(ops.len() - before, tx.outputs.len(), "output")?;

        let before = ops.len();

        for (index, input) in tx.inputs.iter().enumerate() {
            self.connect_input(tx, index, input, height, timestamp, ops)?;
        }

        check_cardinality(ops.len() - before, tx.inputs.len(), "input")?;

        Ok(())
    }

    fn connect_output(
        &self,
        tx: &ResolvedTransaction,
        index: u32,
        output: &ResolvedOutput,
        height: u32,
        timestamp: u32,
        ops: &mut Vec<Mutation>,
    ) {
        // outputs with no resolvable address are not indexed
        let Some(address) = &output.address else {
            return;
        };

        let history_key = AddressIndexKey {
            address: address.clone(),
            height,
            txid: tx.txid.to_byte_array(),
            output_index: index,
            direction: Direction::Output,
            timestamp,
        };

        ops.push(Mutation::Put {
            key: AddressIndexKV::encode_key(&self.prefix, &history_key),
            value: output.satoshis.encode(),
        });

        let utxo_key = UtxoIndexKey {
            address: address.clone(),
            txid: tx.txid.to_byte_array(),
            output_index: index,
        };
        let utxo_value = UtxoIndexValue {
            height,
            satoshis: output.satoshis,
            timestamp,
            script: output.script.clone(),
        };

        ops.push(Mutation::Put {
            key: UtxoIndexKV::encode_key(&self.prefix, &utxo_key),
            value: utxo_value.encode(),
        });
    }

    fn connect_input(
        &self,
        tx: &ResolvedTransaction,
        index: usize,
        input: &ResolvedInput,
        height: u32,
        timestamp: u32,
        ops: &mut Vec<Mutation>,
    ) -> Result<(), Error> {
        let Some(address) = &input.address else {
            return Ok(());
        };

        let satoshis = tx.input_values.get(index).copied().ok_or_else(|| {
            Error::invariant(format!(
                "missing cached value for input {index} of tx {}",
                tx.txid
            ))
        })?;

        let history_key = AddressIndexKey {
            address: address.clone(),
            height,
            txid: tx.txid.to_byte_array(),
            output_index: index as u32,
            direction: Direction::Input,
            timestamp,
        };

        ops.push(Mutation::Put {
            key: AddressIndexKV::encode_key(&self.prefix, &history_key),
            value: satoshis.encode(),
        });

        // the consumed outpoint leaves the utxo set
        let spent_key = UtxoIndexKey {
            address: address.clone(),
            txid: input.prev_out.txid.to_byte_array(),
            output_index: input.prev_out.index,
        };

        ops.push(Mutation::Delete {
            key: UtxoIndexKV::encode_key(&self.prefix, &spent_key),
        });

        Ok(())
    }

    async fn disconnect_transaction(
        &self,
        tx: &ResolvedTransaction,
        height: u32,
        timestamp: u32,
        ops: &mut Vec<Mutation>,
    ) -> Result<(), Error> {
        for (index, input) in tx.inputs.iter().enumerate() {
            let Some(address) = &input.address else {
                continue;
            };

            let history_key = AddressIndexKey {
                address: address.clone(),
                height,
                txid: tx.txid.to_byte_array(),
                output_index: index as u32,
                direction: Direction::Input,
                timestamp,
            };

            ops.push(Mutation::Delete {
                key: AddressIndexKV::encode_key(&self.prefix, &history_key),
            });

            self.resurrect_spent_output(input, address, ops).await?;
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            let Some(address) = &output.address else {
                continue;
            };

            let history_key = AddressIndexKey {
                address: address.clone(),
                height,
                txid: tx.txid.to_byte_array(),
                output_index: index as u32,
                direction: Direction::Output,
                timestamp,
            };

            ops.push(Mutation::Delete {
                key: AddressIndexKV::encode_key(&self.prefix, &history_key),
            });

            // the output vanishes along with the block
            let utxo_key = UtxoIndexKey {
                address: address.clone(),
                txid: tx.txid.to_byte_array(),
                output_index: index as u32,
            };

            ops.push(Mutation::Delete {
                key: UtxoIndexKV::encode_key(&self.prefix, &utxo_key),
            });
        }

        Ok(())
    }

    /// Put the previous output consumed by `input` back into the utxo set.
    /// The owning transaction must still be retrievable from confirmed
    /// storage with its cached height and timestamp; anything less would
    /// desynchronize the families, so it aborts the batch.
    async fn resurrect_spent_output(
        &self,
        input: &ResolvedInput,
        address: &str,
        ops: &mut Vec<Mutation>,
    ) -> Result<(), Error> {
        let prev_txid = input.prev_out.txid;

        let prev_tx = self
            .transactions
            .get_transaction(&prev_txid)
            .await?
            .ok_or_else(|| {
                Error::invariant(format!("missing previous tx {prev_txid} while undoing spend"))
            })?;

        let prev_height = prev_tx
            .height
            .ok_or_else(|| Error::invariant(format!("previous tx {prev_txid} has no height")))?;
        let prev_timestamp = prev_tx.timestamp.ok_or_else(|| {
            Error::invariant(format!("previous tx {prev_txid} has no timestamp"))
        })?;

        let prev_output = prev_tx
            .outputs
            .get(input.prev_out.index as usize)
            .ok_or_else(|| {
                Error::invariant(format!(
                    "previous tx {prev_txid} has no output {}",
                    input.prev_out.index
                ))
            })?;

        let utxo_key = UtxoIndexKey {
            address: address.to_string(),
            txid: prev_txid.to_byte_array(),
            output_index: input.prev_out.index,
        };
        let utxo_value = UtxoIndexValue {
            height: prev_height,
            satoshis: prev_output.satoshis,
            timestamp: prev_timestamp,
            script: prev_output.script.clone(),
        };

        ops.push(Mutation::Put {
            key: UtxoIndexKV::encode_key(&self.prefix, &utxo_key),
            value: utxo_value.encode(),
        });

        Ok(())
    }
}

/// Indexing one input or output emits either nothing (no address) or exactly
/// one pair of mutations; anything else means the families would diverge.
fn check_cardinality(emitted: usize, items: usize, kind: &str) -> Result<(), Error> {
    if emitted % 2 != 0 || emitted > items * 2 {
        return Err(Error::invariant(format!(
            "{kind} operation count {emitted} not reflective of {items} {kind}s"
        )));
    }

    Ok(())
}

/// Collapse the batch to at most one mutation per key, keeping
/// batch-application semantics: the last mutation for a key wins, and
/// survivors keep their relative order.
fn compact(ops: Vec<Mutation>) -> Vec<Mutation> {
    let mut by_key: IndexMap<RawKey, Mutation> = IndexMap::with_capacity(ops.len());

    for op in ops {
        by_key.shift_remove(op.key());
        by_key.insert(op.key().to_vec(), op);
    }

    by_key.into_values().collect()
}
