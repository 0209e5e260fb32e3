//! Hand-rolled collaborator fakes and fixture builders shared by the engine
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};

use crate::error::Error;
use crate::services::{
    ChainTip, MempoolSource, TimestampOracle, TransactionSource, TxDetailOptions,
};
use crate::storage::ServicePrefix;
use crate::types::{
    DetailedTransaction, DirectionFilter, MempoolTxRef, ResolvedInput, ResolvedOutput,
    ResolvedTransaction, TxoRef,
};

pub const PREFIX: ServicePrefix = [0x00, 0x07];

pub fn txid(fill: u8) -> Txid {
    Txid::from_byte_array([fill; 32])
}

pub fn block_hash(fill: u8) -> BlockHash {
    BlockHash::from_byte_array([fill; 32])
}

pub fn pay_to(address: &str, satoshis: i64) -> ResolvedOutput {
    ResolvedOutput {
        address: Some(address.to_string()),
        satoshis,
        script: vec![0x76, 0xa9, 0x14, 0x00],
    }
}

pub fn spend(prev_txid: Txid, index: u32, address: &str) -> ResolvedInput {
    ResolvedInput {
        prev_out: TxoRef {
            txid: prev_txid,
            index,
        },
        address: Some(address.to_string()),
    }
}

pub fn coinbase_input() -> ResolvedInput {
    ResolvedInput {
        prev_out: TxoRef {
            txid: Txid::from_byte_array([0; 32]),
            index: u32::MAX,
        },
        address: None,
    }
}

pub struct StaticTip(pub u32);

impl ChainTip for StaticTip {
    fn tip_height(&self) -> u32 {
        self.0
    }
}

#[derive(Default)]
pub struct StaticTimestamps(pub HashMap<BlockHash, u32>);

impl TimestampOracle for StaticTimestamps {
    fn block_timestamp(&self, hash: &BlockHash) -> Option<u32> {
        self.0.get(hash).copied()
    }
}

#[derive(Default)]
pub struct FakeMempool {
    pub refs: HashMap<String, Vec<MempoolTxRef>>,
    pub txs: HashMap<Txid, ResolvedTransaction>,
}

#[async_trait]
impl MempoolSource for FakeMempool {
    async fn txids_by_address(
        &self,
        address: &str,
        _filter: DirectionFilter,
    ) -> Result<Vec<MempoolTxRef>, Error> {
        Ok(self.refs.get(address).cloned().unwrap_or_default())
    }

    async fn mempool_transaction(
        &self,
        txid: &Txid,
    ) -> Result<Option<ResolvedTransaction>, Error> {
        Ok(self.txs.get(txid).cloned())
    }
}

#[derive(Default)]
pub struct FakeTransactions {
    pub txs: HashMap<Txid, ResolvedTransaction>,
}

impl FakeTransactions {
    pub fn insert(&mut self, tx: ResolvedTransaction) {
        self.txs.insert(tx.txid, tx);
    }
}

#[async_trait]
impl TransactionSource for FakeTransactions {
    async fn get_transaction(&self, txid: &Txid) -> Result<Option<ResolvedTransaction>, Error> {
        Ok(self.txs.get(txid).cloned())
    }

    async fn detailed_transaction(
        &self,
        txid: &Txid,
        _options: &TxDetailOptions,
    ) -> Result<Option<DetailedTransaction>, Error> {
        Ok(self.txs.get(txid).map(detail_from))
    }

    async fn tx_meta_info(
        &self,
        tx: ResolvedTransaction,
        _options: &TxDetailOptions,
    ) -> Result<DetailedTransaction, Error> {
        Ok(detail_from(&tx))
    }
}

pub fn detail_from(tx: &ResolvedTransaction) -> DetailedTransaction {
    let input_total: i64 = tx.input_values.iter().sum();
    let output_total: i64 = tx.outputs.iter().map(|o| o.satoshis).sum();

    DetailedTransaction {
        txid: tx.txid,
        block_hash: None,
        height: tx.height,
        timestamp: tx.timestamp,
        inputs: tx.inputs.clone(),
        outputs: tx.outputs.clone(),
        fee_satoshis: (input_total - output_total).max(0),
    }
}
