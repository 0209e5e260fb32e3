//! Collaborator boundaries. The engines take these as explicit typed
//! dependencies at construction; there is no runtime service lookup.

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};

use crate::error::Error;
use crate::types::{DetailedTransaction, DirectionFilter, MempoolTxRef, ResolvedTransaction};

/// Options forwarded to the transaction detail service when resolving
/// history items.
#[derive(Clone, Copy, Debug, Default)]
pub struct TxDetailOptions {
    pub no_asm: bool,
    pub no_script_sig: bool,
    pub no_spent: bool,
}

/// Best-height oracle, used to compute confirmation counts.
pub trait ChainTip: Send + Sync {
    fn tip_height(&self) -> u32;
}

/// Block timestamp lookup by hash. Absence during indexing is a fatal
/// invariant violation, not a runtime condition.
pub trait TimestampOracle: Send + Sync {
    fn block_timestamp(&self, hash: &BlockHash) -> Option<u32>;
}

/// Read-only view of the mempool, queried without locking; a transaction
/// entering or leaving mid-query may be observed inconsistently and that is
/// tolerated.
#[async_trait]
pub trait MempoolSource: Send + Sync {
    /// Pending transactions touching `address` on the requested side(s).
    async fn txids_by_address(
        &self,
        address: &str,
        filter: DirectionFilter,
    ) -> Result<Vec<MempoolTxRef>, Error>;

    /// Full pending transaction body, with cached input values.
    async fn mempool_transaction(&self, txid: &Txid)
    -> Result<Option<ResolvedTransaction>, Error>;
}

/// Confirmed transaction storage and detail assembly.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Confirmed transaction with cached height, timestamp and input values.
    async fn get_transaction(&self, txid: &Txid) -> Result<Option<ResolvedTransaction>, Error>;

    /// Fully detailed confirmed transaction for history responses.
    async fn detailed_transaction(
        &self,
        txid: &Txid,
        options: &TxDetailOptions,
    ) -> Result<Option<DetailedTransaction>, Error>;

    /// Enrich a mempool transaction with the metadata a detailed record
    /// carries.
    async fn tx_meta_info(
        &self,
        tx: ResolvedTransaction,
        options: &TxDetailOptions,
    ) -> Result<DetailedTransaction, Error>;
}
