use bitcoin::Txid;
use serde::Serialize;

use crate::services::TxDetailOptions;
use crate::types::DetailedTransaction;

/// Options for [`QueryEngine::address_unspent_outputs`].
///
/// [`QueryEngine::address_unspent_outputs`]: crate::query::QueryEngine::address_unspent_outputs
#[derive(Clone, Copy, Debug)]
pub struct UtxoOptions {
    pub query_mempool: bool,
}

impl Default for UtxoOptions {
    fn default() -> Self {
        Self {
            query_mempool: true,
        }
    }
}

/// Options for [`QueryEngine::address_history`]: `[from, to)` paginates the
/// merged, height-sorted id list; the height bounds limit the confirmed
/// scan.
///
/// [`QueryEngine::address_history`]: crate::query::QueryEngine::address_history
#[derive(Clone, Debug)]
pub struct HistoryOptions {
    pub from: usize,
    pub to: usize,
    pub start_height: u32,
    pub end_height: u32,
    pub query_mempool: bool,
    pub detail: TxDetailOptions,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            from: 0,
            to: 0xffff_ffff,
            start_height: 0,
            end_height: u32::MAX,
            query_mempool: true,
            detail: TxDetailOptions::default(),
        }
    }
}

/// Options for [`QueryEngine::address_summary`].
///
/// [`QueryEngine::address_summary`]: crate::query::QueryEngine::address_summary
#[derive(Clone, Debug)]
pub struct SummaryOptions {
    pub start_height: u32,
    pub end_height: u32,
    pub query_mempool: bool,
    /// Skip assembling the txid list; the counts are still computed.
    pub no_tx_list: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            start_height: 0,
            end_height: u32::MAX,
            query_mempool: true,
            no_tx_list: false,
        }
    }
}

/// One spendable output owned by an address. Mempool entries carry no
/// height and zero confirmations.
#[derive(Clone, Debug, Serialize)]
pub struct AddressUtxo {
    pub address: String,
    pub txid: Txid,
    pub vout: u32,
    pub timestamp: Option<u32>,
    /// Hex-encoded script bytes.
    pub script_pub_key: String,
    /// Amount in display units.
    pub amount: String,
    pub satoshis: i64,
    pub height: Option<u32>,
    pub confirmations: u32,
}

#[derive(Debug, Serialize)]
pub struct AddressHistory {
    /// Matching transaction count before pagination.
    pub total_count: usize,
    pub items: Vec<DetailedTransaction>,
}

#[derive(Debug, Serialize)]
pub struct AddressSummary {
    pub addr_str: String,
    pub balance: String,
    pub balance_sat: i64,
    pub total_received: String,
    pub total_received_sat: i64,
    pub total_sent: String,
    pub total_sent_sat: i64,
    pub unconfirmed_balance: String,
    pub unconfirmed_balance_sat: i64,
    pub unconfirmed_tx_appearances: u64,
    /// Transactions touching the address, deduplicated by txid: a tx
    /// spending from and paying to the same address counts once.
    pub tx_appearances: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Txid>>,
}
