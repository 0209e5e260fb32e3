//! Read side of the index: merges range scans over the persisted families
//! with live mempool state. All operations are read-only, snapshot the chain
//! tip once per invocation, and abort on the first failed sub-operation
//! rather than returning partial results.

pub mod types;

use std::cmp::Reverse;
use std::sync::Arc;

use bitcoin::Txid;
use bitcoin::hashes::Hash;
use futures::{StreamExt, TryStreamExt, stream};
use indexmap::IndexSet;
use itertools::Itertools;
use tracing::trace;

use crate::error::Error;
use crate::index::tables::{AddressIndexKV, UtxoIndexKV};
use crate::services::{ChainTip, MempoolSource, TransactionSource, TxDetailOptions};
use crate::storage::table::TableIterator;
use crate::storage::{ServicePrefix, Store};
use crate::types::{
    DetailedTransaction, Direction, DirectionFilter, Network, ResolvedTransaction,
};

use types::{AddressHistory, AddressSummary, AddressUtxo, HistoryOptions, SummaryOptions, UtxoOptions};

/// Cap on simultaneous in-flight collaborator lookups within one query.
const MAX_CONCURRENT_LOOKUPS: usize = 20;

/// Read-only view over the two index families plus the mempool bridge.
pub struct QueryEngine {
    store: Arc<dyn Store>,
    prefix: ServicePrefix,
    network: Network,
    tip: Arc<dyn ChainTip>,
    mempool: Arc<dyn MempoolSource>,
    transactions: Arc<dyn TransactionSource>,
}

/// One (txid, height, direction, amount) row of an address's activity,
/// before detail resolution. Mempool rows carry no height.
#[derive(Clone, Debug)]
struct TxSummaryRow {
    txid: Txid,
    height: Option<u32>,
    input: bool,
    satoshis: i64,
}

impl TxSummaryRow {
    /// Descending sort key: mempool rows sort above any confirmed height.
    fn sort_height(&self) -> u32 {
        self.height.unwrap_or(u32::MAX)
    }
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn Store>,
        prefix: ServicePrefix,
        network: Network,
        tip: Arc<dyn ChainTip>,
        mempool: Arc<dyn MempoolSource>,
        transactions: Arc<dyn TransactionSource>,
    ) -> Self {
        Self {
            store,
            prefix,
            network: network.normalized(),
            tip,
            mempool,
            transactions,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Spendable outputs owned by `address`: unconfirmed mempool outputs
    /// first, then confirmed rows in natural store order.
    pub async fn address_unspent_outputs(
        &self,
        address: &str,
        options: &UtxoOptions,
    ) -> Result<Vec<AddressUtxo>, Error> {
        let tip_height = self.tip.tip_height();

        let mut results = Vec::new();

        if options.query_mempool {
            let refs = self
                .mempool
                .txids_by_address(address, DirectionFilter::Output)
                .await?;

            let pending: Vec<ResolvedTransaction> = stream::iter(refs)
                .map(|mref| async move {
                    self.mempool
                        .mempool_transaction(&mref.txid)
                        .await?
                        .ok_or_else(|| Error::missing_data(format!("missing tx {}", mref.txid)))
                })
                .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
                .try_collect()
                .await?;

            for tx in &pending {
                results.extend(mempool_utxos(tx, address));
            }
        }

        let range = UtxoIndexKV::address_range(&self.prefix, address);
        let scan =
            TableIterator::<UtxoIndexKV>::new(self.store.range_read(range, false), &self.prefix);

        for row in scan {
            let (key, value) = row?;

            results.push(AddressUtxo {
                address: address.to_string(),
                txid: Txid::from_byte_array(key.txid),
                vout: key.output_index,
                timestamp: Some(value.timestamp),
                script_pub_key: hex::encode(&value.script),
                amount: btc_string(value.satoshis),
                satoshis: value.satoshis,
                height: Some(value.height),
                confirmations: tip_height.saturating_sub(value.height) + 1,
            });
        }

        trace!(address, utxos = results.len(), "served utxo query");

        Ok(results)
    }

    /// Transactions touching any of `addresses`, newest first, deduplicated
    /// by (txid, height) and paginated before detail resolution.
    pub async fn address_history(
        &self,
        addresses: &[String],
        options: &HistoryOptions,
    ) -> Result<AddressHistory, Error> {
        let per_address: Vec<Vec<TxSummaryRow>> = stream::iter(addresses)
            .map(|address| {
                self.address_tx_summary(
                    address,
                    options.query_mempool,
                    options.start_height,
                    options.end_height,
                )
            })
            .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
            .try_collect()
            .await?;

        let mut ids: Vec<TxSummaryRow> = per_address
            .into_iter()
            .flatten()
            .unique_by(|row| (row.txid, row.height))
            .collect();

        // stable sort: mempool rows first, then descending height
        ids.sort_by_key(|row| Reverse(row.sort_height()));

        let total_count = ids.len();

        let from = options.from.min(total_count);
        let to = options.to.clamp(from, total_count);

        // ordered resolution so pagination order survives the fan-out
        let items = stream::iter(ids[from..to].iter())
            .map(|row| self.resolve_history_item(row, &options.detail))
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .try_collect()
            .await?;

        Ok(AddressHistory { total_count, items })
    }

    /// Single-pass reduction of one address's full activity into balances
    /// and appearance counts.
    pub async fn address_summary(
        &self,
        address: &str,
        options: &SummaryOptions,
    ) -> Result<AddressSummary, Error> {
        let rows = self
            .address_tx_summary(
                address,
                options.query_mempool,
                options.start_height,
                options.end_height,
            )
            .await?;

        // snapshot once so the confirmation cutoff cannot tear if the tip
        // advances mid-reduction
        let tip_height = self.tip.tip_height();

        let mut balance_sat: i64 = 0;
        let mut total_received_sat: i64 = 0;
        let mut total_sent_sat: i64 = 0;
        let mut unconfirmed_balance_sat: i64 = 0;
        let mut unconfirmed_tx_appearances: u64 = 0;

        let mut seen: IndexSet<Txid> = IndexSet::new();

        for row in rows {
            let confirmed = row.height.is_some_and(|height| height <= tip_height);

            if row.input {
                balance_sat -= row.satoshis;
                total_sent_sat += row.satoshis;
                if !confirmed {
                    unconfirmed_balance_sat -= row.satoshis;
                }
            } else {
                balance_sat += row.satoshis;
                total_received_sat += row.satoshis;
                if !confirmed {
                    unconfirmed_balance_sat += row.satoshis;
                }
            }

            if seen.insert(row.txid) && !confirmed {
                unconfirmed_tx_appearances += 1;
            }
        }

        let tx_appearances = seen.len() as u64;
        let transactions = (!options.no_tx_list).then(|| seen.into_iter().collect());

        Ok(AddressSummary {
            addr_str: address.to_string(),
            balance: btc_string(balance_sat),
            balance_sat,
            total_received: btc_string(total_received_sat),
            total_received_sat,
            total_sent: btc_string(total_sent_sat),
            total_sent_sat,
            unconfirmed_balance: btc_string(unconfirmed_balance_sat),
            unconfirmed_balance_sat,
            unconfirmed_tx_appearances,
            tx_appearances,
            transactions,
        })
    }

    /// Mempool rows (when enabled) followed by confirmed rows streamed
    /// newest-first out of the address index.
    async fn address_tx_summary(
        &self,
        address: &str,
        query_mempool: bool,
        start_height: u32,
        end_height: u32,
    ) -> Result<Vec<TxSummaryRow>, Error> {
        let mut rows = Vec::new();

        if query_mempool {
            let refs = self
                .mempool
                .txids_by_address(address, DirectionFilter::Both)
                .await?;

            let pending: Vec<ResolvedTransaction> = stream::iter(refs)
                .map(|mref| async move {
                    self.mempool
                        .mempool_transaction(&mref.txid)
                        .await?
                        .ok_or_else(|| Error::missing_data(format!("missing tx {}", mref.txid)))
                })
                .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
                .try_collect()
                .await?;

            for tx in &pending {
                mempool_rows(tx, address, &mut rows)?;
            }
        }

        let range = AddressIndexKV::height_range(&self.prefix, address, start_height, end_height);
        let scan =
            TableIterator::<AddressIndexKV>::new(self.store.range_read(range, true), &self.prefix);

        for row in scan {
            let (key, satoshis) = row?;

            rows.push(TxSummaryRow {
                txid: Txid::from_byte_array(key.txid),
                height: Some(key.height),
                input: key.direction == Direction::Input,
                satoshis,
            });
        }

        Ok(rows)
    }

    async fn resolve_history_item(
        &self,
        row: &TxSummaryRow,
        options: &TxDetailOptions,
    ) -> Result<DetailedTransaction, Error> {
        match row.height {
            None => {
                let tx = self
                    .mempool
                    .mempool_transaction(&row.txid)
                    .await?
                    .ok_or_else(|| {
                        Error::missing_data(format!("could not find mempool tx {}", row.txid))
                    })?;

                self.transactions.tx_meta_info(tx, options).await
            }
            Some(_) => self
                .transactions
                .detailed_transaction(&row.txid, options)
                .await?
                .ok_or_else(|| Error::missing_data(format!("could not find tx {}", row.txid))),
        }
    }
}

/// Unconfirmed spendable outputs `tx` pays to `address`.
fn mempool_utxos(tx: &ResolvedTransaction, address: &str) -> Vec<AddressUtxo> {
    tx.outputs
        .iter()
        .enumerate()
        .filter(|(_, output)| output.address.as_deref() == Some(address))
        .map(|(vout, output)| AddressUtxo {
            address: address.to_string(),
            txid: tx.txid,
            vout: vout as u32,
            timestamp: None,
            script_pub_key: hex::encode(&output.script),
            amount: btc_string(output.satoshis),
            satoshis: output.satoshis,
            height: None,
            confirmations: 0,
        })
        .collect()
}

/// Height-less summary rows for a mempool transaction's touches of
/// `address`.
fn mempool_rows(
    tx: &ResolvedTransaction,
    address: &str,
    rows: &mut Vec<TxSummaryRow>,
) -> Result<(), Error> {
    for (index, input) in tx.inputs.iter().enumerate() {
        if input.address.as_deref() != Some(address) {
            continue;
        }

        let satoshis = tx.input_values.get(index).copied().ok_or_else(|| {
            Error::missing_data(format!(
                "missing cached value for input {index} of mempool tx {}",
                tx.txid
            ))
        })?;

        rows.push(TxSummaryRow {
            txid: tx.txid,
            height: None,
            input: true,
            satoshis,
        });
    }

    for output in &tx.outputs {
        if output.address.as_deref() != Some(address) {
            continue;
        }

        rows.push(TxSummaryRow {
            txid: tx.txid,
            height: None,
            input: false,
            satoshis: output.satoshis,
        });
    }

    Ok(())
}

/// Render a satoshi amount in whole-coin display units.
fn btc_string(satoshis: i64) -> String {
    let magnitude = decimal(satoshis.unsigned_abs() as u128, 8);

    if satoshis < 0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

fn decimal(num: u128, dec: u8) -> String {
    let dec = dec as usize;

    let mut bal_string = num.to_string();
    let bal_string_len = bal_string.len();

    if dec > 0 {
        if bal_string_len == dec {
            let mut new_string = String::from("0.");
            new_string.push_str(&bal_string);

            bal_string = new_string;
        } else if bal_string_len < dec {
            let mut new_string = String::from("0.");

            for _ in 0..(dec - bal_string_len) {
                new_string.push('0')
            }

            new_string.push_str(&bal_string);

            bal_string = new_string;
        } else {
            bal_string.insert(bal_string_len - dec, '.');
        }
    }

    bal_string
}
