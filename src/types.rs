use bitcoin::{BlockHash, Txid};
use serde::Serialize;

use crate::storage::encdec::{Decode, DecodingError, DecodingResult, Encode};

/// Network the node runs against, resolved once at engine construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Collapse aliases the way addresses are rendered: regtest shares the
    /// testnet address encoding.
    pub fn normalized(self) -> Network {
        match self {
            Network::Regtest => Network::Testnet,
            other => other,
        }
    }
}

/// Reference to a transaction output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TxoRef {
    pub txid: Txid,
    pub index: u32,
}

/// Whether an address-index row records value leaving (input) or arriving
/// (output). The discriminants are part of the key encoding; do not renumber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Direction {
    Output = 0,
    Input = 1,
}

impl Encode for Direction {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decode for Direction {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        let (tag, rest) = u8::decode(bytes)?;

        let direction = match tag {
            0 => Direction::Output,
            1 => Direction::Input,
            other => return Err(DecodingError::InvalidEnumKind(vec![other])),
        };

        Ok((direction, rest))
    }
}

/// Side(s) of a transaction the mempool bridge should match an address
/// against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionFilter {
    Input,
    Output,
    Both,
}

/// Transient (txid, direction) pair returned by the mempool bridge; never
/// indexed durably.
#[derive(Clone, Debug)]
pub struct MempoolTxRef {
    pub txid: Txid,
    pub direction: Direction,
}

/// A block ready for indexing: hash and height resolved, transactions fully
/// address-resolved.
#[derive(Clone, Debug)]
pub struct IndexedBlock {
    pub hash: BlockHash,
    pub height: u32,
    pub txs: Vec<ResolvedTransaction>,
}

/// A transaction whose scripts have already been resolved to addresses and
/// whose input amounts have been cached by the transaction service.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedTransaction {
    pub txid: Txid,
    pub inputs: Vec<ResolvedInput>,
    pub outputs: Vec<ResolvedOutput>,
    /// Satoshi value of each input's previous output, parallel to `inputs`.
    pub input_values: Vec<i64>,
    /// Height of the containing block, if confirmed.
    pub height: Option<u32>,
    /// Timestamp of the containing block, if confirmed.
    pub timestamp: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResolvedInput {
    pub prev_out: TxoRef,
    /// Address owning the spent output; `None` when resolution failed or
    /// the input is a coinbase.
    pub address: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResolvedOutput {
    /// `None` when the script does not resolve to an address; such outputs
    /// are not indexed.
    pub address: Option<String>,
    pub satoshis: i64,
    /// Raw script bytes, carried opaquely.
    pub script: Vec<u8>,
}

/// Fully detailed transaction record assembled by the transaction detail
/// service for history responses.
#[derive(Clone, Debug, Serialize)]
pub struct DetailedTransaction {
    pub txid: Txid,
    pub block_hash: Option<BlockHash>,
    pub height: Option<u32>,
    pub timestamp: Option<u32>,
    pub inputs: Vec<ResolvedInput>,
    pub outputs: Vec<ResolvedOutput>,
    pub fee_satoshis: i64,
}
