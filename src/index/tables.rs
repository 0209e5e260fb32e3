//! Key and value layouts of the two persisted index families.
//!
//! Both use fixed-width big-endian field encodings so that raw
//! byte-lexicographic order equals tuple order, letting the query engine
//! express "all rows for address X between heights A and B" as one
//! contiguous byte range with no post-scan sort.

use std::ops::Range;

use crate::define_index_table;
use crate::storage::ServicePrefix;
use crate::storage::encdec::{Decode, DecodingResult, Encode, EncodeBuilder, prefix_key_range};
use crate::storage::table::{IndexTable, KeyFamily};
use crate::types::Direction;

define_index_table! {
    name: AddressIndexKV,
    key_type: AddressIndexKey,
    value_type: i64, // satoshis moved by this row
    family: KeyFamily::AddressIndex
}

define_index_table! {
    name: UtxoIndexKV,
    key_type: UtxoIndexKey,
    value_type: UtxoIndexValue,
    family: KeyFamily::UtxoIndex
}

/// One historical touch of an address: sorts by (address, height, txid,
/// output index, direction). The timestamp rides in the key tail so history
/// rows need no value lookup to carry it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressIndexKey {
    pub address: String,
    pub height: u32,
    pub txid: [u8; 32],
    pub output_index: u32,
    pub direction: Direction,
    pub timestamp: u32,
}

impl Encode for AddressIndexKey {
    fn encode(&self) -> Vec<u8> {
        EncodeBuilder::new()
            .append(&self.address)
            .append(&self.height)
            .append(&self.txid)
            .append(&self.output_index)
            .append(&self.direction)
            .append(&self.timestamp)
            .build()
    }
}

impl Decode for AddressIndexKey {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        let (address, bytes) = String::decode(bytes)?;
        let (height, bytes) = u32::decode(bytes)?;
        let (txid, bytes) = <[u8; 32]>::decode(bytes)?;
        let (output_index, bytes) = u32::decode(bytes)?;
        let (direction, bytes) = Direction::decode(bytes)?;
        let (timestamp, bytes) = u32::decode(bytes)?;

        Ok((
            Self {
                address,
                height,
                txid,
                output_index,
                direction,
                timestamp,
            },
            bytes,
        ))
    }
}

impl AddressIndexKV {
    /// Bounds covering every row for `address` with height in
    /// `[start, end]`, both inclusive.
    pub fn height_range(
        prefix: &ServicePrefix,
        address: &str,
        start: u32,
        end: u32,
    ) -> Range<Vec<u8>> {
        match end.checked_add(1) {
            Some(upper) => {
                Self::encode_range(prefix, Some(&(address, start)), Some(&(address, upper)))
            }
            // height saturated: close the range at the end of the address's
            // keyspace instead
            None => {
                let start = Self::encode_range(prefix, Some(&(address, start)), None::<&()>).start;
                let address_prefix =
                    Self::encode_range(prefix, Some(&address), None::<&()>).start;

                start..prefix_key_range(&address_prefix).end
            }
        }
    }
}

/// A currently unspent output owned by an address. Height is carried in the
/// value, not the key: the utxo set has no height ordering requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoIndexKey {
    pub address: String,
    pub txid: [u8; 32],
    pub output_index: u32,
}

impl Encode for UtxoIndexKey {
    fn encode(&self) -> Vec<u8> {
        EncodeBuilder::new()
            .append(&self.address)
            .append(&self.txid)
            .append(&self.output_index)
            .build()
    }
}

impl Decode for UtxoIndexKey {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        let (address, bytes) = String::decode(bytes)?;
        let (txid, bytes) = <[u8; 32]>::decode(bytes)?;
        let (output_index, bytes) = u32::decode(bytes)?;

        Ok((
            Self {
                address,
                txid,
                output_index,
            },
            bytes,
        ))
    }
}

impl UtxoIndexKV {
    /// Bounds covering every unspent output owned by `address`.
    pub fn address_range(prefix: &ServicePrefix, address: &str) -> Range<Vec<u8>> {
        let start = Self::encode_range(prefix, Some(&address), None::<&()>).start;

        prefix_key_range(&start)
    }
}

/// Fixed header (height, satoshis, timestamp) followed by the raw script
/// bytes, carried opaquely to the end of the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoIndexValue {
    pub height: u32,
    pub satoshis: i64,
    pub timestamp: u32,
    pub script: Vec<u8>,
}

impl Encode for UtxoIndexValue {
    fn encode(&self) -> Vec<u8> {
        let mut out = EncodeBuilder::new()
            .append(&self.height)
            .append(&self.satoshis)
            .append(&self.timestamp)
            .build();

        out.extend_from_slice(&self.script);
        out
    }
}

impl Decode for UtxoIndexValue {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        let (height, bytes) = u32::decode(bytes)?;
        let (satoshis, bytes) = i64::decode(bytes)?;
        let (timestamp, bytes) = u32::decode(bytes)?;

        // trailing bytes are the script, all of them
        let script = bytes.to_vec();

        Ok((
            Self {
                height,
                satoshis,
                timestamp,
                script,
            },
            &bytes[bytes.len()..],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: ServicePrefix = [0x00, 0x07];

    fn addr_key(address: &str, height: u32, txid_byte: u8, index: u32) -> AddressIndexKey {
        AddressIndexKey {
            address: address.to_string(),
            height,
            txid: [txid_byte; 32],
            output_index: index,
            direction: Direction::Output,
            timestamp: 1_600_000_000,
        }
    }

    #[test]
    fn address_index_key_round_trip() {
        let key = AddressIndexKey {
            address: "mxyz123".to_string(),
            height: 1042,
            txid: [0xAB; 32],
            output_index: 3,
            direction: Direction::Input,
            timestamp: 1_600_000_123,
        };

        assert_eq!(AddressIndexKey::decode_all(&key.encode()).unwrap(), key);
    }

    #[test]
    fn utxo_key_and_value_round_trip() {
        let key = UtxoIndexKey {
            address: "addrA".to_string(),
            txid: [0x11; 32],
            output_index: 1,
        };
        assert_eq!(UtxoIndexKey::decode_all(&key.encode()).unwrap(), key);

        let value = UtxoIndexValue {
            height: 100,
            satoshis: 5_000_000,
            timestamp: 1_600_000_000,
            script: vec![0x76, 0xa9, 0x14],
        };
        assert_eq!(UtxoIndexValue::decode_all(&value.encode()).unwrap(), value);

        let empty_script = UtxoIndexValue {
            script: Vec::new(),
            ..value
        };
        assert_eq!(
            UtxoIndexValue::decode_all(&empty_script.encode()).unwrap(),
            empty_script
        );
    }

    #[test]
    fn byte_order_matches_tuple_order() {
        let keys = vec![
            addr_key("addrA", 5, 0x00, 0),
            addr_key("addrA", 5, 0x01, 0),
            addr_key("addrA", 5, 0x01, 2),
            addr_key("addrA", 100, 0x00, 0),
            addr_key("addrA", 257, 0x00, 0),
            addr_key("addrB", 1, 0x00, 0),
        ];

        let mut encoded: Vec<Vec<u8>> = keys
            .iter()
            .map(|k| AddressIndexKV::encode_key(&PREFIX, k))
            .collect();
        let in_tuple_order = encoded.clone();

        encoded.sort();
        assert_eq!(encoded, in_tuple_order);
    }

    #[test]
    fn direction_orders_rows_within_one_outpoint() {
        let output = AddressIndexKey {
            direction: Direction::Output,
            ..addr_key("addrA", 9, 0x42, 1)
        };
        let input = AddressIndexKey {
            direction: Direction::Input,
            ..addr_key("addrA", 9, 0x42, 1)
        };

        assert!(output.encode() < input.encode());
    }

    #[test]
    fn height_range_covers_only_requested_heights() {
        let range = AddressIndexKV::height_range(&PREFIX, "addrA", 10, 20);

        let below = AddressIndexKV::encode_key(&PREFIX, &addr_key("addrA", 9, 0, 0));
        let low = AddressIndexKV::encode_key(&PREFIX, &addr_key("addrA", 10, 0, 0));
        let high = AddressIndexKV::encode_key(&PREFIX, &addr_key("addrA", 20, 0xff, 9));
        let above = AddressIndexKV::encode_key(&PREFIX, &addr_key("addrA", 21, 0, 0));
        let other = AddressIndexKV::encode_key(&PREFIX, &addr_key("addrB", 15, 0, 0));

        assert!(!range.contains(&below));
        assert!(range.contains(&low));
        assert!(range.contains(&high));
        assert!(!range.contains(&above));
        assert!(!range.contains(&other));

        // saturated upper bound still stops at the address boundary
        let full = AddressIndexKV::height_range(&PREFIX, "addrA", 0, u32::MAX);
        assert!(full.contains(&AddressIndexKV::encode_key(
            &PREFIX,
            &addr_key("addrA", u32::MAX, 0xff, 0)
        )));
        assert!(!full.contains(&other));
    }

    #[test]
    fn utxo_address_range_isolates_addresses() {
        let range = UtxoIndexKV::address_range(&PREFIX, "addrA");

        let ours = UtxoIndexKV::encode_key(
            &PREFIX,
            &UtxoIndexKey {
                address: "addrA".to_string(),
                txid: [0xff; 32],
                output_index: u32::MAX,
            },
        );
        let theirs = UtxoIndexKV::encode_key(
            &PREFIX,
            &UtxoIndexKey {
                address: "addrB".to_string(),
                txid: [0x00; 32],
                output_index: 0,
            },
        );

        assert!(range.contains(&ours));
        assert!(!range.contains(&theirs));
    }

    #[test]
    fn families_do_not_collide() {
        let addr = AddressIndexKV::encode_key(&PREFIX, &addr_key("addrA", 0, 0, 0));
        let utxo = UtxoIndexKV::encode_key(
            &PREFIX,
            &UtxoIndexKey {
                address: "addrA".to_string(),
                txid: [0; 32],
                output_index: 0,
            },
        );

        assert_eq!(addr[..2], PREFIX);
        assert_eq!(addr[2], KeyFamily::AddressIndex as u8);
        assert_eq!(utxo[2], KeyFamily::UtxoIndex as u8);
    }
}
