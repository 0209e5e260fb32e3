use thiserror::Error;

use super::Decode;

#[derive(Debug, Clone, Error)]
pub enum DecodingError {
    #[error("malformed input: {0} ({1:?})")]
    MalformedInput(String, Vec<u8>),
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("enum kind: {0:?}")]
    InvalidEnumKind(Vec<u8>),
}

// Helper method to create MalformedInput error with just a message
pub fn malformed_input<S: Into<String>>(msg: S, bytes: &[u8]) -> DecodingError {
    DecodingError::MalformedInput(msg.into(), bytes.to_vec())
}

pub type DecodingResult<'a, T> = Result<(T, &'a [u8]), DecodingError>;

impl<const N: usize> Decode for [u8; N] {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        bytes
            .get(..N)
            .map(|slice| {
                (
                    slice.try_into().expect("slice with incorrect length"),
                    &bytes[N..],
                )
            })
            .ok_or(malformed_input("array insufficient bytes", bytes))
    }
}

impl Decode for u8 {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        bytes
            .first()
            .map(|b| (*b, &bytes[1..]))
            .ok_or(malformed_input("u8 insufficient bytes", bytes))
    }
}

macro_rules! impl_uint_decode {
    ($type:ty, $width:expr) => {
        impl Decode for $type {
            fn decode(bytes: &[u8]) -> DecodingResult<Self> {
                let (raw, rest) = <[u8; $width]>::decode(bytes)?;
                Ok((<$type>::from_be_bytes(raw), rest))
            }
        }
    };
}

impl_uint_decode!(u16, 2);
impl_uint_decode!(u32, 4);
impl_uint_decode!(u64, 8);
impl_uint_decode!(i64, 8);

impl Decode for String {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        let (len, rest) = u8::decode(bytes)?;

        let (raw, rest) = rest
            .split_at_checked(len as usize)
            .ok_or(malformed_input("string insufficient bytes", bytes))?;

        Ok((String::from_utf8(raw.to_vec())?, rest))
    }
}
