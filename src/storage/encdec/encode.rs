use super::Encode;

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl Encode for u8 {
    fn encode(&self) -> Vec<u8> {
        vec![*self]
    }
}

// Fixed-width big-endian, so encoded keys sort like the integers they carry.
macro_rules! impl_uint_encode {
    ($type:ty) => {
        impl Encode for $type {
            fn encode(&self) -> Vec<u8> {
                self.to_be_bytes().to_vec()
            }
        }
    };
}

impl_uint_encode!(u16);
impl_uint_encode!(u32);
impl_uint_encode!(u64);

// Amounts are value-position only, so plain two's complement is fine.
impl Encode for i64 {
    fn encode(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

/// Length-prefixed, so addresses of differing length stay mutually decodable
/// while all keys for one address remain contiguous.
impl Encode for str {
    fn encode(&self) -> Vec<u8> {
        let bytes = self.as_bytes();
        debug_assert!(bytes.len() <= u8::MAX as usize, "address too long to encode");

        let mut out = Vec::with_capacity(1 + bytes.len());
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
        out
    }
}

impl Encode for String {
    fn encode(&self) -> Vec<u8> {
        self.as_str().encode()
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self) -> Vec<u8> {
        (**self).encode()
    }
}

impl Encode for () {
    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}

// Tuples of encodable fields act as partial keys for range bounds.
impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode(&self) -> Vec<u8> {
        [self.0.encode(), self.1.encode()].concat()
    }
}

impl<A: Encode, B: Encode, C: Encode> Encode for (A, B, C) {
    fn encode(&self) -> Vec<u8> {
        [self.0.encode(), self.1.encode(), self.2.encode()].concat()
    }
}
