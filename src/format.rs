use std::cmp::Ordering;

use crate::{
    codec::{NumberReader, NumberWriter},
    types::{SequenceNumber, MAX_SEQUENCE_NUMBER},
};

/// The trailer kind tag. Only the two kinds this core's tests and invariants
/// need to distinguish are modeled; an embedding engine is free to widen
/// this (merge, range-delete, ...) without touching ordering, which only
/// ever compares the raw `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Kind {
    Deletion = 0,
    Value = 1,
}

impl TryFrom<u8> for Kind {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Kind::Deletion),
            1 => Ok(Kind::Value),
            other => Err(crate::error::Error::CorruptManifest(format!(
                "unknown internal key kind {other}"
            ))),
        }
    }
}

/// `user_key || little_endian_u64(seq_num << 8 | kind)`.
///
/// Comparison of two internal keys with equal user keys is done on the raw
/// trailer as an unsigned little-endian u64, descending: a higher sequence
/// number sorts first, and within equal sequence a higher kind sorts first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternalKey {
    rep: Vec<u8>,
}

impl InternalKey {
    pub fn empty() -> Self {
        InternalKey { rep: Vec::new() }
    }

    pub fn new(user_key: &[u8], seq_num: SequenceNumber, kind: Kind) -> Self {
        assert!(seq_num <= MAX_SEQUENCE_NUMBER);
        let mut rep = Vec::with_capacity(user_key.len() + 8);
        rep.extend_from_slice(user_key);
        let trailer = (seq_num << 8) | kind as u64;
        rep.write_u64_le(trailer).unwrap();
        InternalKey { rep }
    }

    pub fn decode(data: &[u8]) -> Self {
        InternalKey { rep: data.to_vec() }
    }

    pub fn encode(&self) -> &[u8] {
        &self.rep
    }

    pub fn is_empty(&self) -> bool {
        self.rep.is_empty()
    }

    pub fn user_key(&self) -> &[u8] {
        assert!(self.rep.len() >= 8);
        &self.rep[..self.rep.len() - 8]
    }

    pub fn trailer(&self) -> u64 {
        let mut tail: &[u8] = &self.rep[self.rep.len() - 8..];
        tail.read_u64_le().unwrap()
    }

    pub fn seq_num(&self) -> SequenceNumber {
        self.trailer() >> 8
    }

    pub fn kind(&self) -> u8 {
        (self.trailer() & 0xff) as u8
    }
}

/// Extracts the user-key portion of an encoded internal key without
/// allocating an `InternalKey`.
pub fn extract_user_key(encoded: &[u8]) -> &[u8] {
    assert!(encoded.len() >= 8);
    &encoded[..encoded.len() - 8]
}

pub fn extract_trailer(encoded: &[u8]) -> u64 {
    let mut tail: &[u8] = &encoded[encoded.len() - 8..];
    tail.read_u64_le().unwrap()
}

/// Compares the trailers of two encoded internal keys that share a user
/// key: descending sequence, then descending kind.
pub fn compare_trailers(a: u64, b: u64) -> Ordering {
    b.cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_round_trips() {
        let k = InternalKey::new(b"foo", 42, Kind::Value);
        assert_eq!(k.user_key(), b"foo");
        assert_eq!(k.seq_num(), 42);
        assert_eq!(k.kind(), Kind::Value as u8);
    }

    #[test]
    fn higher_seq_sorts_first() {
        let a = extract_trailer(InternalKey::new(b"k", 5, Kind::Value).encode());
        let b = extract_trailer(InternalKey::new(b"k", 7, Kind::Value).encode());
        assert_eq!(compare_trailers(a, b), Ordering::Greater);
    }

    #[test]
    fn higher_kind_breaks_seq_tie() {
        let a = extract_trailer(InternalKey::new(b"k", 5, Kind::Deletion).encode());
        let b = extract_trailer(InternalKey::new(b"k", 5, Kind::Value).encode());
        assert_eq!(compare_trailers(a, b), Ordering::Greater);
    }
}
