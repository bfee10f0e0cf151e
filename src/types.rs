pub type SequenceNumber = u64;

/// Sequence numbers are packed into the high 56 bits of an internal key's
/// 8-byte trailer; `kind` occupies the low 8 bits.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;
