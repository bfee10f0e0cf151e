use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};

use crate::{format::InternalKey, types::SequenceNumber};

/// Immutable descriptor of one on-disk SST. All fields except `refs`,
/// `compacting` and `intra_l0_compacting` are fixed at construction time;
/// those three are the only fields ever mutated after a `FileMetadata` is
/// shared across Versions, and they are mutated through atomics only.
#[derive(Debug)]
pub struct FileMetadata {
    pub file_num: u64,
    pub size: u64,
    pub smallest: InternalKey,
    pub largest: InternalKey,
    pub smallest_seq_num: SequenceNumber,
    pub largest_seq_num: SequenceNumber,
    pub marked_for_compaction: bool,
    pub creation_time: u64,

    refs: AtomicU32,
    /// Set by the embedding engine while a compaction (L0->Lbase or
    /// intra-L0) is consuming this file as input. The picker treats both
    /// flags as exclusionary; see `Picker`.
    compacting: AtomicBool,
    intra_l0_compacting: AtomicBool,
}

impl FileMetadata {
    pub fn new(
        file_num: u64,
        size: u64,
        smallest: InternalKey,
        largest: InternalKey,
        smallest_seq_num: SequenceNumber,
        largest_seq_num: SequenceNumber,
    ) -> Self {
        FileMetadata {
            file_num,
            size,
            smallest,
            largest,
            smallest_seq_num,
            largest_seq_num,
            marked_for_compaction: false,
            creation_time: 0,
            refs: AtomicU32::new(0),
            compacting: AtomicBool::new(false),
            intra_l0_compacting: AtomicBool::new(false),
        }
    }

    pub fn with_marked_for_compaction(mut self, marked: bool) -> Self {
        self.marked_for_compaction = marked;
        self
    }

    pub fn with_creation_time(mut self, creation_time: u64) -> Self {
        self.creation_time = creation_time;
        self
    }

    pub fn refs(&self) -> u32 {
        self.refs.load(AtomicOrdering::Acquire)
    }

    pub fn ref_inc(&self) {
        self.refs.fetch_add(1, AtomicOrdering::AcqRel);
    }

    /// Returns the refcount after decrementing; a Version's unref path uses
    /// this to notice when a file has become a zombie candidate from every
    /// live Version's perspective.
    pub fn ref_dec(&self) -> u32 {
        self.refs.fetch_sub(1, AtomicOrdering::AcqRel) - 1
    }

    pub fn is_compacting(&self) -> bool {
        self.compacting.load(AtomicOrdering::Acquire)
            || self.intra_l0_compacting.load(AtomicOrdering::Acquire)
    }

    pub fn is_intra_l0_compacting(&self) -> bool {
        self.intra_l0_compacting.load(AtomicOrdering::Acquire)
    }

    pub fn set_compacting(&self, value: bool) {
        self.compacting.store(value, AtomicOrdering::Release);
    }

    pub fn set_intra_l0_compacting(&self, value: bool) {
        self.intra_l0_compacting
            .store(value, AtomicOrdering::Release);
    }

    /// `[smallest.user_key(), largest.user_key()]` as a half-open-free,
    /// inclusive byte range, for overlap checks against plain user keys.
    pub fn user_key_bounds(&self) -> (&[u8], &[u8]) {
        (self.smallest.user_key(), self.largest.user_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Kind;

    fn meta(num: u64) -> FileMetadata {
        FileMetadata::new(
            num,
            1024,
            InternalKey::new(b"a", 1, Kind::Value),
            InternalKey::new(b"z", 1, Kind::Value),
            1,
            1,
        )
    }

    #[test]
    fn refcount_tracks_inc_dec() {
        let f = meta(1);
        assert_eq!(f.refs(), 0);
        f.ref_inc();
        f.ref_inc();
        assert_eq!(f.refs(), 2);
        assert_eq!(f.ref_dec(), 1);
        assert_eq!(f.ref_dec(), 0);
    }

    #[test]
    fn compacting_flags_are_independent() {
        let f = meta(1);
        assert!(!f.is_compacting());
        f.set_intra_l0_compacting(true);
        assert!(f.is_compacting());
        assert!(f.is_intra_l0_compacting());
        f.set_intra_l0_compacting(false);
        f.set_compacting(true);
        assert!(f.is_compacting());
        assert!(!f.is_intra_l0_compacting());
    }
}
