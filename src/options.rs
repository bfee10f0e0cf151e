use std::sync::Arc;

use crate::{
    cmp::{BitwiseComparator, Comparator},
    consts::{DEFAULT_FLUSH_SPLIT_BYTES, L0_COMPACTION_TRIGGER},
};

/// Tuning knobs for the version/compaction core. Everything that does not
/// fit a per-call argument (comparator, thresholds) lives here, constructed
/// via `Default` and overridden field-by-field as needed.
#[derive(Clone)]
pub struct VersionOptions {
    pub comparator: Arc<dyn Comparator>,

    /// Minimum L0 sublevel count that triggers an L0 -> Lbase compaction.
    pub l0_compaction_threshold: usize,

    /// Byte threshold used when deciding sublevel flush boundaries.
    pub flush_split_bytes: u64,
}

impl Default for VersionOptions {
    fn default() -> Self {
        VersionOptions {
            comparator: Arc::new(BitwiseComparator {}),
            l0_compaction_threshold: L0_COMPACTION_TRIGGER,
            flush_split_bytes: DEFAULT_FLUSH_SPLIT_BYTES,
        }
    }
}
