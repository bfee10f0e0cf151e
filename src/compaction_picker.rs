use std::{cmp::Ordering, sync::Arc};

use crate::{cmp::InternalKeyComparator, consts::NUM_LEVELS, file_metadata::FileMetadata, types::SequenceNumber, version::Version};

/// What the picker decided, if anything.
#[derive(Debug)]
pub enum PickResult {
    None,
    L0ToLbase {
        l0_inputs: Vec<Arc<FileMetadata>>,
        base_level: usize,
        base_inputs: Vec<Arc<FileMetadata>>,
    },
    IntraL0 {
        inputs: Vec<Arc<FileMetadata>>,
    },
}

impl PickResult {
    pub fn is_none(&self) -> bool {
        matches!(self, PickResult::None)
    }
}

/// Given the current Version and run-time state, decides what (if
/// anything) to compact next. A pure computation: no mutation, no I/O, no
/// retained state between calls.
pub fn pick(
    version: &Version,
    cmp: &InternalKeyComparator,
    l0_compaction_threshold: usize,
    earliest_unflushed_seq_num: SequenceNumber,
) -> PickResult {
    if version.sublevels.len() >= l0_compaction_threshold {
        if let Some((l0_inputs, base_level, base_inputs)) = pick_l0_to_lbase(version, cmp) {
            log::warn!(
                "picked L0->L{base_level} compaction: {} L0 file(s), {} base file(s)",
                l0_inputs.len(),
                base_inputs.len()
            );
            return PickResult::L0ToLbase {
                l0_inputs,
                base_level,
                base_inputs,
            };
        }
    }

    let newest_first: Vec<Arc<FileMetadata>> = version.levels[0].iter().rev().cloned().collect();
    match pick_intra_l0(&newest_first, earliest_unflushed_seq_num) {
        Some(inputs) => {
            log::warn!("picked intra-L0 compaction: {} file(s)", inputs.len());
            PickResult::IntraL0 { inputs }
        }
        None => PickResult::None,
    }
}

/// Picks an L0 -> Lbase compaction: finds the lowest non-empty level as
/// base, expands L0 and base inputs to a mutual fixed point, and returns
/// `None` when there is nothing to compact or expansion collides with an
/// in-progress compaction (the caller should then try intra-L0).
fn pick_l0_to_lbase(
    version: &Version,
    cmp: &InternalKeyComparator,
) -> Option<(Vec<Arc<FileMetadata>>, usize, Vec<Arc<FileMetadata>>)> {
    let user_cmp = cmp.user_comparator().as_ref();

    let base_level = (1..NUM_LEVELS)
        .find(|&l| !version.levels[l].is_empty())
        .unwrap_or(NUM_LEVELS - 1);

    let l0_candidates: Vec<Arc<FileMetadata>> = version.levels[0]
        .iter()
        .filter(|f| !f.is_compacting())
        .cloned()
        .collect();
    if l0_candidates.is_empty() {
        return None;
    }

    let (mut start, mut end) = user_key_bounds_of(&l0_candidates);

    // Step 4: expand into base.
    let base_inputs = version.overlaps(base_level, &start, &end, cmp);

    // Step 5: abandon if the base expansion collides with an in-flight
    // compaction.
    if base_inputs.iter().any(|f| f.is_compacting()) {
        return None;
    }

    for f in &base_inputs {
        let (s, e) = f.user_key_bounds();
        if user_cmp.compare(s, &start) == Ordering::Less {
            start = s.to_vec();
        }
        if user_cmp.compare(e, &end) == Ordering::Greater {
            end = e.to_vec();
        }
    }

    // Step 6: expand back into L0 with the combined bounds. L0 files
    // overlap each other, so this can grow beyond `l0_candidates`.
    let l0_inputs = version.overlaps(0, &start, &end, cmp);
    if l0_inputs.iter().any(|f| f.is_compacting()) {
        return None;
    }

    Some((l0_inputs, base_level, base_inputs))
}

fn user_key_bounds_of(files: &[Arc<FileMetadata>]) -> (Vec<u8>, Vec<u8>) {
    let (start0, end0) = files[0].user_key_bounds();
    let (mut start, mut end) = (start0.to_vec(), end0.to_vec());
    for f in &files[1..] {
        let (s, e) = f.user_key_bounds();
        if s < start.as_slice() {
            start = s.to_vec();
        }
        if e > end.as_slice() {
            end = e.to_vec();
        }
    }
    (start, end)
}

/// Picks a compaction whose inputs and outputs are all in L0.
/// `l0_files_newest_first` must already be sorted newest-to-oldest
/// (descending file_num).
///
/// Two exclusion rules are at play and they are *not* equivalent:
///
/// - A file already compacting (of either kind) is simply dropped from the
///   candidate pool; older files are still considered.
/// - If the single newest L0 file's `largest_seq_num` is at or past
///   `earliest_unflushed_seq_num`, the whole plan is blocked (`None`):
///   intra-L0 compaction always starts from the current write frontier, so
///   if that frontier might still be mutated there is nothing safe to
///   start from, regardless of how many older files would otherwise
///   qualify.
pub fn pick_intra_l0(
    l0_files_newest_first: &[Arc<FileMetadata>],
    earliest_unflushed_seq_num: SequenceNumber,
) -> Option<Vec<Arc<FileMetadata>>> {
    let newest = l0_files_newest_first.first()?;
    if newest.largest_seq_num >= earliest_unflushed_seq_num {
        return None;
    }

    let candidates: Vec<&Arc<FileMetadata>> = l0_files_newest_first
        .iter()
        .filter(|f| !f.is_compacting() && f.largest_seq_num < earliest_unflushed_seq_num)
        .collect();

    let mut accepted: Vec<Arc<FileMetadata>> = Vec::new();
    let mut bytes: u64 = 0;
    for f in candidates {
        let k = accepted.len() as u64;
        if k == 0 {
            accepted.push(f.clone());
            bytes = f.size;
            continue;
        }
        // Admit iff f.size <= bytes / k, compared without integer
        // truncation: f.size * k <= bytes.
        if f.size * k <= bytes {
            accepted.push(f.clone());
            bytes += f.size;
        } else {
            break;
        }
    }

    if accepted.len() < 2 {
        None
    } else {
        Some(accepted)
    }
}
