use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering as AtomicOrdering},
        Arc, Mutex,
    },
};

use crate::{
    cmp::InternalKeyComparator,
    consts::NUM_LEVELS,
    error::{Error, Result},
    file_metadata::FileMetadata,
};

static NEXT_VERSION_ID: AtomicU64 = AtomicU64::new(1);

/// An immutable snapshot of the on-disk level layout: for each of
/// `NUM_LEVELS` levels, an ordered list of files, plus level 0's secondary
/// sublevel decomposition. Versions are never mutated after
/// `BulkVersionEdit::apply` produces them; only `refs` changes, atomically.
pub struct Version {
    id: u64,
    pub levels: [Vec<Arc<FileMetadata>>; NUM_LEVELS],
    /// `sublevels[i]` is overlap-free in user-key space; `sublevels[0]` is
    /// the oldest. Built from `levels[0]` by `compute_sublevels`.
    pub sublevels: Vec<Vec<Arc<FileMetadata>>>,
    refs: AtomicU32,
}

impl Version {
    pub fn empty() -> Arc<Version> {
        Arc::new(Version {
            id: NEXT_VERSION_ID.fetch_add(1, AtomicOrdering::Relaxed),
            levels: Default::default(),
            sublevels: Vec::new(),
            refs: AtomicU32::new(0),
        })
    }

    pub fn new(levels: [Vec<Arc<FileMetadata>>; NUM_LEVELS], sublevels: Vec<Vec<Arc<FileMetadata>>>) -> Version {
        Version {
            id: NEXT_VERSION_ID.fetch_add(1, AtomicOrdering::Relaxed),
            levels,
            sublevels,
            refs: AtomicU32::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn refs(&self) -> u32 {
        self.refs.load(AtomicOrdering::Acquire)
    }

    /// Every file at `level` overlapping `[start, end]` (inclusive,
    /// user-key space). For `level >= 1` this is a contiguous slice found
    /// by two binary searches, since files there are disjoint and sorted.
    /// For `level == 0` files may overlap each other, so the bounds are
    /// expanded to the union of every overlap found and the scan restarts
    /// until a full pass adds nothing.
    pub fn overlaps(&self, level: usize, start: &[u8], end: &[u8], cmp: &InternalKeyComparator) -> Vec<Arc<FileMetadata>> {
        let user_cmp = cmp.user_comparator();
        if level == 0 {
            let mut start = start.to_vec();
            let mut end = end.to_vec();
            loop {
                let mut found = Vec::new();
                let mut expanded = false;
                for f in &self.levels[0] {
                    let (f_small, f_large) = f.user_key_bounds();
                    if ranges_overlap(user_cmp.as_ref(), &start, &end, f_small, f_large) {
                        if user_cmp.as_ref().compare(f_small, &start) == std::cmp::Ordering::Less {
                            start = f_small.to_vec();
                            expanded = true;
                        }
                        if user_cmp.as_ref().compare(f_large, &end) == std::cmp::Ordering::Greater {
                            end = f_large.to_vec();
                            expanded = true;
                        }
                        found.push(f.clone());
                    }
                }
                if !expanded {
                    return found;
                }
            }
        } else {
            let files = &self.levels[level];
            let lo = files.partition_point(|f| {
                user_cmp.as_ref().compare(f.largest.user_key(), start) == std::cmp::Ordering::Less
            });
            let hi = files.partition_point(|f| {
                user_cmp.as_ref().compare(f.smallest.user_key(), end) != std::cmp::Ordering::Greater
            });
            if lo >= hi {
                Vec::new()
            } else {
                files[lo..hi].to_vec()
            }
        }
    }

    /// Validates level ordering: level 0 files are in ascending file_num
    /// order, and levels >= 1 are sorted and pairwise non-overlapping. Run
    /// after every `BulkVersionEdit::apply`.
    pub fn check_ordering(&self, cmp: &InternalKeyComparator) -> Result<()> {
        // Level 0: ascending file_num.
        for pair in self.levels[0].windows(2) {
            if pair[0].file_num >= pair[1].file_num {
                return Err(Error::Consistency(format!(
                    "level 0 files out of file_num order: {} >= {}",
                    pair[0].file_num, pair[1].file_num
                )));
            }
        }

        // Levels >= 1: ascending smallest, pairwise non-overlapping.
        for level in 1..NUM_LEVELS {
            for pair in self.levels[level].windows(2) {
                if cmp.compare(pair[0].largest.encode(), pair[1].smallest.encode()) >= std::cmp::Ordering::Equal {
                    return Err(Error::Consistency(format!(
                        "level {level} files overlap: file {} largest >= file {} smallest",
                        pair[0].file_num, pair[1].file_num
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn level_total_bytes(&self, level: usize) -> u64 {
        self.levels[level].iter().map(|f| f.size).sum()
    }
}

fn ranges_overlap(
    cmp: &dyn crate::cmp::Comparator,
    a_start: &[u8],
    a_end: &[u8],
    b_start: &[u8],
    b_end: &[u8],
) -> bool {
    !(cmp.compare(b_end, a_start) == std::cmp::Ordering::Less
        || cmp.compare(b_start, a_end) == std::cmp::Ordering::Greater)
}

/// Greedy sublevel construction: process level-0 files in their given
/// (oldest-first) order; place each file in the first sublevel whose
/// existing members do not overlap it in user-key space, opening a new
/// (newer) sublevel when none admits it.
pub fn compute_sublevels(
    files: &[Arc<FileMetadata>],
    user_cmp: &dyn crate::cmp::Comparator,
) -> Vec<Vec<Arc<FileMetadata>>> {
    let mut sublevels: Vec<Vec<Arc<FileMetadata>>> = Vec::new();
    'file: for f in files {
        let (f_small, f_large) = f.user_key_bounds();
        for sl in sublevels.iter_mut() {
            let overlaps = sl.iter().any(|existing| {
                let (e_small, e_large) = existing.user_key_bounds();
                ranges_overlap(user_cmp, f_small, f_large, e_small, e_large)
            });
            if !overlaps {
                sl.push(f.clone());
                continue 'file;
            }
        }
        sublevels.push(vec![f.clone()]);
    }
    sublevels
}

/// Process-wide list of live Versions: a `Mutex`-guarded deque of shared,
/// counted Versions. List membership is borrowed, not counted — a Version's
/// own refcount tracks how many holders keep it alive, independent of
/// whether it is still linked into this list.
#[derive(Default)]
pub struct VersionList {
    inner: Mutex<VecDeque<Arc<Version>>>,
}

impl VersionList {
    pub fn new() -> Self {
        VersionList {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_back(&self, v: Arc<Version>) {
        v.refs.fetch_add(1, AtomicOrdering::AcqRel);
        self.inner.lock().unwrap().push_back(v);
    }

    pub fn remove(&self, id: u64) {
        let mut guard = self.inner.lock().unwrap();
        guard.retain(|v| v.id != id);
    }

    pub fn front(&self) -> Option<Arc<Version>> {
        self.inner.lock().unwrap().front().cloned()
    }

    pub fn back(&self) -> Option<Arc<Version>> {
        self.inner.lock().unwrap().back().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Every file referenced by any live Version, for the engine's
    /// physical-deletion-hold-back computation.
    pub fn live_files(&self) -> std::collections::HashSet<u64> {
        let guard = self.inner.lock().unwrap();
        let mut live = std::collections::HashSet::new();
        for v in guard.iter() {
            for level in &v.levels {
                for f in level {
                    live.insert(f.file_num);
                }
            }
        }
        live
    }
}

/// Increments `v`'s refcount; the matching `unref` removes `v` from `list`
/// and decrements every contained file's refcount when the count reaches
/// zero.
pub fn version_ref(v: &Arc<Version>) {
    v.refs.fetch_add(1, AtomicOrdering::AcqRel);
}

pub fn version_unref(v: &Arc<Version>, list: &VersionList) {
    let prev = v.refs.fetch_sub(1, AtomicOrdering::AcqRel);
    if prev == 1 {
        list.remove(v.id);
        for level in &v.levels {
            for f in level {
                f.ref_dec();
            }
        }
    }
}
