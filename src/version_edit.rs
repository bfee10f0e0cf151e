use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    cmp::InternalKeyComparator,
    codec::{
        read_length_prefixed_slice, write_length_prefixed_slice, VarIntReader, VarIntWriter,
    },
    consts::NUM_LEVELS,
    error::{Error, Result},
    file_metadata::FileMetadata,
    format::InternalKey,
    types::SequenceNumber,
    version::{compute_sublevels, Version},
};

const TAG_COMPARATOR: u32 = 1;
const TAG_MIN_UNFLUSHED_LOG_NUM: u32 = 2;
const TAG_NEXT_FILE_NUM: u32 = 3;
const TAG_LAST_SEQUENCE: u32 = 4;
const TAG_COMPACT_POINTER: u32 = 5; // obsolete, consumed and discarded
const TAG_DELETED_FILE: u32 = 6;
const TAG_NEW_FILE_V1: u32 = 7;
const TAG_PREV_LOG_NUMBER: u32 = 9; // obsolete, consumed and discarded
const TAG_NEW_FILE_V2: u32 = 100;
const TAG_NEW_FILE_V3: u32 = 102;
const TAG_NEW_FILE_V4: u32 = 103;

const CUSTOM_TAG_TERMINATOR: u64 = 1;
const CUSTOM_TAG_NEEDS_COMPACTION: u64 = 2;
const CUSTOM_TAG_CREATION_TIME: u64 = 6;
const CUSTOM_TAG_PATH_ID: u64 = 65;
/// Any custom sub-tag with this bit set is safe-to-fail unknown data, not
/// safe to skip.
const CUSTOM_TAG_NON_SAFE_IGNORE_MASK: u64 = 0x40;

/// A file added by a `VersionEdit`, as it appears on the wire. Distinct from
/// `FileMetadata` because the wire format predates (tag 7) and then grew
/// (100/102/103) fields that `FileMetadata` always carries; `VersionEdit`
/// itself only ever holds what a particular edit actually says.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub file_num: u64,
    pub size: u64,
    pub smallest: InternalKey,
    pub largest: InternalKey,
    pub smallest_seq_num: SequenceNumber,
    pub largest_seq_num: SequenceNumber,
    pub marked_for_compaction: bool,
    pub creation_time: u64,
}

impl NewFile {
    pub fn into_file_metadata(self) -> FileMetadata {
        FileMetadata::new(
            self.file_num,
            self.size,
            self.smallest,
            self.largest,
            self.smallest_seq_num,
            self.largest_seq_num,
        )
        .with_marked_for_compaction(self.marked_for_compaction)
        .with_creation_time(self.creation_time)
    }

    pub(crate) fn from_file_metadata(f: &FileMetadata) -> Self {
        NewFile {
            file_num: f.file_num,
            size: f.size,
            smallest: f.smallest.clone(),
            largest: f.largest.clone(),
            smallest_seq_num: f.smallest_seq_num,
            largest_seq_num: f.largest_seq_num,
            marked_for_compaction: f.marked_for_compaction,
            creation_time: f.creation_time,
        }
    }

    fn has_custom_fields(&self) -> bool {
        self.marked_for_compaction || self.creation_time != 0
    }
}

/// A delta of additions and deletions against a base Version, including
/// the comparator name, log/file numbering, and last-sequence fields
/// carried by the manifest wire format.
#[derive(Default)]
pub struct VersionEdit {
    pub comparator_name: Option<String>,
    pub min_unflushed_log_num: Option<u64>,
    pub next_file_num: Option<u64>,
    pub last_seq_num: Option<SequenceNumber>,
    pub deleted_files: Vec<(usize, u64)>,
    pub new_files: Vec<(usize, NewFile)>,
}

impl VersionEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_comparator_name(&mut self, name: impl Into<String>) {
        self.comparator_name = Some(name.into());
    }

    pub fn set_min_unflushed_log_num(&mut self, n: u64) {
        self.min_unflushed_log_num = Some(n);
    }

    pub fn set_next_file_num(&mut self, n: u64) {
        self.next_file_num = Some(n);
    }

    pub fn set_last_seq_num(&mut self, n: SequenceNumber) {
        self.last_seq_num = Some(n);
    }

    pub fn add_file(&mut self, level: usize, file: NewFile) {
        self.new_files.push((level, file));
    }

    pub fn delete_file(&mut self, level: usize, file_num: u64) {
        self.deleted_files.push((level, file_num));
    }

    pub fn encode(&self, dst: &mut Vec<u8>) -> Result<()> {
        if let Some(name) = &self.comparator_name {
            dst.write_var_u32(TAG_COMPARATOR)?;
            write_length_prefixed_slice(dst, name.as_bytes())?;
        }
        if let Some(n) = self.min_unflushed_log_num {
            dst.write_var_u32(TAG_MIN_UNFLUSHED_LOG_NUM)?;
            dst.write_var_u64(n)?;
        }
        if let Some(n) = self.next_file_num {
            dst.write_var_u32(TAG_NEXT_FILE_NUM)?;
            dst.write_var_u64(n)?;
        }
        // An edit that sets the comparator name always carries last_sequence
        // too, even when it is zero, so a reader never has to special-case
        // "comparator-only" records when reconstructing the write frontier.
        if self.last_seq_num.is_some() || self.comparator_name.is_some() {
            dst.write_var_u32(TAG_LAST_SEQUENCE)?;
            dst.write_var_u64(self.last_seq_num.unwrap_or(0))?;
        }
        for &(level, file_num) in &self.deleted_files {
            dst.write_var_u32(TAG_DELETED_FILE)?;
            dst.write_var_u32(level as u32)?;
            dst.write_var_u64(file_num)?;
        }
        for (level, f) in &self.new_files {
            let tag = if f.has_custom_fields() {
                TAG_NEW_FILE_V4
            } else {
                TAG_NEW_FILE_V2
            };
            dst.write_var_u32(tag)?;
            dst.write_var_u32(*level as u32)?;
            dst.write_var_u64(f.file_num)?;
            dst.write_var_u64(f.size)?;
            write_length_prefixed_slice(dst, f.smallest.encode())?;
            write_length_prefixed_slice(dst, f.largest.encode())?;
            dst.write_var_u64(f.smallest_seq_num)?;
            dst.write_var_u64(f.largest_seq_num)?;
            if tag == TAG_NEW_FILE_V4 {
                if f.marked_for_compaction {
                    dst.write_var_u64(CUSTOM_TAG_NEEDS_COMPACTION)?;
                    write_length_prefixed_slice(dst, &[1u8])?;
                }
                if f.creation_time != 0 {
                    dst.write_var_u64(CUSTOM_TAG_CREATION_TIME)?;
                    let mut payload = Vec::new();
                    payload.write_var_u64(f.creation_time)?;
                    write_length_prefixed_slice(dst, &payload)?;
                }
                dst.write_var_u64(CUSTOM_TAG_TERMINATOR)?;
            }
        }
        Ok(())
    }

    pub fn decode(mut src: &[u8]) -> Result<Self> {
        let mut edit = VersionEdit::new();
        while !src.is_empty() {
            let (tag, _) = src.read_var_u32()?;
            match tag {
                TAG_COMPARATOR => {
                    let name = read_length_prefixed_slice(&mut src)?;
                    edit.comparator_name = Some(String::from_utf8_lossy(name).into_owned());
                }
                TAG_MIN_UNFLUSHED_LOG_NUM => {
                    edit.min_unflushed_log_num = Some(src.read_var_u64()?.0);
                }
                TAG_NEXT_FILE_NUM => {
                    edit.next_file_num = Some(src.read_var_u64()?.0);
                }
                TAG_LAST_SEQUENCE => {
                    edit.last_seq_num = Some(src.read_var_u64()?.0);
                }
                TAG_PREV_LOG_NUMBER => {
                    src.read_var_u64()?;
                }
                TAG_COMPACT_POINTER => {
                    let level = decode_level(&mut src)?;
                    let _ = level;
                    read_length_prefixed_slice(&mut src)?;
                }
                TAG_DELETED_FILE => {
                    let level = decode_level(&mut src)?;
                    let file_num = src.read_var_u64()?.0;
                    edit.deleted_files.push((level, file_num));
                }
                TAG_NEW_FILE_V1 | TAG_NEW_FILE_V2 | TAG_NEW_FILE_V3 | TAG_NEW_FILE_V4 => {
                    let level = decode_level(&mut src)?;
                    let file_num = src.read_var_u64()?.0;
                    let size = src.read_var_u64()?.0;
                    let smallest = InternalKey::decode(read_length_prefixed_slice(&mut src)?);
                    let largest = InternalKey::decode(read_length_prefixed_slice(&mut src)?);

                    let (smallest_seq_num, largest_seq_num) = if tag == TAG_NEW_FILE_V1 {
                        (smallest.seq_num(), largest.seq_num())
                    } else {
                        (src.read_var_u64()?.0, src.read_var_u64()?.0)
                    };

                    if tag == TAG_NEW_FILE_V3 {
                        let (path_id, _) = src.read_var_u64()?;
                        if path_id != 0 {
                            return Err(Error::CorruptManifest(
                                "new-file v3 with nonzero path id".to_string(),
                            ));
                        }
                    }

                    let mut marked_for_compaction = false;
                    let mut creation_time = 0u64;
                    if tag == TAG_NEW_FILE_V4 {
                        loop {
                            let (custom_tag, _) = src.read_var_u64()?;
                            if custom_tag == CUSTOM_TAG_TERMINATOR {
                                break;
                            }
                            match custom_tag {
                                CUSTOM_TAG_NEEDS_COMPACTION => {
                                    let payload = read_length_prefixed_slice(&mut src)?;
                                    marked_for_compaction =
                                        payload.first().copied().unwrap_or(0) != 0;
                                }
                                CUSTOM_TAG_CREATION_TIME => {
                                    let mut payload = read_length_prefixed_slice(&mut src)?;
                                    creation_time = payload.read_var_u64()?.0;
                                }
                                CUSTOM_TAG_PATH_ID => {
                                    return Err(Error::CorruptManifest(
                                        "new-file v4 path id is not supported".to_string(),
                                    ));
                                }
                                other => {
                                    let payload = read_length_prefixed_slice(&mut src)?;
                                    if other & CUSTOM_TAG_NON_SAFE_IGNORE_MASK != 0 {
                                        return Err(Error::CorruptManifest(format!(
                                            "unknown non-safe-to-skip custom tag {other}"
                                        )));
                                    }
                                    let _ = payload;
                                }
                            }
                        }
                    }

                    edit.new_files.push((
                        level,
                        NewFile {
                            file_num,
                            size,
                            smallest,
                            largest,
                            smallest_seq_num,
                            largest_seq_num,
                            marked_for_compaction,
                            creation_time,
                        },
                    ));
                }
                200..=203 => {
                    return Err(Error::CorruptManifest(
                        "column families are not supported".to_string(),
                    ));
                }
                other => {
                    return Err(Error::CorruptManifest(format!("unknown tag {other}")));
                }
            }
        }
        Ok(edit)
    }
}

fn decode_level(src: &mut &[u8]) -> Result<usize> {
    let (level, _) = src.read_var_u32()?;
    if level as usize >= NUM_LEVELS {
        return Err(Error::CorruptManifest(format!(
            "level {level} >= NUM_LEVELS"
        )));
    }
    Ok(level as usize)
}

/// Accumulates a sequence of `VersionEdit`s, then applies them all at once
/// against a base Version to produce the next Version plus the set of
/// zombie files.
#[derive(Default)]
pub struct BulkVersionEdit {
    added: [Vec<Arc<FileMetadata>>; NUM_LEVELS],
    deleted: [HashSet<u64>; NUM_LEVELS],
}

impl BulkVersionEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, edit: &VersionEdit) {
        for (level, f) in &edit.new_files {
            self.added[*level].push(Arc::new(f.clone().into_file_metadata()));
        }
        for &(level, file_num) in &edit.deleted_files {
            self.deleted[level].insert(file_num);
        }
    }

    /// Returns the new Version and a map `file_num -> size` of files that
    /// were referenced by `base` but are absent from the new Version at
    /// every level ("zombies": no longer reachable from the latest Version,
    /// but still referenced by an older live one).
    /// `flush_split_bytes` is part of the `Apply` call signature but is not
    /// consumed here: sublevel construction (`compute_sublevels`) is a pure
    /// greedy overlap placement with no byte-size parameter, so there is
    /// nothing for this threshold to feed into yet.
    pub fn apply(
        &self,
        base: Option<&Arc<Version>>,
        cmp: &InternalKeyComparator,
        _flush_split_bytes: u64,
    ) -> Result<(Arc<Version>, HashMap<u64, u64>)> {
        let mut new_levels: [Vec<Arc<FileMetadata>>; NUM_LEVELS] = Default::default();
        let mut zombies: HashMap<u64, u64> = HashMap::new();

        for level in 0..NUM_LEVELS {
            let base_files: &[Arc<FileMetadata>] =
                base.map(|b| b.levels[level].as_slice()).unwrap_or(&[]);
            let added = &self.added[level];
            let deleted = &self.deleted[level];

            if added.is_empty() && deleted.is_empty() {
                new_levels[level] = base_files.to_vec();
                continue;
            }
            if base_files.is_empty() && added.is_empty() {
                return Err(Error::Consistency(format!(
                    "level {level} has deleted files but no existing or added files"
                )));
            }

            if level == 0 {
                let mut combined = Vec::with_capacity(base_files.len() + added.len());
                for f in base_files {
                    if deleted.contains(&f.file_num) {
                        zombies.insert(f.file_num, f.size);
                    } else {
                        combined.push(f.clone());
                    }
                }
                combined.extend(added.iter().cloned());
                combined.sort_by(|a, b| {
                    a.largest_seq_num
                        .cmp(&b.largest_seq_num)
                        .then(a.file_num.cmp(&b.file_num))
                });
                new_levels[0] = combined;
            } else {
                let mut added_sorted = added.clone();
                added_sorted.sort_by(|a, b| cmp.compare(a.smallest.encode(), b.smallest.encode()));

                let mut output = Vec::with_capacity(base_files.len() + added_sorted.len());
                let mut cursor = 0usize;
                for f in &added_sorted {
                    let split = base_files[cursor..].partition_point(|bf| {
                        cmp.compare(bf.smallest.encode(), f.largest.encode())
                            != std::cmp::Ordering::Greater
                    });
                    for bf in &base_files[cursor..cursor + split] {
                        if deleted.contains(&bf.file_num) {
                            zombies.insert(bf.file_num, bf.size);
                        } else {
                            output.push(bf.clone());
                        }
                    }
                    cursor += split;

                    if let Some(last) = output.last() {
                        if cmp.compare(last.largest.encode(), f.smallest.encode())
                            != std::cmp::Ordering::Less
                        {
                            return Err(Error::Consistency(format!(
                                "level {level}: new file {} overlaps {}",
                                f.file_num, last.file_num
                            )));
                        }
                    }
                    output.push(f.clone());
                }
                for bf in &base_files[cursor..] {
                    if deleted.contains(&bf.file_num) {
                        zombies.insert(bf.file_num, bf.size);
                    } else {
                        output.push(bf.clone());
                    }
                }
                new_levels[level] = output;
            }
        }

        // A file deleted from one level and re-added (at the same or a
        // different level) is a move, not a deletion: it should not be
        // reported as a zombie.
        let mut present = HashSet::new();
        for level in &new_levels {
            for f in level {
                present.insert(f.file_num);
            }
        }
        zombies.retain(|file_num, _| !present.contains(file_num));

        for level in &new_levels {
            for f in level {
                f.ref_inc();
            }
        }

        let level0_edited = !self.added[0].is_empty() || !self.deleted[0].is_empty();
        let sublevels = if level0_edited {
            compute_sublevels(&new_levels[0], cmp.user_comparator().as_ref())
        } else {
            match base {
                Some(b) if !b.sublevels.is_empty() || b.levels[0].is_empty() => {
                    b.sublevels.clone()
                }
                _ => compute_sublevels(&new_levels[0], cmp.user_comparator().as_ref()),
            }
        };

        let version = Arc::new(Version::new(new_levels, sublevels));
        version.check_ordering(cmp)?;

        log::debug!(
            "applied version edit: zombies={} total_files={}",
            zombies.len(),
            version.levels.iter().map(|l| l.len()).sum::<usize>()
        );

        Ok((version, zombies))
    }
}
