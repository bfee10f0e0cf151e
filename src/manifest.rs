use std::sync::Arc;

use crate::{
    cmp::InternalKeyComparator,
    error::{Error, Result},
    version::Version,
    version_edit::{BulkVersionEdit, NewFile, VersionEdit},
};

/// Record-framed read side of a manifest log, abstracted away from any
/// concrete file type or on-disk framing: callers supply their own block
/// and checksum framing, and this crate only consumes whole records.
pub trait ManifestRecordReader {
    /// The next record, or `None` once the stream is exhausted.
    fn read_record(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Record-framed write side of a manifest log.
pub trait ManifestRecordWriter {
    fn add_record(&mut self, record: &[u8]) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}

/// Replays every record in `reader`, accumulating and applying one
/// `VersionEdit` at a time, and returns the Version the manifest describes.
/// An empty manifest yields `Version::empty()`. The first record's
/// comparator name, if present, is checked against `cmp`; every Version
/// produced along the way is checked with `Version::check_ordering`
/// (inside `BulkVersionEdit::apply`), so a truncated or corrupt manifest
/// fails here rather than silently handing back a broken layout.
pub fn replay<R: ManifestRecordReader>(
    reader: &mut R,
    cmp: &InternalKeyComparator,
    flush_split_bytes: u64,
) -> Result<Arc<Version>> {
    let mut version: Option<Arc<Version>> = None;

    while let Some(record) = reader.read_record()? {
        let edit = VersionEdit::decode(&record)?;
        if let Some(name) = &edit.comparator_name {
            if name.as_str() != cmp.user_comparator().name() {
                return Err(Error::CorruptManifest(format!(
                    "manifest comparator {name} does not match configured comparator {}",
                    cmp.user_comparator().name()
                )));
            }
        }

        let mut bulk = BulkVersionEdit::new();
        bulk.accumulate(&edit);
        let (next, _zombies) = bulk.apply(version.as_ref(), cmp, flush_split_bytes)?;
        version = Some(next);
    }

    Ok(version.unwrap_or_else(Version::empty))
}

/// Encodes `edit` and appends it to the manifest as a single record,
/// syncing before returning so a crash after this call cannot lose the
/// edit.
pub fn write_edit<W: ManifestRecordWriter>(writer: &mut W, edit: &VersionEdit) -> Result<()> {
    let mut buf = Vec::new();
    edit.encode(&mut buf)?;
    writer.add_record(&buf)?;
    writer.sync()
}

/// Builds a `VersionEdit` describing every file in `version`, at every
/// level, as a single snapshot record. Used to seed a fresh manifest file
/// without replaying the whole edit history.
pub fn snapshot_edit(version: &Version, comparator_name: impl Into<String>) -> VersionEdit {
    let mut edit = VersionEdit::new();
    edit.set_comparator_name(comparator_name);
    for (level, files) in version.levels.iter().enumerate() {
        for f in files {
            edit.add_file(level, NewFile::from_file_metadata(f));
        }
    }
    edit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cmp::BitwiseComparator,
        format::{InternalKey, Kind},
    };
    use std::collections::VecDeque;

    struct InMemoryManifest {
        records: VecDeque<Vec<u8>>,
    }

    impl ManifestRecordReader for InMemoryManifest {
        fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(self.records.pop_front())
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        records: Vec<Vec<u8>>,
        synced: usize,
    }

    impl ManifestRecordWriter for RecordingWriter {
        fn add_record(&mut self, record: &[u8]) -> Result<()> {
            self.records.push(record.to_vec());
            Ok(())
        }

        fn sync(&mut self) -> Result<()> {
            self.synced += 1;
            Ok(())
        }
    }

    fn icmp() -> InternalKeyComparator {
        InternalKeyComparator::new(Arc::new(BitwiseComparator {}))
    }

    fn file(num: u64, small: &[u8], large: &[u8]) -> NewFile {
        NewFile {
            file_num: num,
            size: 100,
            smallest: InternalKey::new(small, 1, Kind::Value),
            largest: InternalKey::new(large, 1, Kind::Value),
            smallest_seq_num: 1,
            largest_seq_num: 1,
            marked_for_compaction: false,
            creation_time: 0,
        }
    }

    #[test]
    fn replay_applies_records_in_order() {
        let mut edit1 = VersionEdit::new();
        edit1.set_comparator_name("leveldb.BytewiseComparator");
        edit1.add_file(1, file(1, b"a", b"c"));
        let mut buf1 = Vec::new();
        edit1.encode(&mut buf1).unwrap();

        let mut edit2 = VersionEdit::new();
        edit2.delete_file(1, 1);
        edit2.add_file(1, file(2, b"d", b"f"));
        let mut buf2 = Vec::new();
        edit2.encode(&mut buf2).unwrap();

        let mut reader = InMemoryManifest {
            records: VecDeque::from(vec![buf1, buf2]),
        };

        let version = replay(&mut reader, &icmp(), 0).unwrap();
        let nums: Vec<u64> = version.levels[1].iter().map(|f| f.file_num).collect();
        assert_eq!(nums, vec![2]);
    }

    #[test]
    fn replay_rejects_mismatched_comparator() {
        let mut edit = VersionEdit::new();
        edit.set_comparator_name("some.OtherComparator");
        let mut buf = Vec::new();
        edit.encode(&mut buf).unwrap();
        let mut reader = InMemoryManifest {
            records: VecDeque::from(vec![buf]),
        };
        assert!(replay(&mut reader, &icmp(), 0).is_err());
    }

    #[test]
    fn replay_of_empty_manifest_yields_empty_version() {
        let mut reader = InMemoryManifest {
            records: VecDeque::new(),
        };
        let version = replay(&mut reader, &icmp(), 0).unwrap();
        assert_eq!(version.levels.iter().map(|l| l.len()).sum::<usize>(), 0);
    }

    #[test]
    fn write_edit_syncs_after_appending() {
        let mut writer = RecordingWriter::default();
        let mut edit = VersionEdit::new();
        edit.add_file(1, file(1, b"a", b"c"));
        write_edit(&mut writer, &edit).unwrap();
        assert_eq!(writer.records.len(), 1);
        assert_eq!(writer.synced, 1);
    }

    #[test]
    fn snapshot_edit_always_carries_last_sequence() {
        let version = Version::empty();
        let edit = snapshot_edit(&version, "leveldb.BytewiseComparator");
        let mut buf = Vec::new();
        edit.encode(&mut buf).unwrap();
        let decoded = VersionEdit::decode(&buf).unwrap();
        assert_eq!(decoded.last_seq_num, Some(0));
    }

    #[test]
    fn snapshot_edit_then_replay_round_trips_a_version() {
        let mut edit = VersionEdit::new();
        edit.set_comparator_name("leveldb.BytewiseComparator");
        edit.add_file(1, file(1, b"a", b"c"));
        edit.add_file(2, file(2, b"d", b"f"));
        let mut buf = Vec::new();
        edit.encode(&mut buf).unwrap();
        let mut reader = InMemoryManifest {
            records: VecDeque::from(vec![buf]),
        };
        let version = replay(&mut reader, &icmp(), 0).unwrap();

        let snapshot = snapshot_edit(&version, "leveldb.BytewiseComparator");
        let mut snapshot_buf = Vec::new();
        snapshot.encode(&mut snapshot_buf).unwrap();
        let mut reader2 = InMemoryManifest {
            records: VecDeque::from(vec![snapshot_buf]),
        };
        let version2 = replay(&mut reader2, &icmp(), 0).unwrap();

        assert_eq!(version.levels[1].len(), version2.levels[1].len());
        assert_eq!(version.levels[2].len(), version2.levels[2].len());
    }

    /// S7, driven through a small text-based harness rather than a plain
    /// assertion, since it is fundamentally a "given this input, check this
    /// textual outcome" scenario.
    #[test]
    fn s7_new_file_tag_upgrade_is_data_driven() {
        use crate::datadriven::run_test_from_string;
        use crate::format::{InternalKey, Kind};

        // The harness reads everything after the `----` line as one case's
        // expected output (it has no blank-line case separator), so each
        // scenario gets its own `run_test_from_string` call.
        let marked_input = r"
new-file level=0 num=20 smallest=a largest=z seq=7 marked=true ctime=17
----
tag=v4 idempotent=true
";
        let plain_input = r"
new-file level=0 num=21 smallest=a largest=z seq=7 marked=false ctime=0
----
tag=v2 idempotent=true
";

        let run = |input: &str| run_test_from_string(input, |t| {
            assert_eq!(t.cmd, "new-file");
            let level = t.scan_args("level").uint64(0) as usize;
            let num = t.scan_args("num").uint64(0);
            let smallest = t.scan_args("smallest").string(0);
            let largest = t.scan_args("largest").string(0);
            let seq = t.scan_args("seq").uint64(0);
            let marked = t.scan_args("marked").bool(0);
            let ctime = t.scan_args("ctime").uint64(0);

            let mut edit = VersionEdit::new();
            edit.add_file(
                level,
                NewFile {
                    file_num: num,
                    size: 1024,
                    smallest: InternalKey::new(smallest.as_bytes(), seq, Kind::Value),
                    largest: InternalKey::new(largest.as_bytes(), seq, Kind::Value),
                    smallest_seq_num: seq,
                    largest_seq_num: seq,
                    marked_for_compaction: marked,
                    creation_time: ctime,
                },
            );

            let mut first = Vec::new();
            edit.encode(&mut first).unwrap();
            let decoded = VersionEdit::decode(&first).unwrap();
            let mut second = Vec::new();
            decoded.encode(&mut second).unwrap();

            let tag = if decoded.new_files[0].1.marked_for_compaction
                || decoded.new_files[0].1.creation_time != 0
            {
                "v4"
            } else {
                "v2"
            };
            format!("tag={tag} idempotent={}\n", first == second)
        });

        run(marked_input);
        run(plain_input);
    }
}
