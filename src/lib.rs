#![allow(dead_code)]

mod cmp;
mod codec;
mod compaction_picker;
mod consts;
mod datadriven;
mod error;
mod file_metadata;
mod format;
mod manifest;
mod options;
mod types;
mod version;
mod version_edit;

pub use cmp::{BitwiseComparator, Comparator, InternalKeyComparator};
pub use compaction_picker::{pick, pick_intra_l0, PickResult};
pub use consts::{DEFAULT_FLUSH_SPLIT_BYTES, L0_COMPACTION_TRIGGER, NUM_LEVELS};
pub use error::{Error, Result};
pub use file_metadata::FileMetadata;
pub use format::{InternalKey, Kind};
pub use manifest::{replay, snapshot_edit, write_edit, ManifestRecordReader, ManifestRecordWriter};
pub use options::VersionOptions;
pub use types::{SequenceNumber, MAX_SEQUENCE_NUMBER};
pub use version::{compute_sublevels, version_ref, version_unref, Version, VersionList};
pub use version_edit::{BulkVersionEdit, NewFile, VersionEdit};
