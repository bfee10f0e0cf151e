use std::{io, result};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Wire-format violation while decoding a VersionEdit or replaying a
    /// manifest: unexpected EOF, a rejected tag, a level >= NUM_LEVELS, or a
    /// column-family tag.
    #[error("corrupt manifest: {0}")]
    CorruptManifest(String),

    /// A level-layout invariant (ordering, overlap, cross-level) was
    /// violated. Always a caller bug: a flush or compaction completion fed
    /// BulkVersionEdit an edit that does not describe a consistent level
    /// layout. Never recovered from; propagate to the caller.
    #[error("version consistency violation: {0}")]
    Consistency(String),

    #[error("io error")]
    Io {
        #[from]
        source: io::Error,
    },
}

pub type Result<T> = result::Result<T, Error>;
