//! The archive capability the request engine serves from.
//!
//! An [`ArchiveStore`] is a read-only, immutable index of entries plus two
//! byte-stream factories per entry: the bytes as stored (possibly deflated)
//! and the logical, decompressed bytes. [`ZipArchive`](crate::zip::ZipArchive)
//! is the production implementation; [`MemoryArchive`] holds synthetic entries.

mod memory;

pub use memory::MemoryArchive;

use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use std::time::SystemTime;

/// Response body chunks; owns everything it reads from.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// One addressable file inside a mounted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Normalized slash-separated path, no leading slash.
    pub path: String,
    pub logical_size: u64,
    pub stored_size: u64,
    pub mod_time: Option<SystemTime>,
    pub precompressed: bool,
    pub fingerprint: String,
}

impl Entry {
    /// Quoted fingerprint, ready for the `ETag` header.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.fingerprint)
    }
}

/// What a normalized path names inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    File(Entry),
    Directory,
    Missing,
}

/// A contiguous run of bytes inside one representation of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub start: u64,
    pub len: u64,
}

impl ByteSpan {
    pub fn whole(len: u64) -> Self {
        Self { start: 0, len }
    }

    /// Inclusive offset of the last byte.
    pub fn end(&self) -> u64 {
        self.start + self.len.saturating_sub(1)
    }
}

pub trait ArchiveStore: Send + Sync + 'static {
    /// Resolve a normalized path. The empty path is the root directory.
    fn lookup(&self, path: &str) -> Lookup;

    /// Stream `span` of the entry's bytes exactly as stored in the archive.
    fn stored_bytes(&self, entry: &Entry, span: ByteSpan) -> io::Result<ByteStream>;

    /// Stream `span` of the entry's decompressed bytes.
    fn logical_bytes(&self, entry: &Entry, span: ByteSpan) -> io::Result<ByteStream>;

    /// Release the underlying resources. Called once, after the last reader is gone.
    fn close(&self);

    /// Human-readable origin, used in logs.
    fn source(&self) -> &str;
}

/// Parent directories of a member path: `a/b/c.txt` yields `a` and `a/b`.
pub(crate) fn parent_dirs(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}
