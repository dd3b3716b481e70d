use bytes::Bytes;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use super::{ArchiveStore, ByteSpan, ByteStream, Entry, Lookup, parent_dirs};

const CHUNK_SIZE: usize = 16 * 1024;

struct MemoryFile {
    entry: Entry,
    stored: Bytes,
    logical: Bytes,
}

/// Archive store over entries held in memory.
///
/// Deflated entries are compressed once, at insert time, so they expose the
/// same stored/logical split as a ZIP member.
#[derive(Default)]
pub struct MemoryArchive {
    name: String,
    files: HashMap<String, MemoryFile>,
    dirs: HashSet<String>,
    close_calls: AtomicUsize,
}

impl MemoryArchive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an entry kept uncompressed.
    pub fn with_file(
        self,
        path: &str,
        data: impl Into<Vec<u8>>,
        mod_time: Option<SystemTime>,
    ) -> Self {
        let logical = Bytes::from(data.into());
        self.insert(path, logical.clone(), logical, false, mod_time)
    }

    /// Add an entry kept deflate-compressed.
    pub fn with_deflated(
        self,
        path: &str,
        data: impl Into<Vec<u8>>,
        mod_time: Option<SystemTime>,
    ) -> Self {
        let logical = Bytes::from(data.into());
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        // writing into a Vec cannot fail
        let stored = encoder
            .write_all(&logical)
            .and_then(|_| encoder.finish())
            .map(Bytes::from)
            .unwrap_or_default();
        self.insert(path, stored, logical, true, mod_time)
    }

    /// Add an empty directory.
    pub fn with_dir(mut self, path: &str) -> Self {
        let path = path.trim_matches('/');
        for parent in parent_dirs(path) {
            self.dirs.insert(parent.to_string());
        }
        self.dirs.insert(path.to_string());
        self
    }

    /// How many times the store has been closed.
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn insert(
        mut self,
        path: &str,
        stored: Bytes,
        logical: Bytes,
        precompressed: bool,
        mod_time: Option<SystemTime>,
    ) -> Self {
        let path = path.trim_start_matches('/').to_string();
        for parent in parent_dirs(&path) {
            self.dirs.insert(parent.to_string());
        }

        let mut crc = flate2::Crc::new();
        crc.update(&logical);
        let entry = Entry {
            path: path.clone(),
            logical_size: logical.len() as u64,
            stored_size: stored.len() as u64,
            mod_time,
            precompressed,
            fingerprint: format!("{:x}{:x}", logical.len(), crc.sum()),
        };
        self.files.insert(
            path,
            MemoryFile {
                entry,
                stored,
                logical,
            },
        );
        self
    }

    fn stream(&self, entry: &Entry, span: ByteSpan, stored: bool) -> io::Result<ByteStream> {
        if self.close_count() > 0 {
            return Err(io::Error::other("archive is closed"));
        }
        let file = self
            .files
            .get(&entry.path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        let data = if stored { &file.stored } else { &file.logical };

        let start = span.start as usize;
        let end = start.saturating_add(span.len as usize);
        if end > data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "span exceeds entry length",
            ));
        }

        let data = data.slice(start..end);
        let chunks: Vec<io::Result<Bytes>> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|at| Ok(data.slice(at..(at + CHUNK_SIZE).min(data.len()))))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

impl ArchiveStore for MemoryArchive {
    fn lookup(&self, path: &str) -> Lookup {
        if let Some(file) = self.files.get(path) {
            return Lookup::File(file.entry.clone());
        }
        if path.is_empty() || self.dirs.contains(path) {
            return Lookup::Directory;
        }
        Lookup::Missing
    }

    fn stored_bytes(&self, entry: &Entry, span: ByteSpan) -> io::Result<ByteStream> {
        self.stream(entry, span, true)
    }

    fn logical_bytes(&self, entry: &Entry, span: ByteSpan) -> io::Result<ByteStream> {
        self.stream(entry, span, false)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn source(&self) -> &str {
        &self.name
    }
}
