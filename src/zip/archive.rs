use futures::{StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::OpenError;
use crate::io::{HttpRangeReader, LocalFileReader, ReadAt, into_io_error, is_http_url};
use crate::store::{ArchiveStore, ByteSpan, ByteStream, Entry, Lookup, parent_dirs};

use super::inflate::{copy_span, inflate_span};
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

struct Member {
    entry: Entry,
    record: ZipFileEntry,
}

/// A mounted ZIP archive.
///
/// The central directory is read once at open time into an in-memory index;
/// member data is read on demand through the shared [`ReadAt`] source.
pub struct ZipArchive {
    source: String,
    reader: RwLock<Option<Arc<dyn ReadAt>>>,
    members: HashMap<String, Member>,
    dirs: HashSet<String>,
}

impl ZipArchive {
    /// Open an archive from a local path or an `http(s)://` URL.
    pub async fn open(location: &str) -> Result<Self, OpenError> {
        let reader: Arc<dyn ReadAt> = if is_http_url(location) {
            let reader = HttpRangeReader::new(location.to_string())
                .await
                .map_err(|e| OpenError::Remote(e.to_string()))?;
            Arc::new(reader)
        } else {
            Arc::new(LocalFileReader::new(Path::new(location)).map_err(OpenError::from_io)?)
        };
        Self::from_reader(reader, location).await
    }

    /// Index an archive from an already opened source.
    pub async fn from_reader(reader: Arc<dyn ReadAt>, source: &str) -> Result<Self, OpenError> {
        let parser = ZipParser::new(Arc::clone(&reader));
        let records = parser.list_files().await.map_err(|e| match e.downcast::<io::Error>() {
            // a short source is a truncated archive, not an I/O failure
            Ok(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                OpenError::InvalidArchive(io.to_string())
            }
            Ok(io) => OpenError::from_io(io),
            Err(other) => OpenError::InvalidArchive(other.to_string()),
        })?;

        let mut members = HashMap::with_capacity(records.len());
        let mut dirs = HashSet::new();
        for record in records {
            let path = normalize_member_name(&record.file_name);
            if path.is_empty() {
                continue;
            }
            for parent in parent_dirs(&path) {
                dirs.insert(parent.to_string());
            }
            if record.is_directory {
                dirs.insert(path);
                continue;
            }

            let entry = Entry {
                path: path.clone(),
                logical_size: record.uncompressed_size,
                stored_size: record.compressed_size,
                mod_time: record.modified(),
                precompressed: !record.is_encrypted
                    && record.compression_method == CompressionMethod::Deflate,
                fingerprint: record.fingerprint(),
            };
            members.insert(path, Member { entry, record });
        }

        tracing::debug!(
            source,
            files = members.len(),
            dirs = dirs.len(),
            "indexed archive"
        );

        Ok(Self {
            source: source.to_string(),
            reader: RwLock::new(Some(reader)),
            members,
            dirs,
        })
    }

    fn open_stream(&self, entry: &Entry, span: ByteSpan, decode: bool) -> io::Result<ByteStream> {
        let reader = self
            .reader
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| io::Error::other("archive is closed"))?;
        let record = self
            .members
            .get(&entry.path)
            .map(|m| m.record.clone())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        if record.is_encrypted {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("encrypted member {}", record.file_name),
            ));
        }

        let inflate = match (decode, record.compression_method) {
            (false, _) | (true, CompressionMethod::Stored) => false,
            (true, CompressionMethod::Deflate) => true,
            (true, CompressionMethod::Unknown(method)) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported compression method {method}"),
                ));
            }
        };

        let stream = futures::stream::once(async move {
            let parser = ZipParser::new(reader);
            let offset = parser
                .get_data_offset(&record)
                .await
                .map_err(into_io_error)?;
            let reader = Arc::clone(parser.reader());
            Ok::<_, io::Error>(if inflate {
                inflate_span(reader, offset, record.compressed_size, span)
            } else {
                copy_span(reader, offset + span.start, span.len)
            })
        })
        .try_flatten();
        Ok(stream.boxed())
    }
}

impl ArchiveStore for ZipArchive {
    fn lookup(&self, path: &str) -> Lookup {
        if let Some(member) = self.members.get(path) {
            return Lookup::File(member.entry.clone());
        }
        if path.is_empty() || self.dirs.contains(path) {
            return Lookup::Directory;
        }
        Lookup::Missing
    }

    fn stored_bytes(&self, entry: &Entry, span: ByteSpan) -> io::Result<ByteStream> {
        self.open_stream(entry, span, false)
    }

    fn logical_bytes(&self, entry: &Entry, span: ByteSpan) -> io::Result<ByteStream> {
        self.open_stream(entry, span, true)
    }

    fn close(&self) {
        // Dropping the last reader reference closes the file or HTTP client.
        self.reader
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn source(&self) -> &str {
        &self.source
    }
}

/// Member names use `/`; some writers emit `\` or `./` prefixes.
fn normalize_member_name(name: &str) -> String {
    name.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
