//! # zipserve
//!
//! Serve static content straight out of a ZIP archive, without extracting it.
//!
//! The archive may live on the local filesystem or behind an HTTP server that
//! honours Range requests. Its central directory is indexed once at mount
//! time; member data is read on demand.
//!
//! ## Features
//!
//! - Conditional requests (`If-None-Match`, `If-Modified-Since`, `If-Range`)
//! - Single byte ranges over the decompressed content
//! - Raw deflate pass-through to clients that accept `Content-Encoding: deflate`
//! - Directory index pages, canonicalizing redirects and extension probing
//! - Hot replacement of the mounted archive; in-flight responses finish on
//!   the archive they started with, which is closed once the last one ends
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipserve::{FileServer, MountRegistry, ServeConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(MountRegistry::new());
//!     registry.mount("site.zip").await?;
//!
//!     let app = FileServer::new(registry, ServeConfig::default()).into_router();
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod mount;
pub mod serve;
pub mod store;
pub mod zip;

pub use cli::Args;
pub use config::{ErrorHook, ServeConfig};
pub use error::{OpenError, ServeError};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt};
pub use mount::{ArchiveHandle, MountRegistry};
pub use serve::FileServer;
pub use store::{ArchiveStore, ByteSpan, Entry, Lookup, MemoryArchive};
pub use zip::{ZipArchive, ZipFileEntry};
