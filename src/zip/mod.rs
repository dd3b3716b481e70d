//! ZIP archive indexing and member streaming.
//!
//! - [`structures`]: on-disk records (EOCD, ZIP64 records, member metadata)
//! - [`parser`]: reads those records through a [`ReadAt`](crate::io::ReadAt) source
//! - `inflate`: stored and deflated member data as byte streams
//! - [`archive`]: [`ZipArchive`], the [`ArchiveStore`](crate::store::ArchiveStore) over a ZIP file
//!
//! Supported: ZIP64, archive comments, STORED and DEFLATE members, extended
//! timestamps. Not supported: encryption, multi-disk archives, other
//! compression methods (such members are listed but fail to decode).

pub mod archive;
mod inflate;
pub mod parser;
pub mod structures;

pub use archive::ZipArchive;
pub use parser::ZipParser;
pub use structures::*;
