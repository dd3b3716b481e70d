mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use anyhow::{Result, bail};
use async_trait::async_trait;

/// Trait for random access reading from an archive source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer, failing if the source ends first
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..]).await?;
            if n == 0 {
                bail!(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
            }
            filled += n;
        }
        Ok(())
    }
}

/// Convert a reader error back into an `io::Error`, keeping the original kind when there is one.
pub fn into_io_error(err: anyhow::Error) -> std::io::Error {
    match err.downcast::<std::io::Error>() {
        Ok(io) => io,
        Err(other) => std::io::Error::other(other),
    }
}

/// True when `location` names a remote archive rather than a local file.
pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
