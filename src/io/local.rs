use super::ReadAt;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Local file reader with random access support
pub struct LocalFileReader {
    file: Arc<std::fs::File>,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let meta = file.metadata()?;
        if meta.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "archive path is a directory",
            ));
        }
        Ok(Self {
            file: Arc::new(file),
            size: meta.len(),
        })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // Positional reads keep the handle shareable between concurrent requests;
        // they run on the blocking pool so a slow disk never stalls the runtime.
        let file = Arc::clone(&self.file);
        let len = buf.len();
        let chunk = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut chunk = vec![0u8; len];
            let n = pread(&file, offset, &mut chunk)?;
            chunk.truncate(n);
            Ok(chunk)
        })
        .await??;

        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(unix)]
fn pread(file: &std::fs::File, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &std::fs::File, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
