//! Byte streams over member data.
//!
//! Stored data is read straight from the requested offset. Deflated data is
//! inflated incrementally: the compressed run is fetched in chunks and decoded
//! with a raw (headerless) inflater, discarding output before the requested
//! span and stopping once the span is complete.

use bytes::Bytes;
use flate2::{Decompress, FlushDecompress, Status};
use futures::StreamExt;
use std::io;
use std::sync::Arc;

use crate::io::{ReadAt, into_io_error};
use crate::store::{ByteSpan, ByteStream};

const CHUNK_SIZE: usize = 64 * 1024;

/// Stream `len` bytes of the source starting at `offset`.
pub(crate) fn copy_span(reader: Arc<dyn ReadAt>, offset: u64, len: u64) -> ByteStream {
    futures::stream::try_unfold(
        (reader, offset, len),
        |(reader, pos, remaining)| async move {
            if remaining == 0 {
                return Ok::<_, io::Error>(None);
            }
            let n = remaining.min(CHUNK_SIZE as u64) as usize;
            let mut buf = vec![0u8; n];
            reader
                .read_exact_at(pos, &mut buf)
                .await
                .map_err(into_io_error)?;
            Ok(Some((
                Bytes::from(buf),
                (reader, pos + n as u64, remaining - n as u64),
            )))
        },
    )
    .boxed()
}

/// Stream `span` of the output of the raw deflate data at `offset..offset + compressed_len`.
pub(crate) fn inflate_span(
    reader: Arc<dyn ReadAt>,
    offset: u64,
    compressed_len: u64,
    span: ByteSpan,
) -> ByteStream {
    let inflater = Inflater {
        reader,
        next_in: offset,
        end_in: offset + compressed_len,
        input: Vec::new(),
        consumed: 0,
        decompress: Decompress::new(false),
        skip: span.start,
        remaining: span.len,
    };
    futures::stream::try_unfold(inflater, |mut inflater| async move {
        Ok::<_, io::Error>(inflater.next_chunk().await?.map(|chunk| (chunk, inflater)))
    })
    .boxed()
}

struct Inflater {
    reader: Arc<dyn ReadAt>,
    next_in: u64,
    end_in: u64,
    input: Vec<u8>,
    consumed: usize,
    decompress: Decompress,
    skip: u64,
    remaining: u64,
}

impl Inflater {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let mut out = vec![0u8; CHUNK_SIZE];

        while self.remaining > 0 {
            if self.consumed == self.input.len() && self.next_in < self.end_in {
                let n = (self.end_in - self.next_in).min(CHUNK_SIZE as u64) as usize;
                self.input.resize(n, 0);
                self.reader
                    .read_exact_at(self.next_in, &mut self.input)
                    .await
                    .map_err(into_io_error)?;
                self.next_in += n as u64;
                self.consumed = 0;
            }

            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            let status = self
                .decompress
                .decompress(&self.input[self.consumed..], &mut out, FlushDecompress::None)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let read = (self.decompress.total_in() - before_in) as usize;
            let produced = (self.decompress.total_out() - before_out) as usize;
            self.consumed += read;

            if produced == 0 {
                let exhausted = self.consumed == self.input.len() && self.next_in >= self.end_in;
                if status == Status::StreamEnd || (read == 0 && exhausted) {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "deflate data ended before the expected length",
                    ));
                }
                if read == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "deflate data made no progress",
                    ));
                }
                continue;
            }

            let mut chunk = &out[..produced];
            if self.skip > 0 {
                let skipped = self.skip.min(chunk.len() as u64) as usize;
                chunk = &chunk[skipped..];
                self.skip -= skipped as u64;
            }
            if chunk.is_empty() {
                continue;
            }

            let take = self.remaining.min(chunk.len() as u64) as usize;
            self.remaining -= take as u64;
            return Ok(Some(Bytes::copy_from_slice(&chunk[..take])));
        }

        Ok(None)
    }
}
