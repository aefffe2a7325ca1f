use super::{ByteSource, CHUNK_SIZE};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Chunked reader over any async byte stream (local files, stdin, pipes)
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl ReaderSource<tokio::fs::File> {
    /// Open a local file for streaming
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(file))
    }
}

impl ReaderSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for ReaderSource<R> {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(self.chunk_size);
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf.freeze()))
    }
}
