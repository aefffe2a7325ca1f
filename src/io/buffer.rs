use super::ByteSource;
use async_trait::async_trait;
use bytes::Bytes;

/// In-memory data, handed out as a single chunk
pub struct BufferSource {
    data: Option<Bytes>,
}

impl BufferSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

#[async_trait]
impl ByteSource for BufferSource {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        Ok(self.data.take().filter(|d| !d.is_empty()))
    }
}
