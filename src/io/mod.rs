mod buffer;
mod http;
mod local;

pub use buffer::BufferSource;
pub use http::HttpSource;
pub use local::ReaderSource;

use async_trait::async_trait;
use bytes::Bytes;

/// Size of the chunks pulled from readers that don't chunk on their own
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Trait for pull-based reading of a member's bytes
///
/// A source is drained at most once. Returning `Ok(None)` signals the end of the
/// data; dropping the source before that releases whatever it holds.
#[async_trait]
pub trait ByteSource: Send {
    /// Pull the next chunk of data, or `None` once the data is exhausted
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>>;
}

/// An empty source, used for directories and zero-length members
pub struct EmptySource;

#[async_trait]
impl ByteSource for EmptySource {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        Ok(None)
    }
}
