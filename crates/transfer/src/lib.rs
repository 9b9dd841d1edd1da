//! Chunked package transfer: chunk boundaries, positional reads and
//! per-session completion tracking.

mod chunked;
mod content_type;
mod progress;
mod types;

pub use chunked::{ChunkRange, ChunkReader, chunk_count, validate_chunk_list};
pub use content_type::content_type_for;
pub use progress::{ProgressTracker, UploadProgress};
pub use types::{Chunk, SessionStatus, UploadSession, UploadTarget};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    #[error("chunk {index} out of range (file has {count} chunks)")]
    ChunkOutOfRange { index: u32, count: u32 },

    #[error("file is empty: {0}")]
    EmptyFile(std::path::PathBuf),

    #[error("file of {file_size} bytes needs more chunks than supported")]
    TooManyChunks { file_size: u64 },
}
