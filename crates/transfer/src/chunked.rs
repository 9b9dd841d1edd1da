use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::TransferError;
use crate::types::Chunk;

/// Number of chunks needed to cover `file_size` bytes.
///
/// A zero-byte file has zero chunks.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> Result<u32, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize(chunk_size));
    }
    u32::try_from(file_size.div_ceil(chunk_size))
        .map_err(|_| TransferError::TooManyChunks { file_size })
}

/// Checks that every index the service asked for exists in the file.
pub fn validate_chunk_list(list: &[u32], count: u32) -> Result<(), TransferError> {
    match list.iter().find(|&&i| i == 0 || i > count) {
        Some(&index) => Err(TransferError::ChunkOutOfRange { index, count }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// ChunkRange
// ---------------------------------------------------------------------------

/// Byte range covered by a 1-based chunk index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: u32,
    pub offset: u64,
    pub len: u64,
}

impl ChunkRange {
    /// Computes the range of chunk `index`. The last chunk may be short.
    pub fn for_index(index: u32, chunk_size: u64, file_size: u64) -> Result<Self, TransferError> {
        let count = chunk_count(file_size, chunk_size)?;
        if index == 0 || index > count {
            return Err(TransferError::ChunkOutOfRange { index, count });
        }
        let offset = u64::from(index - 1) * chunk_size;
        let len = chunk_size.min(file_size - offset);
        Ok(Self { index, offset, len })
    }
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads chunks of a package file by index at explicit positions.
///
/// Holds a single file handle; reads are serialized through it, so the
/// reader can be shared between upload workers.
pub struct ChunkReader {
    file: Mutex<std::fs::File>,
    file_size: u64,
    chunk_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading with the negotiated `chunk_size`.
    ///
    /// An empty file has nothing to upload and is rejected.
    pub fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize(chunk_size));
        }
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 {
            return Err(TransferError::EmptyFile(path.to_path_buf()));
        }
        Ok(Self {
            file: Mutex::new(file),
            file_size,
            chunk_size,
        })
    }

    /// Reads the chunk at 1-based `index`.
    pub fn read_chunk(&self, index: u32) -> Result<Chunk, TransferError> {
        let range = ChunkRange::for_index(index, self.chunk_size, self.file_size)?;
        let mut data = vec![0u8; range.len as usize];
        {
            let mut file = self.file.lock().unwrap();
            file.seek(SeekFrom::Start(range.offset))?;
            file.read_exact(&mut data)?;
        }
        tracing::trace!(index, offset = range.offset, len = range.len, "read chunk");
        Ok(Chunk {
            index,
            offset: range.offset,
            data,
        })
    }

    /// Total chunks in the file.
    pub fn chunk_count(&self) -> u32 {
        // `open` rejected a zero chunk size; only overflow can fail here.
        chunk_count(self.file_size, self.chunk_size).unwrap_or(u32::MAX)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}
