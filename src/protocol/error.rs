//! Error taxonomy untuk encode/decode
//!
//! Core tidak pernah recover: setiap error menghentikan call saat ini.

use std::fmt;
use std::io;

use thiserror::Error;

/// Chunk mana yang sedang diproses saat error terjadi
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Header,
    Data,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkKind::Header => f.write_str("header chunk"),
            ChunkKind::Data => f.write_str("data chunk"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported data type: {0:?}")]
    UnsupportedType([u8; 2]),

    #[error("too many dimensions: {0} (maximum is 9)")]
    TooManyDimensions(usize),

    #[error("info can not exceed 8 bytes (got {0})")]
    InfoTooLong(usize),

    #[error("dimension {0} does not fit in a signed 64-bit field")]
    DimensionTooLarge(usize),

    #[error("encoding chunk header: {0}")]
    Header(#[source] io::Error),

    #[error("encoding data chunk: {0}")]
    Data(#[source] io::Error),
}

impl EncodeError {
    /// Phase yang gagal, kalau error berasal dari stream
    pub fn chunk(&self) -> Option<ChunkKind> {
        match self {
            EncodeError::Header(_) => Some(ChunkKind::Header),
            EncodeError::Data(_) => Some(ChunkKind::Data),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("magic number mismatch in {chunk}")]
    MagicMismatch { chunk: ChunkKind },

    #[error("negative length {length} in {chunk}")]
    NegativeLength { chunk: ChunkKind, length: i64 },

    #[error("negative dimensions: {0}")]
    NegativeDimensions(i64),

    #[error("unsupported data type: {0:?}")]
    UnsupportedType([u8; 2]),

    #[error("value {0} does not fit in memory on this platform")]
    LengthOverflow(i64),

    /// Stream habis tepat di batas record
    #[error("end of stream")]
    EndOfStream,

    /// Short read di tengah record muncul sebagai `UnexpectedEof`
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DecodeError {
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DecodeError::EndOfStream)
    }

    /// Record terpotong: stream habis di tengah field
    #[inline]
    pub fn is_truncated(&self) -> bool {
        matches!(self, DecodeError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
