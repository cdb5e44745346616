//! Protocol Layer: TenBin Chunk Format
//!
//! Prinsip desain:
//! - Fixed little-endian, semua field 8 bytes
//! - Setiap chunk (length + padding) kelipatan 64 bytes
//! - Encoder dan decoder tidak berbagi state, hanya helper di `format`
//! - Tidak ada logging di sini; semua error lewat return value

mod decoder;
mod encoder;
mod error;
mod format;
mod tensor;
mod view;

pub use decoder::{Decoder, Records};
pub use encoder::Encoder;
pub use error::{ChunkKind, DecodeError, EncodeError};
pub use format::{
    alignment, DType, CHUNK_ALIGN, MAGIC, MAX_DIMENSIONS, MAX_HEADER_CHUNK, MAX_INFO_LEN,
};
pub use tensor::{Scalar, TensorData, TensorRecord};
pub use view::{RecordView, SliceDecoder};
