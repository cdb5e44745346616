//! Chunk Framing: Konstanta & Helper
//!
//! Layout satu chunk:
//! ┌─────────────────────────────────────────────────────┐
//! │ magic "~TenBin~" (8 bytes)                          │
//! ├─────────────────────────────────────────────────────┤
//! │ length (i64 little-endian)                          │
//! ├─────────────────────────────────────────────────────┤
//! │ payload (`length` bytes)                            │
//! ├─────────────────────────────────────────────────────┤
//! │ zero padding sampai kelipatan 64 dari `length`      │
//! └─────────────────────────────────────────────────────┘
//!
//! Satu record = header chunk + data chunk.

use std::fmt;

/// Magic number di depan setiap chunk
pub const MAGIC: [u8; 8] = *b"~TenBin~";

/// Payload + padding selalu kelipatan 64 bytes
pub const CHUNK_ALIGN: usize = 64;

/// Lebar setiap field fixed-size di header
pub const FIELD_SIZE: usize = 8;

/// Magic + length
pub const CHUNK_PREFIX_SIZE: usize = 2 * FIELD_SIZE;

/// Encoder menolak shape dengan 10 dimensi atau lebih
pub const MAX_DIMENSIONS: usize = 9;

/// Info tag disimpan sebagai field 8 bytes
pub const MAX_INFO_LEN: usize = FIELD_SIZE;

/// Header chunk terbesar yang bisa ditulis encoder (prefix + payload + padding)
pub const MAX_HEADER_CHUNK: usize =
    CHUNK_PREFIX_SIZE + align_up(header_payload_len(MAX_DIMENSIONS));

/// Zero bytes untuk padding, dipakai ulang di setiap write
pub static PADDING: [u8; CHUNK_ALIGN] = [0u8; CHUNK_ALIGN];

/// Jumlah padding bytes setelah payload sepanjang `len`
///
/// Dihitung dari nilai length, bukan dari offset absolut di stream.
#[inline(always)]
pub fn alignment(len: u64) -> usize {
    (len.wrapping_neg() & (CHUNK_ALIGN as u64 - 1)) as usize
}

#[inline(always)]
const fn align_up(len: usize) -> usize {
    (len + CHUNK_ALIGN - 1) & !(CHUNK_ALIGN - 1)
}

/// Ukuran payload header chunk: dtype, info, ndim, lalu satu field per dimensi
#[inline(always)]
pub const fn header_payload_len(ndim: usize) -> usize {
    FIELD_SIZE * (3 + ndim)
}

/// Zero-pad bytes ke field 8 bytes. Input lebih panjang dari 8 dipotong.
#[inline]
pub fn fixed_field(bytes: &[u8]) -> [u8; FIELD_SIZE] {
    let mut field = [0u8; FIELD_SIZE];
    let n = bytes.len().min(FIELD_SIZE);
    field[..n].copy_from_slice(&bytes[..n]);
    field
}

/// Buang NUL di ujung kanan saja
#[inline]
pub fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Tipe scalar yang didukung format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl DType {
    pub const ALL: [DType; 10] = [
        DType::F32,
        DType::F64,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
    ];

    /// Kode 2 karakter di wire
    #[inline(always)]
    pub const fn tag(self) -> [u8; 2] {
        match self {
            DType::F32 => *b"f4",
            DType::F64 => *b"f8",
            DType::I8 => *b"i1",
            DType::I16 => *b"i2",
            DType::I32 => *b"i4",
            DType::I64 => *b"i8",
            DType::U8 => *b"u1",
            DType::U16 => *b"u2",
            DType::U32 => *b"u4",
            DType::U64 => *b"u8",
        }
    }

    /// Match hanya 2 byte pertama; sisa field diabaikan
    #[inline]
    pub fn from_tag(field: &[u8]) -> Option<Self> {
        let code = field.get(..2)?;
        Some(match code {
            b"f4" => DType::F32,
            b"f8" => DType::F64,
            b"i1" => DType::I8,
            b"i2" => DType::I16,
            b"i4" => DType::I32,
            b"i8" => DType::I64,
            b"u1" => DType::U8,
            b"u2" => DType::U16,
            b"u4" => DType::U32,
            b"u8" => DType::U64,
            _ => return None,
        })
    }

    /// Lebar satu elemen dalam bytes
    #[inline(always)]
    pub const fn size(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        write!(f, "{}{}", tag[0] as char, tag[1] as char)
    }
}
