//! Zero-Copy View: decode record langsung dari byte slice
//!
//! Untuk buffer yang sudah ada di memory (mmap file, buffer hasil transfer).
//! Payload tidak di-copy; `RecordView` meminjam slice dari buffer asal.
//!
//! Alignment: header chunk selalu `16 + 64k` bytes, sehingga payload data
//! jatuh di offset `32 mod 64` dari awal record, cukup untuk tipe 8 bytes.

use std::io;

use super::decoder::to_usize;
use super::error::{ChunkKind, DecodeError};
use super::format::{alignment, trim_nul, DType, FIELD_SIZE, MAGIC};
use super::tensor::{Scalar, TensorData, TensorRecord};

/// Record yang dipinjam dari buffer
#[derive(Debug, Clone, PartialEq)]
pub struct RecordView<'a> {
    pub dtype: DType,
    pub shape: Vec<usize>,
    /// Info tag tanpa trailing NUL
    pub info: &'a [u8],
    /// Payload data chunk, tanpa padding
    pub data: &'a [u8],
    /// Offset awal record di buffer
    pub offset: usize,
    /// Total bytes record (dua chunk termasuk padding)
    pub len: usize,
}

impl<'a> RecordView<'a> {
    /// Jumlah elemen penuh di payload
    #[inline]
    pub fn element_count(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    pub fn info_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.info).ok()
    }

    /// Cast payload ke `&[T]` tanpa copy
    ///
    /// `None` kalau dtype beda, payload tidak aligned untuk `T`, atau host big-endian.
    pub fn as_slice<T: Scalar>(&self) -> Option<&'a [T]> {
        if T::DTYPE != self.dtype || !cfg!(target_endian = "little") {
            return None;
        }
        let width = self.dtype.size();
        let whole = &self.data[..self.data.len() - self.data.len() % width];
        bytemuck::try_cast_slice(whole).ok()
    }

    /// Copy ke `TensorRecord` yang owned
    pub fn to_record(&self) -> TensorRecord {
        TensorRecord {
            data: TensorData::from_le_bytes(self.dtype, self.data),
            shape: self.shape.clone(),
            info: self.info.to_vec(),
        }
    }
}

/// Decoder zero-copy di atas `&[u8]`
///
/// Posisi baca hanya maju kalau satu record lengkap berhasil di-decode.
pub struct SliceDecoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
    failed: bool,
}

impl<'a> SliceDecoder<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
            failed: false,
        }
    }

    /// Decode record berikutnya; `Ok(None)` kalau buffer habis tepat di batas record
    pub fn next_view(&mut self) -> Result<Option<RecordView<'a>>, DecodeError> {
        if self.read_pos == self.buffer.len() {
            return Ok(None);
        }

        let start = self.read_pos;
        let mut reader = SliceReader {
            buffer: self.buffer,
            pos: start,
        };

        // Header chunk
        check_magic(reader.bytes(FIELD_SIZE)?, ChunkKind::Header)?;
        let header_len = reader.length(ChunkKind::Header)?;
        let dtype_field = reader.bytes(FIELD_SIZE)?;
        let info_field = reader.bytes(FIELD_SIZE)?;

        let ndim = reader.i64()?;
        if ndim < 0 {
            return Err(DecodeError::NegativeDimensions(ndim));
        }
        let ndim = to_usize(ndim)?;

        // ndim tidak mungkin melebihi sisa buffer / 8
        let mut shape = Vec::with_capacity(ndim.min(reader.remaining() / FIELD_SIZE));
        for _ in 0..ndim {
            let dim = reader.i64()?;
            if dim < 0 {
                return Err(DecodeError::NegativeDimensions(dim));
            }
            shape.push(to_usize(dim)?);
        }
        reader.bytes(alignment(header_len))?;

        // Data chunk
        check_magic(reader.bytes(FIELD_SIZE)?, ChunkKind::Data)?;
        let data_len = reader.length(ChunkKind::Data)?;

        let dtype = DType::from_tag(dtype_field)
            .ok_or(DecodeError::UnsupportedType([dtype_field[0], dtype_field[1]]))?;

        let data = reader.bytes(to_usize(data_len as i64)?)?;
        reader.bytes(alignment(data_len))?;

        self.read_pos = reader.pos;

        Ok(Some(RecordView {
            dtype,
            shape,
            info: trim_nul(info_field),
            data,
            offset: start,
            len: reader.pos - start,
        }))
    }

    /// Offset record berikutnya
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.read_pos
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}

impl<'a> Iterator for SliceDecoder<'a> {
    type Item = Result<RecordView<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_view() {
            Ok(view) => view.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

struct SliceReader<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    #[inline]
    fn bytes(&mut self, n: usize) -> io::Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buffer.len())
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        let out = &self.buffer[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    #[inline]
    fn i64(&mut self) -> io::Result<i64> {
        let mut raw = [0u8; FIELD_SIZE];
        raw.copy_from_slice(self.bytes(FIELD_SIZE)?);
        Ok(i64::from_le_bytes(raw))
    }

    fn length(&mut self, chunk: ChunkKind) -> Result<u64, DecodeError> {
        let length = self.i64()?;
        if length < 0 {
            return Err(DecodeError::NegativeLength { chunk, length });
        }
        Ok(length as u64)
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }
}

#[inline]
fn check_magic(magic: &[u8], chunk: ChunkKind) -> Result<(), DecodeError> {
    if magic != MAGIC.as_slice() {
        return Err(DecodeError::MagicMismatch { chunk });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Decoder, Encoder};

    /// Encode lalu copy ke buffer yang 8-byte aligned
    fn encode_aligned(records: &[TensorRecord]) -> Vec<u64> {
        let mut encoder = Encoder::new(Vec::new());
        for record in records {
            encoder.encode_record(record).unwrap();
        }
        let bytes = encoder.into_inner();
        let mut words = vec![0u64; bytes.len() / 8];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words).copy_from_slice(&bytes);
        words
    }

    fn encode_bytes(record: &TensorRecord) -> Vec<u8> {
        let words = encode_aligned(std::slice::from_ref(record));
        bytemuck::cast_slice::<u64, u8>(&words).to_vec()
    }

    fn patch_i64(bytes: &mut [u8], at: usize, value: i64) {
        bytes[at..at + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Decode record pertama yang harus gagal; posisi tetap di awal
    fn view_error(bytes: &[u8]) -> DecodeError {
        let mut decoder = SliceDecoder::new(bytes);
        let err = decoder.next_view().unwrap_err();
        assert_eq!(decoder.position(), 0);
        assert!(decoder.next().is_some());
        err
    }

    #[test]
    fn test_view_matches_stream_decoder() {
        let records = vec![
            TensorRecord::new(vec![1.0f32, 2.0, 3.0, 4.0], vec![2, 2], "demo"),
            TensorRecord::new(vec![-1i64, 0, 1], vec![3], "ints"),
            TensorRecord::new(Vec::<u8>::new(), vec![0], ""),
        ];
        let words = encode_aligned(&records);
        let bytes: &[u8] = bytemuck::cast_slice(&words);

        let views: Vec<_> = SliceDecoder::new(bytes).collect::<Result<_, _>>().unwrap();
        let mut decoder = Decoder::new(bytes);
        for (view, record) in views.iter().zip(&records) {
            assert_eq!(&view.to_record(), record);
            assert_eq!(&decoder.decode().unwrap(), record);
        }
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].offset, 0);
        assert_eq!(views[1].offset, views[0].len);
        assert_eq!(views[2].offset + views[2].len, bytes.len());
    }

    #[test]
    fn test_zero_copy_slice() {
        let words = encode_aligned(&[TensorRecord::new(vec![0.25f64, 0.5], vec![2], "w")]);
        let bytes: &[u8] = bytemuck::cast_slice(&words);

        let view = SliceDecoder::new(bytes).next_view().unwrap().unwrap();
        let values = view.as_slice::<f64>().unwrap();
        assert_eq!(values, &[0.25, 0.5]);
        let first = values.as_ptr().cast::<u8>();
        assert!(std::ptr::eq(first, view.data.as_ptr()));
        assert!(view.as_slice::<u64>().is_none());
        assert_eq!(view.info_str(), Some("w"));
        assert_eq!(view.element_count(), 2);
    }

    #[test]
    fn test_position_unchanged_on_error() {
        let words = encode_aligned(&[TensorRecord::new(vec![1u16; 3], vec![3], "")]);
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        let truncated = &bytes[..bytes.len() - 10];

        let mut decoder = SliceDecoder::new(truncated);
        let err = decoder.next_view().unwrap_err();
        assert!(err.is_truncated());
        assert_eq!(decoder.position(), 0);
        assert_eq!(decoder.remaining(), truncated.len());
    }

    #[test]
    fn test_view_magic_mismatch() {
        let garbage = [0x54u8, 0x65, 0x6e, 0x42, 0x69, 0x6e, 0x7e, 0x24];
        let mut decoder = SliceDecoder::new(&garbage);
        assert!(matches!(
            decoder.next(),
            Some(Err(DecodeError::MagicMismatch {
                chunk: ChunkKind::Header
            }))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_empty_buffer() {
        let mut decoder = SliceDecoder::new(&[]);
        assert!(decoder.next_view().unwrap().is_none());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_view_negative_length() {
        // Shape [3]: header chunk 80 bytes, lalu data chunk
        let clean = encode_bytes(&TensorRecord::new(vec![1u16; 3], vec![3], "s"));

        let mut bytes = clean.clone();
        patch_i64(&mut bytes, 8, -1);
        assert!(matches!(
            view_error(&bytes),
            DecodeError::NegativeLength {
                chunk: ChunkKind::Header,
                length: -1
            }
        ));

        let mut bytes = clean;
        patch_i64(&mut bytes, 88, -5);
        assert!(matches!(
            view_error(&bytes),
            DecodeError::NegativeLength {
                chunk: ChunkKind::Data,
                length: -5
            }
        ));
    }

    #[test]
    fn test_view_negative_dimensions() {
        let clean = encode_bytes(&TensorRecord::new(vec![1i32; 4], vec![2, 2], ""));

        // Jumlah dimensi negatif
        let mut bytes = clean.clone();
        patch_i64(&mut bytes, 32, -1);
        assert!(matches!(view_error(&bytes), DecodeError::NegativeDimensions(-1)));

        // Nilai dimensi kedua negatif
        let mut bytes = clean;
        patch_i64(&mut bytes, 48, -2);
        assert!(matches!(view_error(&bytes), DecodeError::NegativeDimensions(-2)));
    }

    #[test]
    fn test_view_unsupported_type() {
        let mut bytes = encode_bytes(&TensorRecord::new(vec![0u8; 4], vec![4], ""));
        bytes[16..18].copy_from_slice(b"zz");
        let err = view_error(&bytes);
        assert!(matches!(err, DecodeError::UnsupportedType([b'z', b'z'])));
    }
}
