//! Encoder: TensorRecord → header chunk + data chunk
//!
//! Header chunk dirakit di stack buffer lalu ditulis sekali jalan.
//! Validasi input selesai sebelum byte pertama ditulis.

use std::io::{self, Cursor, Write};

use super::error::EncodeError;
use super::format::{
    alignment, fixed_field, header_payload_len, DType, CHUNK_PREFIX_SIZE, MAGIC, MAX_DIMENSIONS,
    MAX_HEADER_CHUNK, MAX_INFO_LEN, PADDING,
};
use super::tensor::{Scalar, TensorData, TensorRecord};

/// Menulis tensor record ke output stream
///
/// Tidak ada buffering internal; bungkus writer dengan `BufWriter` untuk
/// stream yang mahal per syscall.
pub struct Encoder<W: Write> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
        }
    }

    /// Encode `data` dengan `shape` dan info tag (maksimal 8 bytes)
    pub fn encode(
        &mut self,
        data: &TensorData,
        shape: &[usize],
        info: impl AsRef<[u8]>,
    ) -> Result<(), EncodeError> {
        let info = info.as_ref();
        validate(shape, info)?;

        self.write_header(data.dtype(), shape, info)
            .map_err(EncodeError::Header)?;
        self.write_data_chunk(data.byte_len(), |w| data.write_le(w))
            .map_err(EncodeError::Data)
    }

    /// Sama dengan `encode`, tanpa harus punya `Vec` sendiri
    pub fn encode_slice<T: Scalar>(
        &mut self,
        data: &[T],
        shape: &[usize],
        info: impl AsRef<[u8]>,
    ) -> Result<(), EncodeError> {
        let info = info.as_ref();
        validate(shape, info)?;

        self.write_header(T::DTYPE, shape, info)
            .map_err(EncodeError::Header)?;
        self.write_data_chunk(std::mem::size_of_val(data), |w| T::write_le(data, w))
            .map_err(EncodeError::Data)
    }

    #[inline]
    pub fn encode_record(&mut self, record: &TensorRecord) -> Result<(), EncodeError> {
        self.encode(&record.data, &record.shape, &record.info)
    }

    /// Encode payload yang sudah little-endian apa adanya
    ///
    /// Dipakai untuk forward record dari view (mmap/buffer) tanpa decode ulang.
    /// `tag` dicocokkan pada 2 byte pertama.
    pub fn encode_raw(
        &mut self,
        tag: &[u8],
        payload: &[u8],
        shape: &[usize],
        info: impl AsRef<[u8]>,
    ) -> Result<(), EncodeError> {
        let dtype = DType::from_tag(tag).ok_or_else(|| {
            let mut code = [0u8; 2];
            let n = tag.len().min(2);
            code[..n].copy_from_slice(&tag[..n]);
            EncodeError::UnsupportedType(code)
        })?;

        let info = info.as_ref();
        validate(shape, info)?;

        self.write_header(dtype, shape, info)
            .map_err(EncodeError::Header)?;
        self.write_data_chunk(payload.len(), |w| w.write_all(payload))
            .map_err(EncodeError::Data)
    }

    /// Total bytes yang sudah ditulis encoder ini
    #[inline(always)]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self, dtype: DType, shape: &[usize], info: &[u8]) -> io::Result<()> {
        let payload_len = header_payload_len(shape.len());
        let chunk_len = CHUNK_PREFIX_SIZE + payload_len + alignment(payload_len as u64);

        // Buffer sudah nol, padding tidak perlu ditulis eksplisit
        let mut buf = [0u8; MAX_HEADER_CHUNK];
        {
            let mut cursor = Cursor::new(&mut buf[..]);
            cursor.write_all(&MAGIC)?;
            cursor.write_all(&(payload_len as i64).to_le_bytes())?;
            cursor.write_all(&fixed_field(&dtype.tag()))?;
            cursor.write_all(&fixed_field(info))?;
            cursor.write_all(&(shape.len() as i64).to_le_bytes())?;
            for &dim in shape {
                // Sudah dicek `validate`, muat di i64
                cursor.write_all(&(dim as i64).to_le_bytes())?;
            }
        }

        self.writer.write_all(&buf[..chunk_len])?;
        self.bytes_written += chunk_len as u64;
        Ok(())
    }

    fn write_data_chunk<F>(&mut self, payload_len: usize, write_payload: F) -> io::Result<()>
    where
        F: FnOnce(&mut W) -> io::Result<()>,
    {
        let len = payload_len as u64;

        let mut prefix = [0u8; CHUNK_PREFIX_SIZE];
        prefix[..8].copy_from_slice(&MAGIC);
        prefix[8..].copy_from_slice(&(len as i64).to_le_bytes());
        self.writer.write_all(&prefix)?;

        write_payload(&mut self.writer)?;

        let pad = alignment(len);
        self.writer.write_all(&PADDING[..pad])?;

        self.bytes_written += (CHUNK_PREFIX_SIZE + payload_len + pad) as u64;
        Ok(())
    }
}

/// Constraint input encoder, dicek sebelum menulis apa pun
fn validate(shape: &[usize], info: &[u8]) -> Result<(), EncodeError> {
    if shape.len() > MAX_DIMENSIONS {
        return Err(EncodeError::TooManyDimensions(shape.len()));
    }
    if info.len() > MAX_INFO_LEN {
        return Err(EncodeError::InfoTooLong(info.len()));
    }
    if let Some(&dim) = shape.iter().find(|&&dim| i64::try_from(dim).is_err()) {
        return Err(EncodeError::DimensionTooLarge(dim));
    }
    Ok(())
}
