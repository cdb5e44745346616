//! Decoder: input stream → TensorRecord
//!
//! Baca satu field fixed-size per langkah, tanpa backtracking.
//! Setiap call `decode` maju tepat satu record (header + data chunk).

use std::io::{self, Read};

use super::error::{ChunkKind, DecodeError};
use super::format::{alignment, trim_nul, DType, CHUNK_ALIGN, FIELD_SIZE, MAGIC};
use super::tensor::{TensorData, TensorRecord};

/// Batas alokasi awal payload; sisanya tumbuh sesuai bytes yang benar-benar diterima
const PAYLOAD_PREALLOC_LIMIT: u64 = 1 << 20;

/// Kapasitas awal shape, ndim dari stream tidak dipercaya untuk alokasi
const SHAPE_PREALLOC_LIMIT: usize = 16;

/// Membaca tensor record dari input stream
pub struct Decoder<R: Read> {
    reader: R,
    scratch: [u8; CHUNK_ALIGN],
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            scratch: [0u8; CHUNK_ALIGN],
        }
    }

    /// Decode record berikutnya
    ///
    /// Stream yang habis tepat di batas record menghasilkan
    /// `DecodeError::EndOfStream`; habis di tengah record menghasilkan
    /// `DecodeError::Io` dengan kind `UnexpectedEof`.
    pub fn decode(&mut self) -> Result<TensorRecord, DecodeError> {
        self.try_decode()?.ok_or(DecodeError::EndOfStream)
    }

    /// Seperti `decode`, tapi akhir stream yang bersih menjadi `Ok(None)`
    pub fn try_decode(&mut self) -> Result<Option<TensorRecord>, DecodeError> {
        // Header chunk
        let mut magic = [0u8; FIELD_SIZE];
        if !self.read_record_start(&mut magic)? {
            return Ok(None);
        }
        check_magic(&magic, ChunkKind::Header)?;
        let header_len = self.read_length(ChunkKind::Header)?;

        let dtype_field = self.read_field()?;
        let info_field = self.read_field()?;

        let ndim = self.read_i64()?;
        if ndim < 0 {
            return Err(DecodeError::NegativeDimensions(ndim));
        }
        let ndim = to_usize(ndim)?;

        let mut shape = Vec::with_capacity(ndim.min(SHAPE_PREALLOC_LIMIT));
        for _ in 0..ndim {
            let dim = self.read_i64()?;
            if dim < 0 {
                return Err(DecodeError::NegativeDimensions(dim));
            }
            shape.push(to_usize(dim)?);
        }

        // Padding dihitung dari length yang dideklarasikan, bukan dari field yang dibaca
        self.skip_padding(header_len)?;

        // Data chunk
        self.reader.read_exact(&mut magic)?;
        check_magic(&magic, ChunkKind::Data)?;
        let data_len = self.read_length(ChunkKind::Data)?;

        let dtype = DType::from_tag(&dtype_field)
            .ok_or(DecodeError::UnsupportedType([dtype_field[0], dtype_field[1]]))?;

        let payload = self.read_payload(data_len)?;
        let data = TensorData::from_le_bytes(dtype, &payload);

        self.skip_padding(data_len)?;

        Ok(Some(TensorRecord {
            data,
            shape,
            info: trim_nul(&info_field).to_vec(),
        }))
    }

    /// Iterator sampai akhir stream; berhenti setelah error pertama
    pub fn records(&mut self) -> Records<'_, R> {
        Records {
            decoder: self,
            done: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Baca magic pertama record. `false` kalau stream habis sebelum byte pertama.
    fn read_record_start(&mut self, buf: &mut [u8; FIELD_SIZE]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    #[inline]
    fn read_field(&mut self) -> io::Result<[u8; FIELD_SIZE]> {
        let mut field = [0u8; FIELD_SIZE];
        self.reader.read_exact(&mut field)?;
        Ok(field)
    }

    #[inline]
    fn read_i64(&mut self) -> io::Result<i64> {
        self.read_field().map(i64::from_le_bytes)
    }

    fn read_length(&mut self, chunk: ChunkKind) -> Result<u64, DecodeError> {
        let length = self.read_i64()?;
        if length < 0 {
            return Err(DecodeError::NegativeLength { chunk, length });
        }
        Ok(length as u64)
    }

    fn read_payload(&mut self, len: u64) -> Result<Vec<u8>, DecodeError> {
        to_usize(len as i64)?;

        let mut payload = Vec::with_capacity(len.min(PAYLOAD_PREALLOC_LIMIT) as usize);
        (&mut self.reader).take(len).read_to_end(&mut payload)?;
        if (payload.len() as u64) < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(payload)
    }

    /// Lewati padding tanpa validasi isinya
    #[inline]
    fn skip_padding(&mut self, len: u64) -> io::Result<()> {
        let pad = alignment(len);
        self.reader.read_exact(&mut self.scratch[..pad])
    }
}

#[inline]
fn check_magic(magic: &[u8; FIELD_SIZE], chunk: ChunkKind) -> Result<(), DecodeError> {
    if *magic != MAGIC {
        return Err(DecodeError::MagicMismatch { chunk });
    }
    Ok(())
}

#[inline]
pub(crate) fn to_usize(value: i64) -> Result<usize, DecodeError> {
    usize::try_from(value).map_err(|_| DecodeError::LengthOverflow(value))
}

/// Iterator record dari `Decoder::records`
pub struct Records<'a, R: Read> {
    decoder: &'a mut Decoder<R>,
    done: bool,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<TensorRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.try_decode() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Encoder;
    use std::io::Cursor;

    fn encode(record: &TensorRecord) -> Vec<u8> {
        let mut encoder = Encoder::new(Vec::new());
        encoder.encode_record(record).unwrap();
        encoder.into_inner()
    }

    /// Chunk manual: magic + length + payload + padding
    fn chunk(payload: &[u8]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&(payload.len() as i64).to_le_bytes());
        out.extend_from_slice(payload);
        out.resize(out.len() + alignment(payload.len() as u64), 0);
        out
    }

    fn header_payload(tag: &[u8; 8], info: &[u8; 8], dims: &[i64]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(info);
        out.extend_from_slice(&(dims.len() as i64).to_le_bytes());
        for dim in dims {
            out.extend_from_slice(&dim.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_float32_then_end_of_stream() {
        let record = TensorRecord::new(vec![1.0f32, 2.0, 3.0, 4.0], vec![2, 2], "demo");
        let bytes = encode(&record);
        let total = bytes.len() as u64;

        let mut decoder = Decoder::new(Cursor::new(bytes));
        let decoded = decoder.decode().unwrap();
        assert_eq!(decoded.dtype(), DType::F32);
        assert_eq!(decoded.shape, vec![2, 2]);
        assert_eq!(decoded.info_str(), Some("demo"));
        assert_eq!(
            decoded.data.as_slice::<f32>(),
            Some(&[1.0, 2.0, 3.0, 4.0][..])
        );
        assert_eq!(decoder.get_ref().position(), total);

        assert!(decoder.decode().unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_decode_int8() {
        let values: Vec<i8> = (-64..64).collect();
        let record = TensorRecord::new(values.clone(), vec![128], "");
        let mut decoder = Decoder::new(Cursor::new(encode(&record)));

        let decoded = decoder.decode().unwrap();
        assert_eq!(decoded.data.as_slice::<i8>(), Some(&values[..]));
        assert!(decoded.info.is_empty());
        assert!(decoder.try_decode().unwrap().is_none());
    }

    #[test]
    fn test_invalid_magic() {
        let bytes = [0x54, 0x65, 0x6e, 0x42, 0x69, 0x6e, 0x7e, 0x24];
        let mut decoder = Decoder::new(&bytes[..]);
        let err = decoder.decode().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MagicMismatch {
                chunk: ChunkKind::Header
            }
        ));
    }

    #[test]
    fn test_corrupt_data_magic_stops_reading() {
        let record = TensorRecord::new(vec![9u32; 3], vec![3], "m");
        let mut bytes = encode(&record);
        // Header chunk shape [3]: 16 + 32 + 32
        let data_at = 80;
        bytes[data_at + 3] ^= 0xff;

        let mut decoder = Decoder::new(Cursor::new(bytes));
        let err = decoder.decode().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MagicMismatch {
                chunk: ChunkKind::Data
            }
        ));
        assert_eq!(decoder.get_ref().position(), (data_at + 8) as u64);
    }

    #[test]
    fn test_negative_length() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&(-8i64).to_le_bytes());
        let err = Decoder::new(&bytes[..]).decode().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NegativeLength {
                chunk: ChunkKind::Header,
                length: -8
            }
        ));
    }

    #[test]
    fn test_negative_data_length() {
        let mut bytes = encode(&TensorRecord::new(vec![1u16; 3], vec![3], ""));
        // Shape [3]: data chunk mulai di offset 80
        bytes[88..96].copy_from_slice(&(-5i64).to_le_bytes());

        let mut decoder = Decoder::new(Cursor::new(bytes));
        let err = decoder.decode().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NegativeLength {
                chunk: ChunkKind::Data,
                length: -5
            }
        ));
        // Berhenti tepat setelah field length
        assert_eq!(decoder.get_ref().position(), 96);
    }

    #[test]
    fn test_negative_dimensions() {
        // Jumlah dimensi negatif
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&24i64.to_le_bytes());
        bytes.extend_from_slice(b"f4\0\0\0\0\0\0");
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&(-1i64).to_le_bytes());
        let err = Decoder::new(&bytes[..]).decode().unwrap_err();
        assert!(matches!(err, DecodeError::NegativeDimensions(-1)));

        // Nilai dimensi negatif
        let bytes = chunk(&header_payload(b"f4\0\0\0\0\0\0", &[0; 8], &[2, -3]));
        let err = Decoder::new(&bytes[..]).decode().unwrap_err();
        assert!(matches!(err, DecodeError::NegativeDimensions(-3)));
    }

    #[test]
    fn test_unsupported_type() {
        let mut bytes = chunk(&header_payload(b"c8\0\0\0\0\0\0", &[0; 8], &[1]));
        bytes.extend(chunk(&[0u8; 8]));
        let err = Decoder::new(&bytes[..]).decode().unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedType(code) if &code == b"c8"));
    }

    #[test]
    fn test_type_tag_matches_first_two_bytes() {
        let mut bytes = chunk(&header_payload(b"u2junk!!", b"name\0\0\0\0", &[2]));
        bytes.extend(chunk(&[1, 0, 2, 0]));
        let record = Decoder::new(&bytes[..]).decode().unwrap();
        assert_eq!(record.data.as_slice::<u16>(), Some(&[1, 2][..]));
        assert_eq!(record.info, b"name");
    }

    #[test]
    fn test_truncated_record() {
        let record = TensorRecord::new(vec![1.0f64; 4], vec![4], "t");
        let bytes = encode(&record);

        for cut in [4, 8, 20, 80, 100, bytes.len() - 1] {
            let err = Decoder::new(&bytes[..cut]).decode().unwrap_err();
            assert!(err.is_truncated(), "cut at {cut}: {err:?}");
        }
    }

    #[test]
    fn test_shape_not_cross_checked() {
        // Shape [1] sebagai placeholder untuk data besar
        let record = TensorRecord::new(vec![0.5f32; 100], vec![1], "");
        let decoded = Decoder::new(&encode(&record)[..]).decode().unwrap();
        assert_eq!(decoded.shape, vec![1]);
        assert_eq!(decoded.data.len(), 100);
    }

    #[test]
    fn test_odd_payload_length_keeps_framing() {
        // 5 bytes payload untuk u16: 2 elemen, 1 byte sisa dibuang
        let mut bytes = chunk(&header_payload(b"u2\0\0\0\0\0\0", &[0; 8], &[2]));
        bytes.extend(chunk(&[1, 0, 2, 0, 9]));
        bytes.extend(encode(&TensorRecord::new(vec![7u8], vec![1], "next")));

        let mut decoder = Decoder::new(&bytes[..]);
        let first = decoder.decode().unwrap();
        assert_eq!(first.data.as_slice::<u16>(), Some(&[1, 2][..]));
        let second = decoder.decode().unwrap();
        assert_eq!(second.info_str(), Some("next"));
    }

    #[test]
    fn test_info_keeps_leading_nul() {
        let mut bytes = chunk(&header_payload(b"i1\0\0\0\0\0\0", b"\0ab\0\0\0\0\0", &[0]));
        bytes.extend(chunk(&[]));
        let record = Decoder::new(&bytes[..]).decode().unwrap();
        assert_eq!(record.info, b"\0ab");
        assert!(record.data.is_empty());
    }

    #[test]
    fn test_records_iterator() {
        let mut bytes = Vec::new();
        for i in 0..3u64 {
            bytes.extend(encode(&TensorRecord::new(vec![i; 2], vec![2], "")));
        }
        let mut decoder = Decoder::new(&bytes[..]);
        let decoded: Vec<_> = decoder.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[2].data.as_slice::<u64>(), Some(&[2, 2][..]));

        let zeros = [0u8; 16];
        let mut garbage = Decoder::new(&zeros[..]);
        let mut records = garbage.records();
        assert!(matches!(records.next(), Some(Err(_))));
        assert!(records.next().is_none());
    }
}
