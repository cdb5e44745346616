//! Tensor Record: array bertipe + shape + info tag
//!
//! `TensorData` adalah sum type untuk 10 tipe scalar. Dispatch dilakukan
//! dengan `match` tertutup di sisi encode (variant → tag) dan decode
//! (tag → variant).

use std::io::{self, Write};

use super::format::DType;

mod sealed {
    pub trait Sealed {}
}

/// Tipe scalar yang bisa disimpan di data chunk
///
/// Di-seal: hanya 10 tipe primitif di format yang mengimplementasikan.
pub trait Scalar:
    sealed::Sealed + bytemuck::Pod + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    const DTYPE: DType;

    /// Decode little-endian bytes. Sisa bytes yang tidak genap satu elemen dibuang.
    fn collect_le(bytes: &[u8]) -> Vec<Self>;

    /// Tulis values sebagai little-endian, tightly packed
    fn write_le<W: Write + ?Sized>(values: &[Self], w: &mut W) -> io::Result<()>;

    fn into_data(values: Vec<Self>) -> TensorData;

    fn from_data(data: &TensorData) -> Option<&[Self]>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl Scalar for $ty {
            const DTYPE: DType = DType::$variant;

            #[inline]
            fn collect_le(bytes: &[u8]) -> Vec<Self> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let whole = &bytes[..bytes.len() - bytes.len() % WIDTH];

                if cfg!(target_endian = "little") {
                    // Copy ke Vec yang aligned, source boleh unaligned
                    bytemuck::pod_collect_to_vec(whole)
                } else {
                    whole
                        .chunks_exact(WIDTH)
                        .map(|chunk| {
                            let mut raw = [0u8; WIDTH];
                            raw.copy_from_slice(chunk);
                            <$ty>::from_le_bytes(raw)
                        })
                        .collect()
                }
            }

            #[inline]
            fn write_le<W: Write + ?Sized>(values: &[Self], w: &mut W) -> io::Result<()> {
                if cfg!(target_endian = "little") {
                    return w.write_all(bytemuck::cast_slice(values));
                }
                for value in values {
                    w.write_all(&value.to_le_bytes())?;
                }
                Ok(())
            }

            #[inline(always)]
            fn into_data(values: Vec<Self>) -> TensorData {
                TensorData::$variant(values)
            }

            #[inline(always)]
            fn from_data(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }
    )*};
}

impl_scalar! {
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

/// Array scalar dengan tipe yang diketahui saat runtime
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

/// Jalankan `$body` dengan `$values` terikat ke Vec di dalam variant
macro_rules! with_values {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            TensorData::F32($values) => $body,
            TensorData::F64($values) => $body,
            TensorData::I8($values) => $body,
            TensorData::I16($values) => $body,
            TensorData::I32($values) => $body,
            TensorData::I64($values) => $body,
            TensorData::U8($values) => $body,
            TensorData::U16($values) => $body,
            TensorData::U32($values) => $body,
            TensorData::U64($values) => $body,
        }
    };
}

impl TensorData {
    #[inline]
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
            TensorData::I8(_) => DType::I8,
            TensorData::I16(_) => DType::I16,
            TensorData::I32(_) => DType::I32,
            TensorData::I64(_) => DType::I64,
            TensorData::U8(_) => DType::U8,
            TensorData::U16(_) => DType::U16,
            TensorData::U32(_) => DType::U32,
            TensorData::U64(_) => DType::U64,
        }
    }

    /// Jumlah elemen
    #[inline]
    pub fn len(&self) -> usize {
        with_values!(self, values => values.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ukuran payload data chunk
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.len() * self.dtype().size()
    }

    /// Decode payload data chunk sesuai dtype dari header
    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Self {
        match dtype {
            DType::F32 => TensorData::F32(f32::collect_le(bytes)),
            DType::F64 => TensorData::F64(f64::collect_le(bytes)),
            DType::I8 => TensorData::I8(i8::collect_le(bytes)),
            DType::I16 => TensorData::I16(i16::collect_le(bytes)),
            DType::I32 => TensorData::I32(i32::collect_le(bytes)),
            DType::I64 => TensorData::I64(i64::collect_le(bytes)),
            DType::U8 => TensorData::U8(u8::collect_le(bytes)),
            DType::U16 => TensorData::U16(u16::collect_le(bytes)),
            DType::U32 => TensorData::U32(u32::collect_le(bytes)),
            DType::U64 => TensorData::U64(u64::collect_le(bytes)),
        }
    }

    /// Borrow sebagai `&[T]`, `None` kalau tipenya beda
    #[inline]
    pub fn as_slice<T: Scalar>(&self) -> Option<&[T]> {
        T::from_data(self)
    }

    pub(crate) fn write_le<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        with_values!(self, values => Scalar::write_le(values.as_slice(), w))
    }
}

impl<T: Scalar> From<Vec<T>> for TensorData {
    fn from(values: Vec<T>) -> Self {
        T::into_data(values)
    }
}

/// Satu record lengkap (header chunk + data chunk)
#[derive(Debug, Clone, PartialEq)]
pub struct TensorRecord {
    pub data: TensorData,
    pub shape: Vec<usize>,
    /// Info tag tanpa trailing NUL, maksimal 8 bytes
    pub info: Vec<u8>,
}

impl TensorRecord {
    pub fn new(
        data: impl Into<TensorData>,
        shape: impl Into<Vec<usize>>,
        info: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            data: data.into(),
            shape: shape.into(),
            info: info.as_ref().to_vec(),
        }
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Info tag sebagai UTF-8, kalau valid
    pub fn info_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.info).ok()
    }

    /// Product dari shape. Tidak dicocokkan dengan jumlah elemen data.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}
