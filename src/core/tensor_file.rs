//! Memory-Mapped Tensor File (`.ten`)
//!
//! File di-mmap read-only, record dibaca langsung dari page cache:
//! - Zero-copy read: `RecordView` meminjam slice dari mmap
//! - Kernel-managed paging: file lebih besar dari RAM tetap bisa di-scan
//! - Writer biasa (buffered) untuk membuat file

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::{debug, info};

use crate::protocol::{DecodeError, EncodeError, Encoder, Scalar, SliceDecoder, TensorRecord};

/// Buffer writer, cukup untuk beberapa record kecil sekaligus
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Read-only view ke file tensor
pub struct TensorFile {
    mmap: Option<Mmap>,
    path: PathBuf,
}

impl TensorFile {
    /// Membuka dan mmap file
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        // File kosong tidak bisa di-mmap di semua platform
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: File dibuka read-only. Isi mmap bisa berubah kalau proses lain
            // menulis file yang sama; itu kontrak standar untuk file data read-only.
            Some(unsafe { MmapOptions::new().map(&file)? })
        };

        debug!(path = %path.display(), bytes = len, "mapped tensor file");

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Isi file apa adanya (zero-copy)
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterator record zero-copy
    pub fn views(&self) -> SliceDecoder<'_> {
        SliceDecoder::new(self.as_bytes())
    }

    /// Decode semua record menjadi owned `TensorRecord`
    pub fn read_all(&self) -> Result<Vec<TensorRecord>, DecodeError> {
        self.views()
            .map(|view| view.map(|v| v.to_record()))
            .collect()
    }
}

/// Writer untuk membuat file tensor
pub struct TensorFileWriter {
    encoder: Encoder<BufWriter<File>>,
    records: usize,
    path: PathBuf,
}

impl TensorFileWriter {
    /// Membuat file baru (truncate kalau sudah ada)
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            encoder: Encoder::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            records: 0,
            path: path.to_path_buf(),
        })
    }

    pub fn append(&mut self, record: &TensorRecord) -> Result<(), EncodeError> {
        self.encoder.encode_record(record)?;
        self.records += 1;
        Ok(())
    }

    pub fn append_slice<T: Scalar>(
        &mut self,
        data: &[T],
        shape: &[usize],
        info: impl AsRef<[u8]>,
    ) -> Result<(), EncodeError> {
        self.encoder.encode_slice(data, shape, info)?;
        self.records += 1;
        Ok(())
    }

    /// Forward payload yang sudah little-endian (misalnya dari `RecordView`)
    pub fn append_raw(
        &mut self,
        tag: &[u8],
        payload: &[u8],
        shape: &[usize],
        info: impl AsRef<[u8]>,
    ) -> Result<(), EncodeError> {
        self.encoder.encode_raw(tag, payload, shape, info)?;
        self.records += 1;
        Ok(())
    }

    #[inline(always)]
    pub fn records_written(&self) -> usize {
        self.records
    }

    #[inline(always)]
    pub fn bytes_written(&self) -> u64 {
        self.encoder.bytes_written()
    }

    /// Flush buffer dan fsync. Returns jumlah record.
    pub fn finish(self) -> io::Result<usize> {
        let bytes = self.encoder.bytes_written();
        let file = self
            .encoder
            .into_inner()
            .into_inner()
            .map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(
            path = %self.path.display(),
            records = self.records,
            bytes,
            "tensor file written"
        );
        Ok(self.records)
    }
}
