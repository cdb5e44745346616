//! Connection: transfer tensor record lewat TCP
//!
//! Blocking I/O, satu owner per stream. Tidak ada retry; error apa pun
//! dikembalikan ke caller yang memutuskan untuk reconnect atau tidak.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, trace};

use crate::protocol::{
    DecodeError, Decoder, EncodeError, Encoder, RecordView, Scalar, TensorRecord,
};

/// Buffer sizes - tensor biasanya jauh lebih besar dari pesan kecil
const READ_BUFFER_SIZE: usize = 1024 * 1024; // 1MB
const WRITE_BUFFER_SIZE: usize = 1024 * 1024; // 1MB

/// SO_SNDBUF / SO_RCVBUF yang diminta ke kernel
#[cfg(unix)]
const SOCKET_BUFFER_SIZE: libc::c_int = 4 * 1024 * 1024; // 4MB

/// Stream tensor record di atas TCP
pub struct TensorStream {
    encoder: Encoder<BufWriter<TcpStream>>,
    decoder: Decoder<BufReader<TcpStream>>,
    peer: SocketAddr,
    records_sent: u64,
    records_received: u64,
}

impl TensorStream {
    /// Connect ke peer
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    /// Wrap TcpStream yang sudah terhubung (misalnya hasil `accept`)
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        // Disable Nagle's algorithm untuk lower latency
        stream.set_nodelay(true)?;
        tune_socket_buffers(&stream);

        let peer = stream.peer_addr()?;
        let reader = stream.try_clone()?;

        debug!(%peer, "tensor stream ready");

        Ok(Self {
            encoder: Encoder::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, stream)),
            decoder: Decoder::new(BufReader::with_capacity(READ_BUFFER_SIZE, reader)),
            peer,
            records_sent: 0,
            records_received: 0,
        })
    }

    /// Kirim satu record dan flush
    ///
    /// Error flush selalu berlabel data chunk, lihat `finish_send`.
    pub fn send(&mut self, record: &TensorRecord) -> Result<(), EncodeError> {
        self.encoder.encode_record(record)?;
        self.finish_send()
    }

    pub fn send_slice<T: Scalar>(
        &mut self,
        data: &[T],
        shape: &[usize],
        info: impl AsRef<[u8]>,
    ) -> Result<(), EncodeError> {
        self.encoder.encode_slice(data, shape, info)?;
        self.finish_send()
    }

    /// Forward record dari view (mmap) tanpa decode ulang
    pub fn send_view(&mut self, view: &RecordView<'_>) -> Result<(), EncodeError> {
        self.encoder
            .encode_raw(&view.dtype.tag(), view.data, &view.shape, view.info)?;
        self.finish_send()
    }

    /// Terima record berikutnya; `Ok(None)` kalau peer menutup stream di batas record
    pub fn recv(&mut self) -> Result<Option<TensorRecord>, DecodeError> {
        let record = self.decoder.try_decode()?;
        if let Some(ref record) = record {
            self.records_received += 1;
            trace!(
                peer = %self.peer,
                dtype = %record.dtype(),
                elements = record.data.len(),
                "record received"
            );
        }
        Ok(record)
    }

    /// Tutup arah tulis; peer melihat akhir stream yang bersih
    pub fn shutdown_write(&mut self) -> io::Result<()> {
        self.encoder.get_mut().flush()?;
        self.encoder
            .get_ref()
            .get_ref()
            .shutdown(std::net::Shutdown::Write)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    #[inline(always)]
    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    #[inline(always)]
    pub fn records_received(&self) -> u64 {
        self.records_received
    }

    #[inline(always)]
    pub fn bytes_sent(&self) -> u64 {
        self.encoder.bytes_written()
    }

    /// Flush `BufWriter` ke socket
    ///
    /// Header dan data chunk bisa masih sama-sama di buffer, jadi flush yang
    /// gagal dilaporkan sebagai `EncodeError::Data` walaupun byte yang gagal
    /// bisa saja milik header. Phase di sini hanya perkiraan.
    fn finish_send(&mut self) -> Result<(), EncodeError> {
        self.encoder.get_mut().flush().map_err(EncodeError::Data)?;
        self.records_sent += 1;
        Ok(())
    }
}

/// Perbesar socket buffer untuk throughput tensor besar
///
/// Ignore errors - not all platforms support this
#[cfg(unix)]
fn tune_socket_buffers(stream: &TcpStream) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let optval = SOCKET_BUFFER_SIZE;
    for opt in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        // SAFETY: fd valid selama `stream` hidup, optval menunjuk c_int di stack
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                &optval as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            trace!(opt, "setsockopt failed: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(not(unix))]
fn tune_socket_buffers(_stream: &TcpStream) {}
