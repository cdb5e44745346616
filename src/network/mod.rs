//! Network Layer: Tensor Transfer over TCP
//!
//! Blocking I/O dengan buffered reader/writer per koneksi.
//!
//! Fitur:
//! - TCP_NODELAY dan socket buffer besar untuk tensor berukuran MB
//! - Forward record langsung dari mmap view tanpa decode ulang
//! - Akhir stream yang bersih = peer selesai mengirim

mod connection;

pub use connection::TensorStream;
