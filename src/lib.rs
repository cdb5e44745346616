//! TenBin - Binary Container Format untuk Numeric Tensor
//!
//! Arsitektur:
//! - Protocol: encoder/decoder chunk 64-byte aligned
//! - Zero-Copy: view langsung ke mmap file atau buffer
//! - Network: transfer record lewat TCP
//!
//! ```
//! use tenbin::protocol::{Decoder, Encoder};
//!
//! let mut encoder = Encoder::new(Vec::new());
//! encoder.encode_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], "demo").unwrap();
//!
//! let bytes = encoder.into_inner();
//! let record = Decoder::new(&bytes[..]).decode().unwrap();
//! assert_eq!(record.shape, vec![2, 2]);
//! assert_eq!(record.info_str(), Some("demo"));
//! ```

pub mod core;
pub mod network;
pub mod protocol;

pub use protocol::{DType, DecodeError, Decoder, EncodeError, Encoder, TensorData, TensorRecord};
