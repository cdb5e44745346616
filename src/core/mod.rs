//! Core module: Tensor file dengan mmap backing
//!
//! Prinsip desain:
//! - Zero-Copy: record dibaca langsung dari mmap, tidak ada copy ke user space
//! - Writer buffered: satu syscall per banyak record

mod tensor_file;

pub use tensor_file::{TensorFile, TensorFileWriter};
