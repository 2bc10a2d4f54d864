//! Forward error correction
//!
//! The [`BlockWriter`] splits the packet stream into blocks and drives a
//! [`BlockEncoder`] to produce repair packets for each block.

pub mod block_writer;
pub mod encoder;
pub mod parity;

pub use block_writer::{BlockWriter, BlockWriterConfig};
pub use encoder::BlockEncoder;
pub use parity::{ParityEncoder, DEFAULT_MAX_BLOCK_LENGTH};
