//! Block encoder interface

use crate::error::FecError;

/// Computes repair symbols for one block of equally sized source symbols.
///
/// A block goes through `begin_block`, one `set_buffer` per source symbol,
/// `fill_buffers` and `end_block`. Source symbols are only borrowed for the
/// duration of `set_buffer`, so an encoder that needs them at fill time keeps
/// its own copy. Repair symbols are written straight into the repair packet
/// payloads handed to `fill_buffers`.
pub trait BlockEncoder: Send {
    /// Result of encoder construction
    fn init_status(&self) -> Result<(), FecError>;

    /// Maximum number of source plus repair symbols per block
    fn max_block_length(&self) -> usize;

    /// Required alignment of symbol buffers, in bytes
    fn buffer_alignment(&self) -> usize;

    /// Start a block of `sblen` source and `rblen` repair symbols of
    /// `payload_size` bytes each. Returns false if the sizes are not supported.
    fn begin_block(&mut self, sblen: usize, rblen: usize, payload_size: usize) -> bool;

    /// Hand over source symbol `index`
    fn set_buffer(&mut self, index: usize, data: &[u8]);

    /// Compute repair symbols into `repair`, one slot per repair symbol.
    ///
    /// Slots are `None` for repair packets that could not be allocated; the
    /// encoder skips them.
    fn fill_buffers(&mut self, repair: &mut [Option<&mut [u8]>]);

    fn end_block(&mut self);
}
