//! XOR parity encoder
//!
//! Repair symbol `r` is the XOR of every source symbol whose index is
//! congruent to `r` modulo the repair block length. One lost source symbol per
//! residue class can be recovered. Used as a reference encoder and in the
//! demo sender.

use tracing::trace;

use crate::error::FecError;
use crate::fec::encoder::BlockEncoder;

/// Block length limit of [`ParityEncoder::default`]
pub const DEFAULT_MAX_BLOCK_LENGTH: usize = 256;

const BUFFER_ALIGNMENT: usize = 8;

/// XOR parity [`BlockEncoder`]
pub struct ParityEncoder {
    max_block_length: usize,
    sblen: usize,
    rblen: usize,
    payload_size: usize,
    /// Running XOR of each residue class, `rblen * payload_size` bytes
    repair: Vec<u8>,
    in_block: bool,
}

impl ParityEncoder {
    /// Encoder accepting blocks of up to `max_block_length` symbols.
    ///
    /// Lengths below 2 leave no room for a repair symbol and are reported by
    /// `init_status`.
    pub fn new(max_block_length: usize) -> Self {
        Self {
            max_block_length,
            sblen: 0,
            rblen: 0,
            payload_size: 0,
            repair: Vec::new(),
            in_block: false,
        }
    }

    fn repair_symbol_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.payload_size;
        &mut self.repair[start..start + self.payload_size]
    }
}

impl Default for ParityEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_LENGTH)
    }
}

impl BlockEncoder for ParityEncoder {
    fn init_status(&self) -> Result<(), FecError> {
        if self.max_block_length < 2 {
            return Err(FecError::EncoderInit(format!(
                "parity encoder: max block length too small: {}",
                self.max_block_length
            )));
        }
        Ok(())
    }

    fn max_block_length(&self) -> usize {
        self.max_block_length
    }

    fn buffer_alignment(&self) -> usize {
        BUFFER_ALIGNMENT
    }

    fn begin_block(&mut self, sblen: usize, rblen: usize, payload_size: usize) -> bool {
        if sblen == 0 || payload_size == 0 || sblen + rblen > self.max_block_length {
            return false;
        }

        trace!(
            "parity encoder: begin block: sblen={} rblen={} payload_size={}",
            sblen,
            rblen,
            payload_size
        );

        self.sblen = sblen;
        self.rblen = rblen;
        self.payload_size = payload_size;
        self.repair.clear();
        self.repair.resize(rblen * payload_size, 0);
        self.in_block = true;

        true
    }

    fn set_buffer(&mut self, index: usize, data: &[u8]) {
        assert!(self.in_block, "parity encoder: set_buffer outside of block");
        assert!(
            index < self.sblen,
            "parity encoder: source index out of bounds: index={} sblen={}",
            index,
            self.sblen
        );
        assert_eq!(
            data.len(),
            self.payload_size,
            "parity encoder: unexpected symbol size"
        );

        if self.rblen == 0 {
            return;
        }

        let symbol = self.repair_symbol_mut(index % self.rblen);
        for (dst, src) in symbol.iter_mut().zip(data) {
            *dst ^= src;
        }
    }

    fn fill_buffers(&mut self, repair: &mut [Option<&mut [u8]>]) {
        assert!(self.in_block, "parity encoder: fill_buffers outside of block");
        assert_eq!(
            repair.len(),
            self.rblen,
            "parity encoder: unexpected repair block length"
        );

        for (symbol, slot) in self.repair.chunks_exact(self.payload_size).zip(repair) {
            let Some(buffer) = slot else {
                continue;
            };
            assert_eq!(
                buffer.len(),
                self.payload_size,
                "parity encoder: unexpected repair symbol size"
            );
            buffer.copy_from_slice(symbol);
        }
    }

    fn end_block(&mut self) {
        self.in_block = false;
    }
}
