//! Windowed sinc lookup table
//!
//! The table covers the positive half of the sinc window with
//! `window_interp` entries per input sample. Lookups take a Q12.20
//! position and interpolate linearly between neighbouring entries.

use std::f64::consts::PI;

use tracing::debug;

use crate::audio::fixed::{Fixed, FRACT_BIT_COUNT};
use crate::error::ResamplerError;

/// Precomputed half-window of `sin(pi t) / (pi t)` tapered by a Hamming window
pub struct SincTable {
    table: Vec<f32>,
    interp_bits: u32,
}

impl SincTable {
    /// Build a table of `window_len * window_interp + 2` entries.
    ///
    /// `window_len` must be non-zero and `window_interp` a power of two.
    pub fn new(window_len: usize, window_interp: usize) -> Result<Self, ResamplerError> {
        if window_len == 0 {
            return Err(ResamplerError::ZeroWindow);
        }
        if !window_interp.is_power_of_two() || window_interp > (1 << FRACT_BIT_COUNT) {
            return Err(ResamplerError::InterpNotPowerOfTwo(window_interp));
        }

        let size = window_len * window_interp + 2;
        let mut table = vec![0.0f32; size];

        let sinc_step = 1.0 / window_interp as f64;
        let mut sinc_t = sinc_step;

        table[0] = 1.0;
        for (i, entry) in table.iter_mut().enumerate().skip(1) {
            let window =
                0.54 - 0.46 * (2.0 * PI * ((i - 1) as f64 / 2.0 / size as f64 + 0.5)).cos();
            *entry = ((PI * sinc_t).sin() / PI / sinc_t * window) as f32;
            sinc_t += sinc_step;
        }
        table[size - 2] = 0.0;
        table[size - 1] = 0.0;

        debug!(
            "sinc table: built: window_len={} window_interp={} size={}",
            window_len, window_interp, size
        );

        Ok(Self {
            table,
            interp_bits: window_interp.trailing_zeros(),
        })
    }

    /// log2 of the interpolation factor
    pub fn interp_bits(&self) -> u32 {
        self.interp_bits
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Raw table entry
    pub fn get(&self, index: usize) -> Option<f32> {
        self.table.get(index).copied()
    }

    /// Sinc value at position `x` (in input samples).
    ///
    /// Only the integer part of the table index changes while walking a
    /// window, so the interpolation fraction `fract_x` is passed in
    /// precomputed. Positions past the end of the window read as zero.
    #[inline]
    pub fn lookup(&self, x: Fixed, fract_x: f32, scaling: f32) -> f32 {
        let index = x.shr(FRACT_BIT_COUNT - self.interp_bits) as usize;

        let (hl, hh) = match (self.table.get(index), self.table.get(index + 1)) {
            (Some(&hl), Some(&hh)) => (hl, hh),
            _ => return 0.0,
        };

        let result = hl + fract_x * (hh - hl);

        if scaling > 1.0 {
            result / scaling
        } else {
            result
        }
    }
}
