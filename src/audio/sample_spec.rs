//! Sample rate and channel layout description

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bit mask of enabled channels (bit 0 = left/mono, bit 1 = right, ...)
pub type ChannelMask = u32;

pub const CHANNEL_MASK_MONO: ChannelMask = 0x1;
pub const CHANNEL_MASK_STEREO: ChannelMask = 0x3;

/// Describes interleaved sample buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    sample_rate: u32,
    channel_mask: ChannelMask,
}

impl SampleSpec {
    pub fn new(sample_rate: u32, channel_mask: ChannelMask) -> Self {
        Self {
            sample_rate,
            channel_mask,
        }
    }

    pub fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, CHANNEL_MASK_MONO)
    }

    pub fn stereo(sample_rate: u32) -> Self {
        Self::new(sample_rate, CHANNEL_MASK_STEREO)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.channel_mask
    }

    pub fn num_channels(&self) -> usize {
        self.channel_mask.count_ones() as usize
    }

    /// Both rate and at least one channel are set
    pub fn is_valid(&self) -> bool {
        self.sample_rate != 0 && self.channel_mask != 0
    }

    /// Number of per-channel samples in an interleaved buffer of `n_samples`
    pub fn samples_per_channel(&self, n_samples: usize) -> usize {
        n_samples / self.num_channels().max(1)
    }

    /// Duration of `n_samples` interleaved samples in microseconds
    pub fn duration_us(&self, n_samples: usize) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples_per_channel(n_samples) as u64 * 1_000_000) / self.sample_rate as u64
    }
}

impl fmt::Display for SampleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<rate={} channels={} mask={:#x}>",
            self.sample_rate,
            self.num_channels(),
            self.channel_mask
        )
    }
}
