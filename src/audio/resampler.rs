//! Windowed sinc resampler
//!
//! Retimes interleaved audio by an arbitrary scaling factor. The input is
//! presented as three consecutive frames (previous, current, next) and the
//! output is computed around a fixed-point phase that walks through the
//! current frame. When the phase leaves the current frame the caller shifts
//! the window by one frame and calls [`Resampler::renew_buffers`] again.
//!
//! ```text
//!   prev frame          cur frame           next frame
//! [..........|]   [.........^..........]   [|..........]
//!        <--- half window ---|--- half window --->
//!                         qt_sample
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::audio::fixed::Fixed;
use crate::audio::sample_spec::SampleSpec;
use crate::audio::sinc::SincTable;
use crate::error::ResamplerError;

/// Relative cutoff frequency of the low-pass filter
const CUTOFF_FREQ: f32 = 0.9;

/// Quality presets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplerProfile {
    Low,
    #[default]
    Medium,
    High,
}

impl ResamplerProfile {
    /// Half window length in input samples
    pub fn window_size(self) -> usize {
        match self {
            Self::Low => 16,
            Self::Medium => 32,
            Self::High => 64,
        }
    }

    /// Sinc table entries per input sample
    pub fn window_interp(self) -> usize {
        match self {
            Self::Low => 64,
            Self::Medium => 128,
            Self::High => 512,
        }
    }

    /// Name used in config files and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Resampler tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResamplerConfig {
    /// Half window length in input samples
    pub window_size: usize,
    /// Sinc table entries per input sample (power of two)
    pub window_interp: usize,
    /// Total samples per input frame, across all channels
    pub frame_size: usize,
}

impl ResamplerConfig {
    /// Derive a config from a profile, sizing frames so that the window
    /// fits with margin for the nominal rate ratio.
    ///
    /// Frames never shrink below the unscaled half window, so upsampling
    /// configs still accept a scaling of 1.0.
    pub fn from_profile(profile: ResamplerProfile, in_spec: &SampleSpec, out_spec: &SampleSpec) -> Self {
        let window_size = profile.window_size();
        let scaling = if out_spec.sample_rate() == 0 {
            1.0
        } else {
            in_spec.sample_rate() as f32 / out_spec.sample_rate() as f32 * 1.5
        };
        let min_frame_size_ch = (window_size as f32 / CUTOFF_FREQ).ceil() as usize + 2;
        let frame_size_ch = ((window_size as f32 * scaling).ceil() as usize).max(min_frame_size_ch);

        Self {
            window_size,
            window_interp: profile.window_interp(),
            frame_size: frame_size_ch * in_spec.num_channels(),
        }
    }
}

/// Fixed-point sinc resampler core
pub struct Resampler {
    channels: usize,
    frame_size: usize,
    channel_len: usize,
    window_len: usize,

    sinc: SincTable,
    scaling: f32,

    qt_frame_size: Fixed,
    qt_half_window_len: Fixed,
    qt_sinc_step: Fixed,
    qt_sample: Fixed,
    qt_dt: Fixed,

    out_pos: usize,
}

impl Resampler {
    /// Create a resampler for interleaved frames described by `spec`
    pub fn new(config: &ResamplerConfig, spec: &SampleSpec) -> Result<Self, ResamplerError> {
        let channels = spec.num_channels();
        if channels < 1 {
            error!("resampler: invalid num_channels: num_channels={}", channels);
            return Err(ResamplerError::InvalidChannels(channels));
        }

        let channel_len = config.frame_size / channels;
        if channel_len * channels != config.frame_size || channel_len == 0 {
            error!(
                "resampler: frame_size is not multiple of num_channels: frame_size={} num_channels={}",
                config.frame_size, channels
            );
            return Err(ResamplerError::FrameNotMultiple {
                frame_size: config.frame_size,
                channels,
            });
        }

        if config.window_size == 0 {
            error!("resampler: window_size can't be zero");
            return Err(ResamplerError::ZeroWindow);
        }

        let max_channel_len = (i32::MAX as u32 >> crate::audio::fixed::FRACT_BIT_COUNT) as usize;
        if channel_len > max_channel_len {
            error!(
                "resampler: frame_size is too much: frame_size={} num_channels={}",
                config.frame_size, channels
            );
            return Err(ResamplerError::FrameTooLarge {
                frame_size: config.frame_size,
                max: max_channel_len * channels,
            });
        }

        let sinc = SincTable::new(config.window_size, config.window_interp)?;

        let mut resampler = Self {
            channels,
            frame_size: config.frame_size,
            channel_len,
            window_len: config.window_size,
            sinc,
            scaling: 1.0,
            qt_frame_size: Fixed::from_usize(channel_len),
            qt_half_window_len: Fixed::ZERO,
            qt_sinc_step: Fixed::ZERO,
            qt_sample: Fixed::ZERO,
            qt_dt: Fixed::ZERO,
            out_pos: 0,
        };
        resampler.set_scaling(1.0)?;

        debug!(
            "resampler: initializing: window_size={} window_interp={} frame_size={} channels={}",
            config.window_size, config.window_interp, config.frame_size, channels
        );

        Ok(resampler)
    }

    /// Change the number of input samples consumed per output sample.
    ///
    /// On failure the previous scaling stays in effect.
    pub fn set_scaling(&mut self, new_scaling: f32) -> Result<(), ResamplerError> {
        if !new_scaling.is_finite() || new_scaling <= 0.0 {
            error!("resampler: invalid scaling: scaling={}", new_scaling);
            return Err(ResamplerError::InvalidScaling(new_scaling));
        }

        if self.window_len as f32 * new_scaling >= self.channel_len as f32 {
            error!(
                "resampler: scaling does not fit frame size: window={} frame={} scaling={:.5}",
                self.window_len, self.frame_size, new_scaling
            );
            return Err(self.out_of_bounds(new_scaling));
        }

        // Downsampling moves the filter edge down along with the rate.
        let (sinc_step, half_window_len) = if new_scaling > 1.0 {
            (
                Fixed::from_f32(CUTOFF_FREQ / new_scaling),
                Fixed::from_f32(self.window_len as f32 / CUTOFF_FREQ * new_scaling),
            )
        } else {
            (
                Fixed::from_f32(CUTOFF_FREQ),
                Fixed::from_f32(self.window_len as f32 / CUTOFF_FREQ),
            )
        };

        let out_of_bounds = (self.qt_frame_size - half_window_len).ceil().to_usize() > self.channel_len
            || half_window_len.floor().to_usize() + 1 > self.channel_len;

        if out_of_bounds {
            error!(
                "resampler: scaling does not fit window size: window={} frame={} scaling={:.5}",
                self.window_len, self.frame_size, new_scaling
            );
            return Err(self.out_of_bounds(new_scaling));
        }

        self.qt_sinc_step = sinc_step;
        self.qt_half_window_len = half_window_len;
        self.qt_dt = Fixed::from_f32(new_scaling);
        self.scaling = new_scaling;

        Ok(())
    }

    /// Present the next three input frames.
    ///
    /// Each slice must hold exactly `frame_size` interleaved samples. The
    /// returned window borrows them until it is dropped.
    ///
    /// # Panics
    ///
    /// Panics on size mismatch or if the current scaling no longer fits the
    /// frame.
    pub fn renew_buffers<'a>(
        &'a mut self,
        prev: &'a [f32],
        cur: &'a [f32],
        next: &'a [f32],
    ) -> ResampleWindow<'a> {
        assert_eq!(prev.len(), self.frame_size, "resampler: unexpected prev frame size");
        assert_eq!(cur.len(), self.frame_size, "resampler: unexpected cur frame size");
        assert_eq!(next.len(), self.frame_size, "resampler: unexpected next frame size");

        self.advance_window();

        ResampleWindow {
            resampler: self,
            prev,
            cur,
            next,
        }
    }

    /// Input samples consumed per output sample
    pub fn scaling(&self) -> f32 {
        self.scaling
    }

    /// Current position inside the current frame
    pub fn phase(&self) -> Fixed {
        self.qt_sample
    }

    /// Interleaved samples per input frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples per channel in one input frame
    pub fn channel_len(&self) -> usize {
        self.channel_len
    }

    pub fn num_channels(&self) -> usize {
        self.channels
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Input samples (all channels) still ahead of the phase in the
    /// current and next frames
    pub fn n_left_to_process(&self) -> f32 {
        (self.qt_frame_size + self.qt_frame_size - self.qt_sample).to_f32() * self.channels as f32
    }

    /// Shift the window by one frame, keeping the fractional phase.
    pub(crate) fn advance_window(&mut self) {
        assert!(
            (self.window_len as f32 * self.scaling) < self.channel_len as f32,
            "resampler: scaling does not fit frame: window={} channel_len={} scaling={}",
            self.window_len,
            self.channel_len,
            self.scaling
        );

        if self.qt_sample >= self.qt_frame_size {
            self.qt_sample -= self.qt_frame_size;
        }
    }

    /// Write output samples starting at `*pos` until `out` is full (true)
    /// or the phase leaves the current frame (false).
    pub(crate) fn fill(
        &mut self,
        prev: &[f32],
        cur: &[f32],
        next: &[f32],
        out: &mut [f32],
        pos: &mut usize,
    ) -> bool {
        while *pos + self.channels <= out.len() {
            self.qt_sample = self.qt_sample.snapped();

            if self.qt_sample >= self.qt_frame_size {
                return false;
            }

            for channel in 0..self.channels {
                out[*pos + channel] = self.resample_(prev, cur, next, channel);
            }

            self.qt_sample += self.qt_dt;
            *pos += self.channels;
        }

        true
    }

    fn out_of_bounds(&self, scaling: f32) -> ResamplerError {
        ResamplerError::ScalingOutOfBounds {
            scaling,
            window: self.window_len,
            channel_len: self.channel_len,
        }
    }

    fn resample_(&self, prev: &[f32], cur: &[f32], next: &[f32], channel: usize) -> f32 {
        let n = self.channels;
        let at = |i: usize| i * n + channel;

        let s = self.qt_sample;
        let h = self.qt_half_window_len;
        let w = self.qt_frame_size;
        let len = self.channel_len;
        let step = self.qt_sinc_step;
        let bits = self.sinc.interp_bits();

        let ind_end_prev = at(len);
        let ind_begin_prev = if s >= h {
            at(len)
        } else {
            at((s + (w - h)).ceil().to_usize())
        };

        let ind_begin_cur = if s >= h { at((s - h).ceil().to_usize()) } else { at(0) };

        let (ind_end_cur, ind_end_next) = if s + h >= w {
            (at(len - 1), at((s + h - w).floor().to_usize() + 1))
        } else {
            (at((s + h).floor().to_usize()), at(0))
        };

        // Distance from the first sample of the window to the phase, in
        // sinc table units. The table only covers the positive half, so the
        // position decreases up to the phase and increases after it.
        let mut qt_sinc_cur = (w + s - (w + s - h).ceil()).mul(step);
        let mut fract = qt_sinc_cur.shl(bits).fract_f32();

        let mut acc = 0.0f32;

        let mut i = ind_begin_prev;
        while i < ind_end_prev {
            acc += prev[i] * self.sinc.lookup(qt_sinc_cur, fract, self.scaling);
            qt_sinc_cur -= step;
            i += n;
        }

        i = ind_begin_cur;
        acc += cur[i] * self.sinc.lookup(qt_sinc_cur, fract, self.scaling);
        while qt_sinc_cur >= step {
            i += n;
            qt_sinc_cur -= step;
            acc += cur[i] * self.sinc.lookup(qt_sinc_cur, fract, self.scaling);
        }
        i += n;

        // Crossing the phase: -x becomes 1 - x.
        qt_sinc_cur = step - qt_sinc_cur;
        fract = qt_sinc_cur.shl(bits).fract_f32();

        while i <= ind_end_cur {
            acc += cur[i] * self.sinc.lookup(qt_sinc_cur, fract, self.scaling);
            qt_sinc_cur += step;
            i += n;
        }

        i = at(0);
        while i < ind_end_next {
            acc += next[i] * self.sinc.lookup(qt_sinc_cur, fract, self.scaling);
            qt_sinc_cur += step;
            i += n;
        }

        acc * CUTOFF_FREQ
    }
}

/// Three input frames bound to a resampler for one pass
pub struct ResampleWindow<'a> {
    resampler: &'a mut Resampler,
    prev: &'a [f32],
    cur: &'a [f32],
    next: &'a [f32],
}

impl ResampleWindow<'_> {
    /// Fill `out` with resampled interleaved samples.
    ///
    /// Returns `true` once `out` is complete. Returns `false` when more
    /// input is needed; the write position is kept, so the caller renews
    /// the buffers and passes the same `out` again to continue.
    pub fn resample_buff(&mut self, out: &mut [f32]) -> bool {
        assert_eq!(
            out.len() % self.resampler.channels,
            0,
            "resampler: output size is not multiple of num_channels"
        );

        let mut pos = self.resampler.out_pos;
        let complete = self.resampler.fill(self.prev, self.cur, self.next, out, &mut pos);
        self.resampler.out_pos = if complete { 0 } else { pos };

        complete
    }

    pub fn resampler(&self) -> &Resampler {
        self.resampler
    }
}
