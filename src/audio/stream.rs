//! Push/pop streaming front-end for the resampler
//!
//! Owns the three rolling input frames and rotates them as new input is
//! pushed, so callers deal with one frame at a time.

use tracing::{debug, error};

use crate::audio::resampler::{Resampler, ResamplerConfig, ResamplerProfile};
use crate::audio::sample_spec::SampleSpec;
use crate::error::ResamplerError;

/// Resampler with internally managed input frames
pub struct StreamResampler {
    resampler: Resampler,
    in_spec: SampleSpec,
    out_spec: SampleSpec,
    /// prev, cur, next
    frames: [Vec<f32>; 3],
    n_ready_frames: usize,
}

impl StreamResampler {
    /// Create a resampler converting `in_spec` to `out_spec`.
    ///
    /// # Panics
    ///
    /// Panics if the specs are incomplete or have different channel layouts.
    pub fn new(
        profile: ResamplerProfile,
        in_spec: SampleSpec,
        out_spec: SampleSpec,
    ) -> Result<Self, ResamplerError> {
        assert!(
            in_spec.is_valid() && out_spec.is_valid(),
            "stream resampler: required complete sample specs: in_spec={} out_spec={}",
            in_spec,
            out_spec
        );
        assert_eq!(
            in_spec.channel_mask(),
            out_spec.channel_mask(),
            "stream resampler: required identical channel sets"
        );

        let config = ResamplerConfig::from_profile(profile, &in_spec, &out_spec);
        let resampler = Resampler::new(&config, &in_spec)?;

        debug!(
            "stream resampler: initializing: profile={} in_spec={} out_spec={} frame_size={}",
            profile.as_str(),
            in_spec,
            out_spec,
            config.frame_size
        );

        let frame = vec![0.0f32; config.frame_size];

        let mut stream = Self {
            resampler,
            in_spec,
            out_spec,
            frames: [frame.clone(), frame.clone(), frame],
            n_ready_frames: 0,
        };
        stream.set_scaling(in_spec.sample_rate(), out_spec.sample_rate(), 1.0)?;

        Ok(stream)
    }

    /// Set scaling from the rate ratio and a clock-drift multiplier
    pub fn set_scaling(
        &mut self,
        input_sample_rate: u32,
        output_sample_rate: u32,
        multiplier: f32,
    ) -> Result<(), ResamplerError> {
        if input_sample_rate == 0 || output_sample_rate == 0 {
            error!("stream resampler: invalid rate");
            return Err(ResamplerError::InvalidRate {
                input: input_sample_rate,
                output: output_sample_rate,
            });
        }

        let scaling = input_sample_rate as f32 / output_sample_rate as f32 * multiplier;
        self.resampler.set_scaling(scaling)
    }

    /// Frame to fill with the next `frame_size()` input samples
    pub fn begin_push_input(&mut self) -> &mut [f32] {
        if self.n_ready_frames < 3 {
            return &mut self.frames[self.n_ready_frames];
        }

        self.frames.rotate_left(1);
        &mut self.frames[2]
    }

    /// Commit the frame returned by [`begin_push_input`](Self::begin_push_input)
    pub fn end_push_input(&mut self) {
        if self.n_ready_frames < 3 {
            self.n_ready_frames += 1;
        }
        self.resampler.advance_window();
    }

    /// Resample into `out`, returning the number of samples written.
    ///
    /// A short count means more input must be pushed. Nothing is produced
    /// until three frames are available.
    pub fn pop_output(&mut self, out: &mut [f32]) -> usize {
        if self.n_ready_frames < 3 {
            return 0;
        }

        let [prev, cur, next] = &self.frames;
        let mut pos = 0;
        self.resampler.fill(prev, cur, next, out, &mut pos);
        pos
    }

    /// Interleaved input samples per frame
    pub fn frame_size(&self) -> usize {
        self.resampler.frame_size()
    }

    /// Input samples consumed per output sample
    pub fn scaling(&self) -> f32 {
        self.resampler.scaling()
    }

    pub fn n_left_to_process(&self) -> f32 {
        self.resampler.n_left_to_process()
    }

    pub fn in_spec(&self) -> &SampleSpec {
        &self.in_spec
    }

    pub fn out_spec(&self) -> &SampleSpec {
        &self.out_spec
    }
}
