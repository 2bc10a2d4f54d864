//! Audio subsystem: sample specs and the sinc resampler

pub mod fixed;
pub mod resampler;
pub mod sample_spec;
pub mod sinc;
pub mod stream;

pub use fixed::Fixed;
pub use resampler::{ResampleWindow, Resampler, ResamplerConfig, ResamplerProfile};
pub use sample_spec::SampleSpec;
pub use sinc::SincTable;
pub use stream::StreamResampler;
