//! Error types for the resampling and FEC pipeline

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Resampler error: {0}")]
    Resampler(#[from] ResamplerError),

    #[error("FEC error: {0}")]
    Fec(#[from] FecError),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resampler errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResamplerError {
    #[error("Invalid channel count: {0}")]
    InvalidChannels(usize),

    #[error("Frame size {frame_size} is not a multiple of {channels} channels")]
    FrameNotMultiple { frame_size: usize, channels: usize },

    #[error("Frame size {frame_size} exceeds fixed-point range (max {max})")]
    FrameTooLarge { frame_size: usize, max: usize },

    #[error("Window size can't be zero")]
    ZeroWindow,

    #[error("Window interpolation is not a power of two: {0}")]
    InterpNotPowerOfTwo(usize),

    #[error("Scaling {scaling:.5} does not fit frame: window={window} channel_len={channel_len}")]
    ScalingOutOfBounds {
        scaling: f32,
        window: usize,
        channel_len: usize,
    },

    #[error("Invalid sample rate: in={input} out={output}")]
    InvalidRate { input: u32, output: u32 },

    #[error("Invalid scaling: {0}")]
    InvalidScaling(f32),
}

/// FEC block writer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FecError {
    #[error("Block writer is dead")]
    Dead,

    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Encoder rejected block: sblen={sblen} rblen={rblen} payload_size={payload_size}")]
    BlockRejected {
        sblen: usize,
        rblen: usize,
        payload_size: usize,
    },

    #[error("Payload size changed mid-block: sbn={sbn} esi={esi} old={old} new={new}")]
    PayloadSizeChanged {
        sbn: u16,
        esi: usize,
        old: usize,
        new: usize,
    },

    #[error("Payload size can't be zero")]
    ZeroPayload,

    #[error("Source block length can't be zero")]
    ZeroSourceBlock,

    #[error("Block length {requested} exceeds encoder maximum {max}")]
    BlockTooLong { requested: usize, max: usize },

    #[error("Can't compose {0} packet")]
    ComposeFailed(&'static str),

    #[error("Downstream write failed: {0}")]
    Downstream(#[from] PacketError),
}

/// Packet transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Writer channel disconnected")]
    Disconnected,

    #[error("Writer is full")]
    Full,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Can't read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Can't parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Can't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No config directory available")]
    NoConfigDir,

    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
