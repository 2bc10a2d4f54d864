//! # Audio FEC Stream
//!
//! Sender-side building blocks of a real-time audio stream: a windowed sinc
//! resampler running on fixed-point phase, and an FEC block writer that
//! protects RTP packets with repair packets.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               SENDER                                 │
//! │  ┌──────────────┐    ┌──────────────────────────────────────────┐    │
//! │  │ PCM frames   │───▶│ StreamResampler (audio::stream)          │    │
//! │  └──────────────┘    │  prev │ cur │ next ──▶ Resampler + Sinc  │    │
//! │                      └───────────────────┬──────────────────────┘    │
//! │                                          │ retimed frames            │
//! │                                          ▼                           │
//! │                      ┌──────────────────────────────────────────┐    │
//! │                      │ Packetizer (RTP + FEC payload ID)        │    │
//! │                      └───────────────────┬──────────────────────┘    │
//! │                                          │ prepared packets          │
//! │                                          ▼                           │
//! │  ┌──────────────┐    ┌──────────────────────────────────────────┐    │
//! │  │ PacketPool   │───▶│ BlockWriter (fec::block_writer)          │    │
//! │  └──────────────┘    │  S0 .. S(k-1) ──▶ BlockEncoder ──▶ R0 .. │    │
//! │                      └───────────────────┬──────────────────────┘    │
//! │                                          │ composed packets          │
//! │                                          ▼                           │
//! │                      ┌──────────────────────────────────────────┐    │
//! │                      │ PacketWriter (channel to transport)      │    │
//! │                      └──────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod fec;
pub mod packet;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default output sample rate
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default rate of the generated input signal
    pub const DEFAULT_INPUT_RATE: u32 = 44100;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u32 = 2;

    /// Default samples per channel in one packet (5ms at 48kHz)
    pub const DEFAULT_PACKET_SAMPLES: usize = 240;

    /// RTP payload type of 16-bit big-endian stereo PCM
    pub const PAYLOAD_TYPE_L16_STEREO: u8 = 10;

    /// Maximum packet size for UDP
    pub const MAX_PACKET_SIZE: usize = 1472; // MTU - IP/UDP headers
}
