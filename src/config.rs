//! Application configuration
//!
//! Stored as TOML. Missing sections and fields take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::{ResamplerProfile, SampleSpec};
use crate::constants::*;
use crate::error::ConfigError;
use crate::fec::{BlockWriterConfig, DEFAULT_MAX_BLOCK_LENGTH};
use crate::packet::FecScheme;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resampler: ResamplerSettings,
    pub fec: FecSettings,
    pub stream: StreamSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplerSettings {
    pub profile: ResamplerProfile,
    /// Extra factor applied on top of the rate ratio, e.g. for clock drift
    pub scaling_multiplier: f32,
}

impl Default for ResamplerSettings {
    fn default() -> Self {
        Self {
            profile: ResamplerProfile::default(),
            scaling_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FecSettings {
    pub scheme: FecScheme,
    pub block: BlockWriterConfig,
    /// Encoder limit on source plus repair packets
    pub max_block_length: usize,
    /// Size of pooled packet buffers in bytes
    pub packet_buffer_size: usize,
    pub pool_capacity: usize,
}

impl Default for FecSettings {
    fn default() -> Self {
        Self {
            scheme: FecScheme::ReedSolomonM8,
            block: BlockWriterConfig::default(),
            max_block_length: DEFAULT_MAX_BLOCK_LENGTH,
            packet_buffer_size: MAX_PACKET_SIZE,
            pool_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub input_rate: u32,
    pub output_rate: u32,
    pub channels: u32,
    /// Samples per channel in one RTP packet
    pub packet_samples: usize,
    pub payload_type: u8,
    /// Stop after this many packets, 0 runs until interrupted
    pub packet_count: usize,
    pub tone_hz: f32,
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            input_rate: DEFAULT_INPUT_RATE,
            output_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            packet_samples: DEFAULT_PACKET_SAMPLES,
            payload_type: PAYLOAD_TYPE_L16_STEREO,
            packet_count: 0,
            tone_hz: 440.0,
            channel_capacity: 256,
        }
    }
}

impl StreamSettings {
    fn channel_mask(&self) -> u32 {
        if self.channels >= 32 {
            u32::MAX
        } else {
            (1u32 << self.channels) - 1
        }
    }

    pub fn input_spec(&self) -> SampleSpec {
        SampleSpec::new(self.input_rate, self.channel_mask())
    }

    pub fn output_spec(&self) -> SampleSpec {
        SampleSpec::new(self.output_rate, self.channel_mask())
    }
}

impl AppConfig {
    /// Default config file location for the current user
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("org", "audio-fec-stream", "audio-fec-stream")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&text)?;
        config.validate()?;
        debug!("config: loaded: path={}", path.display());
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        debug!("config: saved: path={}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let stream = &self.stream;
        if stream.input_rate == 0 || stream.output_rate == 0 {
            return Err(ConfigError::Invalid(format!(
                "sample rates must be positive: input={} output={}",
                stream.input_rate, stream.output_rate
            )));
        }
        if stream.channels == 0 || stream.channels > 32 {
            return Err(ConfigError::Invalid(format!(
                "unsupported channel count: {}",
                stream.channels
            )));
        }
        if stream.packet_samples == 0 {
            return Err(ConfigError::Invalid("packet_samples must be positive".into()));
        }
        if self.resampler.scaling_multiplier <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "scaling multiplier must be positive: {}",
                self.resampler.scaling_multiplier
            )));
        }

        let fec = &self.fec;
        if fec.block.n_source_packets == 0 {
            return Err(ConfigError::Invalid("n_source_packets must be positive".into()));
        }
        if fec.block.n_source_packets + fec.block.n_repair_packets > fec.max_block_length {
            return Err(ConfigError::Invalid(format!(
                "block length exceeds maximum: sblen={} rblen={} max={}",
                fec.block.n_source_packets, fec.block.n_repair_packets, fec.max_block_length
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("audio-fec-stream-{}-{}", std::process::id(), name))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_default_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.input_spec().num_channels(), 2);
        assert_eq!(config.fec.block.n_source_packets, 18);
    }

    #[test]
    fn test_save_load() {
        let path = temp_path("roundtrip");
        let mut config = AppConfig::default();
        config.resampler.profile = ResamplerProfile::High;
        config.fec.scheme = FecScheme::LdpcStaircase;
        config.fec.block.n_repair_packets = 4;

        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file() {
        let config: AppConfig = toml::from_str(
            r#"
            [resampler]
            profile = "low"

            [fec.block]
            n_source_packets = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.resampler.profile, ResamplerProfile::Low);
        assert_eq!(config.fec.block.n_source_packets, 5);
        assert_eq!(config.fec.block.n_repair_packets, 10);
        assert_eq!(config.stream, StreamSettings::default());
    }

    #[test]
    fn test_invalid() {
        let mut config = AppConfig::default();
        config.fec.block.n_source_packets = 250;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.stream.output_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let path = temp_path("missing");
        assert_eq!(AppConfig::load_or_default(&path).unwrap(), AppConfig::default());
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Read(_))));
    }
}
