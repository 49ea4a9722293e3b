//! Configuration management for camera-recorder

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::filter::FilterKind;
use crate::mux::SessionConfig;
use crate::sink::{AudioFormat, VideoFormat};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Camera stream configuration
    #[serde(default)]
    pub video: VideoConfig,

    /// Microphone stream configuration
    #[serde(default)]
    pub audio: AudioConfig,

    /// Recording configuration
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Nominal frames per second
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// H.264 average bitrate in bits per second
    #[serde(default = "default_video_bitrate")]
    pub bitrate: u32,
}

/// How many PCM bytes make up one encoder chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSize {
    /// Exactly this many bytes regardless of channel count
    Fixed(usize),
    /// This many bytes per channel
    PerChannel(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Whether to record the microphone
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,

    /// AAC average bytes per second
    #[serde(default = "default_audio_bytes_per_second")]
    pub avg_bytes_per_second: u32,

    /// Encoder chunk size
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ChunkSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory for recordings when no output path is given
    #[serde(default = "default_recording_output_directory_option")]
    pub output_directory: Option<PathBuf>,

    /// Filter applied to every camera frame
    #[serde(default)]
    pub filter: FilterKind,

    /// Whether to start recording automatically on launch
    #[serde(default)]
    pub autostart_on_launch: bool,

    /// Recording length for unattended runs (0 = until interrupted)
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

// Default value functions
fn default_width() -> u32 {
    320
}

fn default_height() -> u32 {
    240
}

fn default_fps() -> u32 {
    30
}

fn default_video_bitrate() -> u32 {
    2_500_000
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_channels() -> u16 {
    2
}

fn default_bits_per_sample() -> u16 {
    16
}

fn default_audio_bytes_per_second() -> u32 {
    20_000
}

fn default_chunk_size() -> ChunkSize {
    ChunkSize::PerChannel(1024)
}

fn default_recording_output_directory() -> PathBuf {
    std::env::temp_dir().join("camera-recorder")
}

fn default_recording_output_directory_option() -> Option<PathBuf> {
    Some(default_recording_output_directory())
}

fn default_duration_secs() -> u64 {
    10
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            bitrate: default_video_bitrate(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bits_per_sample: default_bits_per_sample(),
            avg_bytes_per_second: default_audio_bytes_per_second(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_directory: default_recording_output_directory_option(),
            filter: FilterKind::None,
            autostart_on_launch: false,
            duration_secs: default_duration_secs(),
        }
    }
}

impl VideoConfig {
    pub fn format(&self) -> VideoFormat {
        VideoFormat {
            width: self.width,
            height: self.height,
            fps: self.fps,
            bitrate: self.bitrate,
        }
    }
}

impl AudioConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
            avg_bytes_per_second: self.avg_bytes_per_second,
        }
    }

    /// Bytes in one encoder chunk
    pub fn chunk_bytes(&self) -> usize {
        match self.chunk_size {
            ChunkSize::Fixed(bytes) => bytes,
            ChunkSize::PerChannel(bytes) => bytes * self.channels as usize,
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "camera-recorder", "recorder")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Reject settings the recorder cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            bail!(
                "Video size must be non-zero (got {}x{})",
                self.video.width,
                self.video.height
            );
        }
        if self.video.fps == 0 {
            bail!("Video frame rate must be non-zero");
        }

        if self.audio.enabled {
            if self.audio.sample_rate == 0 || self.audio.channels == 0 {
                bail!("Audio sample rate and channel count must be non-zero");
            }
            if self.audio.bits_per_sample != 16 {
                bail!(
                    "Only 16-bit PCM is supported (got {} bits)",
                    self.audio.bits_per_sample
                );
            }

            let chunk = self.audio.chunk_bytes();
            let align = self.audio.format().block_align();
            if chunk == 0 || chunk % align != 0 {
                bail!(
                    "Audio chunk size {} is not a whole number of {}-byte sample frames",
                    chunk,
                    align
                );
            }
        }

        Ok(())
    }

    /// Directory for recordings
    pub fn output_directory(&self) -> PathBuf {
        self.recording
            .output_directory
            .clone()
            .unwrap_or_else(default_recording_output_directory)
    }

    /// Streams to configure for a new session
    pub fn session_config(&self) -> SessionConfig {
        if !self.audio.enabled {
            return SessionConfig::video_only(self.video.format());
        }
        SessionConfig {
            video: self.video.format(),
            audio: Some(self.audio.format()),
            audio_chunk_bytes: self.audio.chunk_bytes(),
        }
    }
}
