//! Sample sink interface
//!
//! The sink is the encoder/muxer that compresses timestamped samples and
//! writes them into the output container. The recorder only talks to it
//! through [`SampleSink`]; the platform encoder lives behind this trait.

mod dump;
#[cfg(test)]
pub mod testing;

pub use dump::{read_dump, DumpSinkFactory};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::mux::{ClockUnits, StreamKind};

/// Errors reported by a sample sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// The output could not be created
    #[error("Failed to open sink: {0}")]
    Open(String),

    /// The sink refused a stream configuration or a sample
    #[error("Sample rejected: {0}")]
    Rejected(String),

    /// I/O error while writing the output
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization failed
    #[error("Failed to encode record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Opaque stream identifier assigned by the sink when a stream is added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamIndex(pub u32);

/// Video stream target: H.264 from RGB32 input at a fixed size and rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Average bitrate in bits per second
    pub bitrate: u32,
}

impl VideoFormat {
    /// Size in bytes of one RGB32 frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Audio stream target: AAC from interleaved signed PCM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub avg_bytes_per_second: u32,
}

impl AudioFormat {
    /// Bytes per interleaved sample frame (all channels)
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }
}

/// Configuration for one output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamConfig {
    Video(VideoFormat),
    Audio(AudioFormat),
}

impl StreamConfig {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamConfig::Video(_) => StreamKind::Video,
            StreamConfig::Audio(_) => StreamKind::Audio,
        }
    }
}

/// One timestamped unit of raw data handed to the sink
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub data: &'a [u8],
    /// Presentation time since session start, in clock units
    pub timestamp: ClockUnits,
    pub duration: ClockUnits,
}

/// An encoder/muxer writing samples into an output container
///
/// Streams are added before `begin_writing`; samples are accepted after it;
/// `finalize` flushes and closes the output.
pub trait SampleSink: Send {
    fn add_stream(&mut self, config: &StreamConfig) -> Result<StreamIndex, SinkError>;

    fn begin_writing(&mut self) -> Result<(), SinkError>;

    fn write_sample(&mut self, stream: StreamIndex, sample: &Sample<'_>) -> Result<(), SinkError>;

    fn finalize(&mut self) -> Result<(), SinkError>;
}

/// Opens sinks for new recording sessions
///
/// A factory is created once per process and stands for the platform
/// media subsystem; each session gets its own sink from it.
pub trait SinkFactory: Send {
    fn open(&mut self, output_path: &Path) -> Result<Box<dyn SampleSink>, SinkError>;
}
