//! Frame sources
//!
//! A frame source stands in for the camera and microphone. It pushes raw
//! frames and PCM reads into the recorder engine through a channel, from
//! whatever threads or tasks it runs on. The engine never talks to devices
//! directly. Whether the microphone is captured is decided per session, by
//! the audio format passed to `start`.

mod audio;
mod frame;
mod synthetic;

pub use audio::AudioChunker;
pub use frame::VideoFrame;
pub use synthetic::SyntheticSource;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::sink::AudioFormat;

/// Events pushed by a frame source
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A captured camera frame
    Video(VideoFrame),
    /// A microphone read of interleaved signed 16-bit PCM, any length
    Audio(Vec<u8>),
}

/// Trait for camera/microphone backends
pub trait FrameSource: Send {
    /// Start capturing; events are sent to the provided channel
    ///
    /// Microphone reads are produced in `audio` format, or not at all when
    /// it is `None`.
    fn start(
        &mut self,
        tx: mpsc::UnboundedSender<CaptureEvent>,
        audio: Option<AudioFormat>,
    ) -> Result<()>;

    /// Stop capturing. Safe to call when not started.
    fn stop(&mut self);

    /// Human-readable device name
    fn name(&self) -> &str;
}

/// Create the frame source for the current configuration
pub fn create_frame_source(config: &Config) -> Box<dyn FrameSource> {
    tracing::info!("Using synthetic test-pattern source");
    Box::new(SyntheticSource::new(&config.video))
}
