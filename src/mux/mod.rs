//! Audio/video timeline muxing
//!
//! Camera frames and microphone chunks arrive independently and at their own
//! rates. Each stream keeps its own clock cursor on a shared 100 ns timeline,
//! starting at 0 when the session starts and advancing by a fixed nominal
//! duration per sample. Capture jitter never reaches the output timestamps.

mod clock;
mod muxer;

pub use clock::StreamClock;
pub use muxer::{SessionConfig, SessionHandle, SessionSummary, TimelineMuxer};

use std::fmt;

/// Timestamps and durations in 100 ns ticks
pub type ClockUnits = u64;

/// Clock units in one second
pub const CLOCK_UNITS_PER_SECOND: ClockUnits = 10_000_000;

/// The two stream kinds of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
        }
    }
}

/// Nominal duration of one video frame at `fps` frames per second
///
/// Integer arithmetic: 30 fps gives 333_333.
pub fn video_frame_duration(fps: u32) -> ClockUnits {
    CLOCK_UNITS_PER_SECOND / ClockUnits::from(fps.max(1))
}

/// Nominal duration of an audio chunk holding `frames` sample frames
pub fn audio_chunk_duration(frames: u64, sample_rate: u32) -> ClockUnits {
    frames * CLOCK_UNITS_PER_SECOND / ClockUnits::from(sample_rate.max(1))
}

/// Convert clock units to seconds for display
pub fn clock_to_secs(units: ClockUnits) -> f64 {
    units as f64 / CLOCK_UNITS_PER_SECOND as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_frame_duration() {
        assert_eq!(video_frame_duration(30), 333_333);
        assert_eq!(video_frame_duration(25), 400_000);
        assert_eq!(video_frame_duration(0), CLOCK_UNITS_PER_SECOND);
    }

    #[test]
    fn test_audio_chunk_duration() {
        // 2048 bytes of 16-bit stereo
        assert_eq!(audio_chunk_duration(512, 44_100), 116_099);
        assert_eq!(audio_chunk_duration(1024, 48_000), 213_333);
    }

    #[test]
    fn test_clock_to_secs() {
        assert_eq!(clock_to_secs(15_000_000), 1.5);
    }
}
