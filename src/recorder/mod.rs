//! Recorder engine - drives capture into the timeline muxer

mod engine;

pub use engine::{create_engine_channels, RecorderEngine};

use std::path::PathBuf;

use crate::filter::FilterKind;

/// Commands that can be sent to the recorder engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Start recording, to `output` or a generated file in the output directory
    StartRecording { output: Option<PathBuf> },
    /// Stop recording and finalize the output
    StopRecording,
    /// Change the frame filter (takes effect on the next frame)
    SetFilter(FilterKind),
    /// Record audio in sessions started from now on
    SetAudioEnabled(bool),
    /// Shutdown the engine
    Shutdown,
}

/// Status updates from the recorder engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    /// Not recording
    Idle,
    /// Recording is active
    Recording {
        /// Frames submitted this session
        video_frames: u64,
        /// Audio chunks submitted this session
        audio_chunks: u64,
        /// Wall time since the session started
        elapsed_secs: u64,
        /// Length of the recorded timeline so far
        timeline_secs: f64,
    },
    /// An error occurred
    Error(String),
}
