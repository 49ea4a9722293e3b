//! Recorder error types

use thiserror::Error;

use crate::mux::{ClockUnits, StreamKind};
use crate::sink::SinkError;

/// Errors surfaced by the timeline muxer and the recorder built on it
#[derive(Error, Debug)]
pub enum RecorderError {
    /// A session was started while another one is active
    #[error("Recording already in progress")]
    AlreadyRecording,

    /// The sink could not be opened, configured or started
    #[error("Sample sink unavailable: {0}")]
    SinkUnavailable(#[source] SinkError),

    /// A single sample write failed. Non-fatal to the session.
    #[error("Failed to write {kind} sample at {timestamp}: {source}")]
    Write {
        kind: StreamKind,
        timestamp: ClockUnits,
        #[source]
        source: SinkError,
    },

    /// Start was attempted without a frame source bound
    #[error("No camera configured")]
    NoCameraConfigured,

    /// A sample was submitted while no session is active
    #[error("Not recording")]
    NotRecording,

    /// A sample was submitted to a stream the session was started without
    #[error("{0} stream not configured for this session")]
    StreamNotConfigured(StreamKind),

    /// The sink failed to flush and close its output
    #[error("Failed to finalize sample sink: {0}")]
    Finalize(#[source] SinkError),
}
