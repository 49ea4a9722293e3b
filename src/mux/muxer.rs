//! Timeline muxer
//!
//! Owns the sink for the active session and stamps every submitted frame or
//! chunk with its stream's clock cursor before forwarding it. The cursor
//! advances whether or not the sink accepts the sample, so a transient
//! encoder failure never shifts later timestamps.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::RecorderError;
use crate::sink::{
    AudioFormat, Sample, SampleSink, SinkFactory, StreamConfig, StreamIndex, VideoFormat,
};

use super::{
    audio_chunk_duration, clock_to_secs, video_frame_duration, ClockUnits, StreamClock, StreamKind,
};

/// Streams to configure when a session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub video: VideoFormat,
    /// `None` records video only
    pub audio: Option<AudioFormat>,
    /// Size of one audio chunk handed to the sink
    pub audio_chunk_bytes: usize,
}

impl SessionConfig {
    pub fn video_only(video: VideoFormat) -> Self {
        Self {
            video,
            audio: None,
            audio_chunk_bytes: 0,
        }
    }

    /// Nominal duration of one video frame
    pub fn video_duration(&self) -> ClockUnits {
        video_frame_duration(self.video.fps)
    }

    /// Nominal duration of one audio chunk, if audio is configured
    pub fn audio_duration(&self) -> Option<ClockUnits> {
        self.audio.map(|format| {
            let frames = self.audio_chunk_bytes / format.block_align().max(1);
            audio_chunk_duration(frames as u64, format.sample_rate)
        })
    }
}

/// Identity of an active recording session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub output_path: PathBuf,
    pub started_at: DateTime<Local>,
    pub video_stream: StreamIndex,
    pub audio_stream: Option<StreamIndex>,
}

/// What a finished session produced
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub output_path: PathBuf,
    pub video_samples: u64,
    pub audio_samples: u64,
    /// Video timeline length in clock units
    pub video_elapsed: ClockUnits,
    /// Audio timeline length in clock units
    pub audio_elapsed: ClockUnits,
    pub write_failures: u64,
}

struct ActiveSession {
    handle: SessionHandle,
    sink: Box<dyn SampleSink>,
    video: StreamClock,
    audio: Option<StreamClock>,
    write_failures: u64,
}

/// Places video frames and audio chunks on a per-stream sample timeline
pub struct TimelineMuxer {
    factory: Box<dyn SinkFactory>,
    session: Option<ActiveSession>,
}

impl TimelineMuxer {
    pub fn new(factory: Box<dyn SinkFactory>) -> Self {
        Self {
            factory,
            session: None,
        }
    }

    /// Open a sink at `output_path`, configure its streams and begin writing
    ///
    /// Any sink failure aborts the start and leaves the muxer idle.
    pub fn begin_session(
        &mut self,
        output_path: &Path,
        config: &SessionConfig,
    ) -> Result<SessionHandle, RecorderError> {
        if self.session.is_some() {
            warn!("Cannot begin session: recording already in progress");
            return Err(RecorderError::AlreadyRecording);
        }

        info!("Opening sample sink at {:?}", output_path);

        let mut sink = self.factory.open(output_path).map_err(|e| {
            error!("Failed to open sample sink: {}", e);
            RecorderError::SinkUnavailable(e)
        })?;

        let video_stream = sink
            .add_stream(&StreamConfig::Video(config.video))
            .map_err(|e| {
                error!("Failed to configure video stream: {}", e);
                RecorderError::SinkUnavailable(e)
            })?;

        let audio_stream = match config.audio {
            Some(format) => {
                let index = sink.add_stream(&StreamConfig::Audio(format)).map_err(|e| {
                    error!("Failed to configure audio stream: {}", e);
                    RecorderError::SinkUnavailable(e)
                })?;
                Some(index)
            }
            None => None,
        };

        sink.begin_writing().map_err(|e| {
            error!("Failed to begin writing: {}", e);
            RecorderError::SinkUnavailable(e)
        })?;

        let handle = SessionHandle {
            session_id: uuid::Uuid::new_v4().to_string(),
            output_path: output_path.to_path_buf(),
            started_at: Local::now(),
            video_stream,
            audio_stream,
        };

        let video = StreamClock::new(video_stream, config.video_duration());
        let audio = audio_stream
            .zip(config.audio_duration())
            .map(|(index, duration)| StreamClock::new(index, duration));

        info!(
            "Session {} started: video {}x{}@{} ({} units/frame){}",
            handle.session_id,
            config.video.width,
            config.video.height,
            config.video.fps,
            video.nominal_duration(),
            match &audio {
                Some(clock) => format!(", audio ({} units/chunk)", clock.nominal_duration()),
                None => ", no audio".to_string(),
            }
        );

        self.session = Some(ActiveSession {
            handle: handle.clone(),
            sink,
            video,
            audio,
            write_failures: 0,
        });

        Ok(handle)
    }

    /// Stamp and forward one raw video frame
    ///
    /// Returns the frame's timestamp on success. The video clock advances
    /// even when the sink rejects the frame.
    pub fn submit_video_frame(
        &mut self,
        raw_pixels: &[u8],
        expected_duration: ClockUnits,
    ) -> Result<ClockUnits, RecorderError> {
        self.submit(StreamKind::Video, raw_pixels, expected_duration)
    }

    /// Stamp and forward one fixed-size audio chunk
    pub fn submit_audio_chunk(
        &mut self,
        raw_pcm: &[u8],
        expected_duration: ClockUnits,
    ) -> Result<ClockUnits, RecorderError> {
        self.submit(StreamKind::Audio, raw_pcm, expected_duration)
    }

    fn submit(
        &mut self,
        kind: StreamKind,
        data: &[u8],
        duration: ClockUnits,
    ) -> Result<ClockUnits, RecorderError> {
        let session = self.session.as_mut().ok_or(RecorderError::NotRecording)?;

        let clock = match kind {
            StreamKind::Video => &mut session.video,
            StreamKind::Audio => session
                .audio
                .as_mut()
                .ok_or(RecorderError::StreamNotConfigured(kind))?,
        };

        let timestamp = clock.advance(duration);
        let sample = Sample {
            data,
            timestamp,
            duration,
        };

        match session.sink.write_sample(clock.index(), &sample) {
            Ok(()) => Ok(timestamp),
            Err(e) => {
                session.write_failures += 1;
                warn!(
                    "WriteSample failed for {} sample at {} ({} failures this session): {}",
                    kind, timestamp, session.write_failures, e
                );
                Err(RecorderError::Write {
                    kind,
                    timestamp,
                    source: e,
                })
            }
        }
    }

    /// Finalize the sink and return to idle
    ///
    /// Does nothing when no session is active. If finalizing fails the
    /// session is still released.
    pub fn end_session(&mut self) -> Result<Option<SessionSummary>, RecorderError> {
        let Some(mut session) = self.session.take() else {
            debug!("No session to end");
            return Ok(None);
        };

        let summary = SessionSummary {
            session_id: session.handle.session_id.clone(),
            output_path: session.handle.output_path.clone(),
            video_samples: session.video.samples(),
            audio_samples: session.audio.as_ref().map_or(0, |a| a.samples()),
            video_elapsed: session.video.cursor(),
            audio_elapsed: session.audio.as_ref().map_or(0, |a| a.cursor()),
            write_failures: session.write_failures,
        };

        session.sink.finalize().map_err(|e| {
            error!("Failed to finalize session {}: {}", summary.session_id, e);
            RecorderError::Finalize(e)
        })?;

        info!(
            "Session {} finalized: {} video frames ({:.2}s), {} audio chunks ({:.2}s), {} write failures",
            summary.session_id,
            summary.video_samples,
            clock_to_secs(summary.video_elapsed),
            summary.audio_samples,
            clock_to_secs(summary.audio_elapsed),
            summary.write_failures
        );

        Ok(Some(summary))
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref().map(|s| &s.handle)
    }

    /// Next video timestamp, if recording
    pub fn video_cursor(&self) -> Option<ClockUnits> {
        self.session.as_ref().map(|s| s.video.cursor())
    }

    /// Next audio timestamp, if recording with audio
    pub fn audio_cursor(&self) -> Option<ClockUnits> {
        self.session
            .as_ref()
            .and_then(|s| s.audio.as_ref())
            .map(|a| a.cursor())
    }
}
