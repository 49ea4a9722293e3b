//! Recorder engine
//!
//! Owns the timeline muxer, the frame source, the audio chunker and the
//! image filter. Commands and capture events are handled on one event loop,
//! so the muxer only ever sees one caller. Video frames are filtered and
//! submitted with the nominal frame duration; microphone reads are cut into
//! encoder chunks first.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::capture::{AudioChunker, CaptureEvent, FrameSource};
use crate::config::Config;
use crate::error::RecorderError;
use crate::filter::{create_filter, FilterKind, ImageFilter};
use crate::mux::{clock_to_secs, ClockUnits, SessionHandle, SessionSummary, TimelineMuxer};
use crate::sink::{AudioFormat, SinkFactory};

use super::{EngineCommand, EngineStatus};

const STATUS_INTERVAL: Duration = Duration::from_secs(1);
const RECORDING_EXTENSION: &str = "samples";

/// Per-session settings fixed when recording starts
#[derive(Debug, Clone, Copy)]
struct SessionTiming {
    video: ClockUnits,
    audio: Option<ClockUnits>,
    /// Microphone format the source captures in, `None` for video only
    audio_format: Option<AudioFormat>,
}

/// The recorder engine coordinates capture and muxing
pub struct RecorderEngine {
    /// Configuration
    config: Config,
    /// Timeline muxer owning the sink of the active session
    muxer: TimelineMuxer,
    /// Camera/microphone backend
    source: Option<Box<dyn FrameSource>>,
    /// Frame filter
    filter: Option<Box<dyn ImageFilter>>,
    filter_kind: FilterKind,
    /// Pending microphone bytes
    chunker: AudioChunker,
    /// Command receiver
    cmd_rx: mpsc::Receiver<EngineCommand>,
    /// Status broadcaster
    status_tx: broadcast::Sender<EngineStatus>,
    /// Capture channel of the active session
    capture_tx: Option<mpsc::UnboundedSender<CaptureEvent>>,
    capture_rx: Option<mpsc::UnboundedReceiver<CaptureEvent>>,
    timing: Option<SessionTiming>,
    video_frames: u64,
    audio_chunks: u64,
    recording_started: Option<Instant>,
}

impl RecorderEngine {
    /// Create a new recorder engine
    pub fn new(
        config: Config,
        sink_factory: Box<dyn SinkFactory>,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        let filter_kind = config.recording.filter;

        Self {
            config,
            muxer: TimelineMuxer::new(sink_factory),
            source: None,
            filter: create_filter(filter_kind),
            filter_kind,
            chunker: AudioChunker::new(0),
            cmd_rx,
            status_tx,
            capture_tx: None,
            capture_rx: None,
            timing: None,
            video_frames: 0,
            audio_chunks: 0,
            recording_started: None,
        }
    }

    /// Bind (or unbind) the camera/microphone backend
    ///
    /// While recording, the old source is stopped and the new one is started
    /// on the same session.
    pub fn set_source(&mut self, source: Option<Box<dyn FrameSource>>) -> Result<()> {
        if let Some(mut old) = self.source.take() {
            old.stop();
        }
        self.source = source;

        let Some(source) = self.source.as_mut() else {
            info!("Frame source removed");
            return Ok(());
        };
        info!("Frame source set: {}", source.name());

        if let Some(tx) = self.capture_tx.clone() {
            let audio = self.timing.and_then(|t| t.audio_format);
            source
                .start(tx, audio)
                .with_context(|| format!("Failed to start frame source {}", source.name()))?;
        }
        Ok(())
    }

    /// Select the filter applied to subsequent frames
    pub fn set_filter(&mut self, kind: FilterKind) {
        if kind != self.filter_kind {
            info!("Frame filter: {:?} -> {:?}", self.filter_kind, kind);
        }
        self.filter_kind = kind;
        self.filter = create_filter(kind);
    }

    pub fn is_recording(&self) -> bool {
        self.muxer.is_recording()
    }

    /// Run the engine main loop
    pub async fn run(&mut self) -> Result<()> {
        info!("Recorder engine starting");

        let mut status_timer = tokio::time::interval(STATUS_INTERVAL);

        // Broadcast initial status
        let _ = self.status_tx.send(EngineStatus::Idle);

        if self.config.recording.autostart_on_launch {
            info!("Autostart recording on launch enabled");
            if let Err(e) = self.start_recording(None) {
                error!("Failed to autostart recording: {:#}", e);
                let _ = self
                    .status_tx
                    .send(EngineStatus::Error(format!("Autostart failed: {}", e)));
            }
        }

        loop {
            tokio::select! {
                // Handle commands
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        info!("Command channel closed");
                        self.stop_recording()?;
                        break;
                    };
                    match cmd {
                        EngineCommand::StartRecording { output } => {
                            if let Err(e) = self.start_recording(output) {
                                error!("Failed to start recording: {:#}", e);
                                let _ = self.status_tx.send(EngineStatus::Error(e.to_string()));
                            }
                        }
                        EngineCommand::StopRecording => {
                            if let Err(e) = self.stop_recording() {
                                error!("Failed to stop recording: {:#}", e);
                                let _ = self.status_tx.send(EngineStatus::Error(e.to_string()));
                            }
                        }
                        EngineCommand::SetFilter(kind) => {
                            self.set_filter(kind);
                        }
                        EngineCommand::SetAudioEnabled(enabled) => {
                            info!("Audio recording {} for next session", if enabled { "enabled" } else { "disabled" });
                            self.config.audio.enabled = enabled;
                        }
                        EngineCommand::Shutdown => {
                            info!("Shutdown command received");
                            self.stop_recording()?;
                            break;
                        }
                    }
                }

                // Handle frames and microphone reads
                Some(event) = recv_capture(&mut self.capture_rx) => {
                    self.handle_capture_event(event);
                }

                _ = status_timer.tick() => {
                    if self.is_recording() {
                        let _ = self.status_tx.send(self.recording_status());
                    }
                }
            }
        }

        info!("Recorder engine stopped");
        Ok(())
    }

    /// Start a recording session
    fn start_recording(&mut self, output: Option<PathBuf>) -> Result<SessionHandle> {
        if let Some(active) = self.muxer.session() {
            warn!("Recording already in progress to {:?}", active.output_path);
            return Err(RecorderError::AlreadyRecording.into());
        }
        if self.source.is_none() {
            return Err(RecorderError::NoCameraConfigured.into());
        }

        self.config.validate()?;
        let session_config = self.config.session_config();
        let output_path = output.unwrap_or_else(|| self.default_output_path());

        info!("Starting recording...");
        let handle = self.muxer.begin_session(&output_path, &session_config)?;

        self.timing = Some(SessionTiming {
            video: session_config.video_duration(),
            audio: session_config.audio_duration(),
            audio_format: session_config.audio,
        });
        self.chunker = AudioChunker::new(session_config.audio_chunk_bytes);
        self.video_frames = 0;
        self.audio_chunks = 0;

        // Fresh channel per session so stale frames never reach a new file
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.start(capture_tx.clone(), session_config.audio) {
                error!("Frame source {} failed to start: {:#}", source.name(), e);
                self.timing = None;
                if let Err(end_err) = self.muxer.end_session() {
                    warn!("Failed to end aborted session: {}", end_err);
                }
                return Err(e.context("Failed to start frame source"));
            }
        }
        self.capture_tx = Some(capture_tx);
        self.capture_rx = Some(capture_rx);
        self.recording_started = Some(Instant::now());

        info!(
            "Recording started at {}: session={}, output={:?}, video stream {}, audio stream {}",
            handle.started_at.format("%H:%M:%S"),
            handle.session_id,
            handle.output_path,
            handle.video_stream.0,
            handle
                .audio_stream
                .map_or_else(|| "none".to_string(), |s| s.0.to_string())
        );
        let _ = self.status_tx.send(self.recording_status());

        Ok(handle)
    }

    /// Stop recording and finalize the output
    fn stop_recording(&mut self) -> Result<Option<SessionSummary>> {
        if !self.muxer.is_recording() {
            debug!("No recording in progress");
            return Ok(None);
        }

        info!("Stopping recording...");

        if let Some(source) = self.source.as_mut() {
            source.stop();
        }
        self.capture_tx = None;

        // Frames already delivered before the stop still belong to this session
        if let Some(mut rx) = self.capture_rx.take() {
            while let Ok(event) = rx.try_recv() {
                self.handle_capture_event(event);
            }
        }

        if self.chunker.pending() > 0 {
            debug!("Dropping {} bytes of partial audio chunk", self.chunker.pending());
        }
        self.chunker.clear();
        self.timing = None;
        self.recording_started = None;

        let result = self.muxer.end_session();
        let _ = self.status_tx.send(EngineStatus::Idle);

        let summary = result?;
        if let Some(summary) = &summary {
            info!(
                "Recording stopped: session={}, output={:?}",
                summary.session_id, summary.output_path
            );
        }
        Ok(summary)
    }

    /// Route one capture event to the muxer
    fn handle_capture_event(&mut self, event: CaptureEvent) {
        let Some(timing) = self.timing else {
            return;
        };

        match event {
            CaptureEvent::Video(mut frame) => {
                if let Some(filter) = &self.filter {
                    filter.filter(&mut frame);
                }
                self.video_frames += 1;
                if let Err(e) = self.muxer.submit_video_frame(&frame.data, timing.video) {
                    log_submit_error(&e);
                }
            }
            CaptureEvent::Audio(pcm) => {
                let Some(duration) = timing.audio else {
                    return;
                };
                self.chunker.push(&pcm);
                while let Some(chunk) = self.chunker.next_chunk() {
                    self.audio_chunks += 1;
                    if let Err(e) = self.muxer.submit_audio_chunk(&chunk, duration) {
                        log_submit_error(&e);
                    }
                }
            }
        }
    }

    fn recording_status(&self) -> EngineStatus {
        let timeline = self
            .muxer
            .video_cursor()
            .unwrap_or(0)
            .max(self.muxer.audio_cursor().unwrap_or(0));

        EngineStatus::Recording {
            video_frames: self.video_frames,
            audio_chunks: self.audio_chunks,
            elapsed_secs: self
                .recording_started
                .map(|t| t.elapsed().as_secs())
                .unwrap_or(0),
            timeline_secs: clock_to_secs(timeline),
        }
    }

    fn default_output_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let dir = self.config.output_directory();

        let mut path = dir.join(format!("recording_{}.{}", stamp, RECORDING_EXTENSION));
        let mut n = 1;
        while path.exists() {
            n += 1;
            path = dir.join(format!("recording_{}_{}.{}", stamp, n, RECORDING_EXTENSION));
        }
        path
    }
}

async fn recv_capture(
    rx: &mut Option<mpsc::UnboundedReceiver<CaptureEvent>>,
) -> Option<CaptureEvent> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn log_submit_error(err: &RecorderError) {
    match err {
        // Already reported by the muxer
        RecorderError::Write { .. } => {}
        other => debug!("Sample dropped: {}", other),
    }
}

/// Create command and status channels for the engine
pub fn create_engine_channels() -> (
    mpsc::Sender<EngineCommand>,
    mpsc::Receiver<EngineCommand>,
    broadcast::Sender<EngineStatus>,
    broadcast::Receiver<EngineStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (status_tx, status_rx) = broadcast::channel(16);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}
