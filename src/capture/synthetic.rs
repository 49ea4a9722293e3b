//! Synthetic camera and microphone
//!
//! Produces scrolling colour bars at the configured frame rate and a 440 Hz
//! tone as 16-bit PCM. Audio reads are sized by wall time (10 ms) rather
//! than by encoder chunk, like a real capture device.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{CaptureEvent, FrameSource, VideoFrame};
use crate::config::VideoConfig;
use crate::sink::AudioFormat;

const BARS: [(u8, u8, u8); 8] = [
    (255, 255, 255),
    (255, 255, 0),
    (0, 255, 255),
    (0, 255, 0),
    (255, 0, 255),
    (255, 0, 0),
    (0, 0, 255),
    (0, 0, 0),
];

const TONE_HZ: f64 = 440.0;
const TONE_AMPLITUDE: f64 = 8000.0;
const AUDIO_READ_INTERVAL: Duration = Duration::from_millis(10);

/// Test-pattern frame source
pub struct SyntheticSource {
    video: VideoConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new(video: &VideoConfig) -> Self {
        Self {
            video: video.clone(),
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }
}

/// Colour bars scrolled left by `offset` pixels
pub fn render_bars(width: u32, height: u32, offset: u32) -> VideoFrame {
    let mut frame = VideoFrame::new(width, height);
    let bar_width = (width / BARS.len() as u32).max(1);
    for x in 0..width {
        let bar = (((x + offset) / bar_width) as usize) % BARS.len();
        for y in 0..height {
            frame.set_pixel(x, y, BARS[bar]);
        }
    }
    frame
}

/// `frames` interleaved sample frames of a sine tone starting at `start_frame`
pub fn render_tone(start_frame: u64, frames: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(frames * channels as usize * 2);
    for i in 0..frames as u64 {
        let t = (start_frame + i) as f64 / sample_rate as f64;
        let value = (TONE_AMPLITUDE * (2.0 * std::f64::consts::PI * TONE_HZ * t).sin()) as i16;
        for _ in 0..channels {
            pcm.extend_from_slice(&value.to_le_bytes());
        }
    }
    pcm
}

impl FrameSource for SyntheticSource {
    fn start(
        &mut self,
        tx: mpsc::UnboundedSender<CaptureEvent>,
        audio: Option<AudioFormat>,
    ) -> Result<()> {
        if self.is_running() {
            debug!("Synthetic source already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .context("Synthetic source must be started inside a tokio runtime")?;

        let (width, height) = (self.video.width, self.video.height);
        let frame_interval = Duration::from_secs(1) / self.video.fps.max(1);
        let video_tx = tx.clone();
        self.tasks.push(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut offset = 0u32;
            loop {
                ticker.tick().await;
                let frame = render_bars(width, height, offset);
                if video_tx.send(CaptureEvent::Video(frame)).is_err() {
                    break;
                }
                offset = offset.wrapping_add(2);
            }
        }));

        if let Some(format) = audio {
            let sample_rate = format.sample_rate;
            let channels = format.channels;
            let frames_per_read = (sample_rate as u64 * AUDIO_READ_INTERVAL.as_millis() as u64
                / 1000) as usize;
            self.tasks.push(runtime.spawn(async move {
                let mut ticker = tokio::time::interval(AUDIO_READ_INTERVAL);
                let mut position = 0u64;
                loop {
                    ticker.tick().await;
                    let pcm = render_tone(position, frames_per_read, sample_rate, channels);
                    if tx.send(CaptureEvent::Audio(pcm)).is_err() {
                        break;
                    }
                    position += frames_per_read as u64;
                }
            }));
        }

        info!(
            "Synthetic source started: {}x{}@{}fps, audio {}",
            width,
            height,
            self.video.fps,
            match audio {
                Some(format) => format!("{} Hz x{}", format.sample_rate, format.channels),
                None => "off".to_string(),
            }
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("Synthetic source stopped");
    }

    fn name(&self) -> &str {
        "Synthetic test pattern"
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;

    #[test]
    fn test_render_bars() {
        let frame = render_bars(16, 2, 0);
        assert_eq!(frame.data.len(), 16 * 2 * 4);
        assert_eq!(frame.pixel(0, 0), BARS[0]);
        assert_eq!(frame.pixel(2, 1), BARS[1]);
        assert_eq!(frame.pixel(15, 0), BARS[7]);

        let scrolled = render_bars(16, 2, 2);
        assert_eq!(scrolled.pixel(0, 0), BARS[1]);
    }

    #[test]
    fn test_render_tone_layout() {
        let pcm = render_tone(0, 441, 44_100, 2);
        assert_eq!(pcm.len(), 441 * 4);
        // First frame is silence, channels carry the same value
        assert_eq!(&pcm[..4], &[0, 0, 0, 0]);
        assert_eq!(&pcm[4..6], &pcm[6..8]);
    }

    fn stereo() -> AudioFormat {
        AudioConfig::default().format()
    }

    #[test]
    fn test_start_requires_runtime() {
        let mut source = SyntheticSource::new(&VideoConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(source.start(tx, Some(stereo())).is_err());
        assert!(!source.is_running());
    }

    #[tokio::test]
    async fn test_emits_video_and_audio() {
        let video = VideoConfig {
            width: 8,
            height: 4,
            fps: 100,
            ..VideoConfig::default()
        };
        let mut source = SyntheticSource::new(&video);
        let (tx, mut rx) = mpsc::unbounded_channel();
        source.start(tx, Some(stereo())).unwrap();

        let mut saw_video = false;
        let mut saw_audio = false;
        while !(saw_video && saw_audio) {
            match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(CaptureEvent::Video(frame))) => {
                    assert_eq!(frame.data.len(), 8 * 4 * 4);
                    saw_video = true;
                }
                Ok(Some(CaptureEvent::Audio(pcm))) => {
                    assert_eq!(pcm.len(), 441 * 4);
                    saw_audio = true;
                }
                other => panic!("source stopped early: {:?}", other.is_ok()),
            }
        }

        source.stop();
        assert!(!source.is_running());
    }

    #[tokio::test]
    async fn test_start_without_audio_emits_video_only() {
        let video = VideoConfig {
            width: 8,
            height: 4,
            fps: 100,
            ..VideoConfig::default()
        };
        let mut source = SyntheticSource::new(&video);
        let (tx, mut rx) = mpsc::unbounded_channel();
        source.start(tx, None).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        source.stop();

        let mut frames = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, CaptureEvent::Video(_)));
            frames += 1;
        }
        assert!(frames > 0);
    }
}
