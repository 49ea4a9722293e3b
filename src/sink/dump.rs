//! File-backed sample sink
//!
//! Records stream configuration and every timestamped sample to a dump file
//! instead of encoding it. Useful for running the recorder without the
//! platform encoder and for inspecting exactly what the muxer produced.
//!
//! Layout: `CRSD` magic, a version byte, then MessagePack [`DumpRecord`]s.
//! Each `Sample` record is followed by `len` raw bytes.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Sample, SampleSink, SinkError, SinkFactory, StreamConfig, StreamIndex};
use crate::mux::ClockUnits;

const MAGIC: &[u8; 4] = b"CRSD";
const VERSION: u8 = 1;

/// One record in a dump file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DumpRecord {
    Stream {
        index: StreamIndex,
        config: StreamConfig,
    },
    BeginWriting,
    Sample {
        stream: StreamIndex,
        timestamp: ClockUnits,
        duration: ClockUnits,
        len: u64,
    },
    Finalize {
        samples: u64,
    },
}

/// Opens a [`DumpSink`] per session
#[derive(Debug, Default)]
pub struct DumpSinkFactory;

impl DumpSinkFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SinkFactory for DumpSinkFactory {
    fn open(&mut self, output_path: &Path) -> Result<Box<dyn SampleSink>, SinkError> {
        Ok(Box::new(DumpSink::create(output_path)?))
    }
}

/// Writes samples to a dump file
pub struct DumpSink {
    writer: BufWriter<File>,
    path: PathBuf,
    streams: Vec<StreamConfig>,
    writing: bool,
    finalized: bool,
    samples: u64,
}

impl DumpSink {
    /// Create the dump file, including missing parent directories
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SinkError::Open(format!("{:?}: {}", parent, e)))?;
        }

        let file = File::create(path).map_err(|e| SinkError::Open(format!("{:?}: {}", path, e)))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&[VERSION])?;

        debug!("Opened dump sink at {:?}", path);

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            streams: Vec::new(),
            writing: false,
            finalized: false,
            samples: 0,
        })
    }

    fn write_record(&mut self, record: &DumpRecord) -> Result<(), SinkError> {
        rmp_serde::encode::write(&mut self.writer, record)?;
        Ok(())
    }

    fn check_sample(&self, stream: StreamIndex, sample: &Sample<'_>) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Rejected("sink already finalized".into()));
        }
        if !self.writing {
            return Err(SinkError::Rejected("writing has not begun".into()));
        }

        let config = self
            .streams
            .get(stream.0 as usize)
            .ok_or_else(|| SinkError::Rejected(format!("unknown stream {}", stream.0)))?;

        match config {
            StreamConfig::Video(format) => {
                if sample.data.len() != format.frame_bytes() {
                    return Err(SinkError::Rejected(format!(
                        "video frame is {} bytes, expected {} for {}x{}",
                        sample.data.len(),
                        format.frame_bytes(),
                        format.width,
                        format.height
                    )));
                }
            }
            StreamConfig::Audio(format) => {
                let align = format.block_align();
                if sample.data.is_empty() || align == 0 || sample.data.len() % align != 0 {
                    return Err(SinkError::Rejected(format!(
                        "audio chunk of {} bytes is not a whole number of {}-byte frames",
                        sample.data.len(),
                        align
                    )));
                }
            }
        }

        Ok(())
    }
}

impl SampleSink for DumpSink {
    fn add_stream(&mut self, config: &StreamConfig) -> Result<StreamIndex, SinkError> {
        if self.writing {
            return Err(SinkError::Rejected(
                "streams cannot be added after writing began".into(),
            ));
        }

        let index = StreamIndex(self.streams.len() as u32);
        self.write_record(&DumpRecord::Stream {
            index,
            config: *config,
        })?;
        self.streams.push(*config);
        debug!("Dump sink added {} stream {}", config.kind(), index.0);
        Ok(index)
    }

    fn begin_writing(&mut self) -> Result<(), SinkError> {
        if self.streams.is_empty() {
            return Err(SinkError::Rejected("no streams configured".into()));
        }
        if self.writing {
            return Err(SinkError::Rejected("writing already began".into()));
        }

        self.write_record(&DumpRecord::BeginWriting)?;
        self.writing = true;
        Ok(())
    }

    fn write_sample(&mut self, stream: StreamIndex, sample: &Sample<'_>) -> Result<(), SinkError> {
        self.check_sample(stream, sample)?;

        self.write_record(&DumpRecord::Sample {
            stream,
            timestamp: sample.timestamp,
            duration: sample.duration,
            len: sample.data.len() as u64,
        })?;
        self.writer.write_all(sample.data)?;
        self.samples += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Rejected("sink already finalized".into()));
        }

        self.write_record(&DumpRecord::Finalize {
            samples: self.samples,
        })?;
        self.writer.flush()?;
        self.finalized = true;

        info!("Dump sink finalized: {} samples in {:?}", self.samples, self.path);
        Ok(())
    }
}

/// A sample read back from a dump file
#[derive(Debug, Clone, PartialEq)]
pub struct DumpedSample {
    pub stream: StreamIndex,
    pub timestamp: ClockUnits,
    pub duration: ClockUnits,
    pub data: Vec<u8>,
}

/// Everything recorded in a dump file
#[derive(Debug, Clone, Default)]
pub struct DumpContents {
    pub streams: Vec<(StreamIndex, StreamConfig)>,
    pub samples: Vec<DumpedSample>,
    pub finalized: bool,
}

impl DumpContents {
    /// Samples written to one stream, in write order
    pub fn stream_samples(&self, stream: StreamIndex) -> impl Iterator<Item = &DumpedSample> {
        self.samples.iter().filter(move |s| s.stream == stream)
    }
}

/// Parse a dump file written by [`DumpSink`]
pub fn read_dump(path: &Path) -> Result<DumpContents> {
    let file = File::open(path).with_context(|| format!("Failed to open dump file: {:?}", path))?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; 5];
    reader
        .read_exact(&mut header)
        .with_context(|| format!("Failed to read dump header: {:?}", path))?;
    if &header[..4] != MAGIC {
        bail!("Not a sample dump file: {:?}", path);
    }
    if header[4] != VERSION {
        bail!("Unsupported dump version {} in {:?}", header[4], path);
    }

    let mut contents = DumpContents::default();

    loop {
        if reader.fill_buf()?.is_empty() {
            break;
        }

        let record: DumpRecord = rmp_serde::from_read(&mut reader)
            .with_context(|| format!("Corrupt record in dump file: {:?}", path))?;

        match record {
            DumpRecord::Stream { index, config } => contents.streams.push((index, config)),
            DumpRecord::BeginWriting => {}
            DumpRecord::Sample {
                stream,
                timestamp,
                duration,
                len,
            } => {
                // `len` comes from the file, so never allocate it up front
                let mut data = Vec::new();
                (&mut reader)
                    .take(len)
                    .read_to_end(&mut data)
                    .with_context(|| format!("Failed to read sample data in {:?}", path))?;
                if data.len() as u64 != len {
                    bail!(
                        "Truncated sample data in {:?}: expected {} bytes, found {}",
                        path,
                        len,
                        data.len()
                    );
                }
                contents.samples.push(DumpedSample {
                    stream,
                    timestamp,
                    duration,
                    data,
                });
            }
            DumpRecord::Finalize { samples } => {
                if samples as usize != contents.samples.len() {
                    bail!(
                        "Dump trailer reports {} samples but {} were read",
                        samples,
                        contents.samples.len()
                    );
                }
                contents.finalized = true;
            }
        }
    }

    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{AudioFormat, VideoFormat};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("camera-recorder-tests")
            .join(format!("{}-{}.samples", name, uuid::Uuid::new_v4()))
    }

    fn sample(data: &[u8], timestamp: ClockUnits, duration: ClockUnits) -> Sample<'_> {
        Sample {
            data,
            timestamp,
            duration,
        }
    }

    fn video() -> StreamConfig {
        StreamConfig::Video(VideoFormat {
            width: 4,
            height: 2,
            fps: 30,
            bitrate: 2_500_000,
        })
    }

    fn audio() -> StreamConfig {
        StreamConfig::Audio(AudioFormat {
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
            avg_bytes_per_second: 20_000,
        })
    }

    #[test]
    fn test_written_samples_read_back() {
        let path = temp_path("read-back");
        let mut sink = DumpSink::create(&path).unwrap();
        let v = sink.add_stream(&video()).unwrap();
        let a = sink.add_stream(&audio()).unwrap();
        sink.begin_writing().unwrap();

        let frame = vec![7u8; 32];
        let pcm = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        sink.write_sample(v, &sample(&frame, 0, 333_333)).unwrap();
        sink.write_sample(a, &sample(&pcm, 0, 116_099)).unwrap();
        sink.write_sample(v, &sample(&frame, 333_333, 333_333)).unwrap();
        sink.finalize().unwrap();
        drop(sink);

        let contents = read_dump(&path).unwrap();
        assert!(contents.finalized);
        assert_eq!(contents.streams, vec![(v, video()), (a, audio())]);
        assert_eq!(contents.samples.len(), 3);

        let video_ts: Vec<_> = contents.stream_samples(v).map(|s| s.timestamp).collect();
        assert_eq!(video_ts, vec![0, 333_333]);
        let audio_samples: Vec<_> = contents.stream_samples(a).collect();
        assert_eq!(audio_samples[0].data, pcm);
        assert_eq!(audio_samples[0].duration, 116_099);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rejects_mismatched_video_frame() {
        let path = temp_path("bad-frame");
        let mut sink = DumpSink::create(&path).unwrap();
        let v = sink.add_stream(&video()).unwrap();
        sink.begin_writing().unwrap();

        let sample = Sample {
            data: &[0u8; 31],
            timestamp: 0,
            duration: 1,
        };
        let err = sink.write_sample(v, &sample).unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rejects_partial_audio_frame() {
        let path = temp_path("bad-audio");
        let mut sink = DumpSink::create(&path).unwrap();
        let a = sink.add_stream(&audio()).unwrap();
        sink.begin_writing().unwrap();

        let sample = Sample {
            data: &[0u8; 6],
            timestamp: 0,
            duration: 1,
        };
        let err = sink.write_sample(a, &sample).unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_enforces_write_phases() {
        let path = temp_path("phases");
        let mut sink = DumpSink::create(&path).unwrap();
        assert!(sink.begin_writing().is_err(), "no streams yet");

        let v = sink.add_stream(&video()).unwrap();
        let frame = vec![0u8; 32];
        let sample = Sample {
            data: &frame,
            timestamp: 0,
            duration: 1,
        };
        assert!(sink.write_sample(v, &sample).is_err(), "before begin_writing");

        sink.begin_writing().unwrap();
        assert!(sink.add_stream(&audio()).is_err(), "after begin_writing");
        assert!(sink.write_sample(StreamIndex(9), &sample).is_err(), "unknown stream");

        sink.finalize().unwrap();
        assert!(sink.write_sample(v, &sample).is_err(), "after finalize");
        assert!(sink.finalize().is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unfinalized_dump_reads_partially() {
        let path = temp_path("unfinalized");
        let mut sink = DumpSink::create(&path).unwrap();
        let v = sink.add_stream(&video()).unwrap();
        sink.begin_writing().unwrap();
        let sample = Sample {
            data: &[0u8; 32],
            timestamp: 0,
            duration: 1,
        };
        sink.write_sample(v, &sample).unwrap();
        drop(sink);

        let contents = read_dump(&path).unwrap();
        assert!(!contents.finalized);
        assert_eq!(contents.samples.len(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_factory_creates_parent_directories() {
        let dir = std::env::temp_dir()
            .join("camera-recorder-tests")
            .join(uuid::Uuid::new_v4().to_string());
        let path = dir.join("nested").join("out.samples");

        let mut factory = DumpSinkFactory::new();
        let sink = factory.open(&path);
        assert!(sink.is_ok());
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_read_rejects_foreign_file() {
        let path = temp_path("foreign");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"ftypisom").unwrap();
        assert!(read_dump(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_read_rejects_oversized_sample_length() {
        let path = temp_path("oversized");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut bytes = MAGIC.to_vec();
        bytes.push(VERSION);
        let stream = DumpRecord::Stream {
            index: StreamIndex(0),
            config: video(),
        };
        let record = DumpRecord::Sample {
            stream: StreamIndex(0),
            timestamp: 0,
            duration: 333_333,
            len: u64::MAX / 2,
        };
        bytes.extend(rmp_serde::to_vec(&stream).unwrap());
        bytes.extend(rmp_serde::to_vec(&record).unwrap());
        bytes.extend_from_slice(&[0u8; 32]);
        std::fs::write(&path, &bytes).unwrap();

        let err = read_dump(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Truncated sample data"));

        std::fs::remove_file(&path).ok();
    }
}
