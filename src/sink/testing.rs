//! Recording sink for tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{Sample, SampleSink, SinkError, SinkFactory, StreamConfig, StreamIndex};
use crate::mux::{ClockUnits, StreamKind};

#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub stream: StreamIndex,
    pub timestamp: ClockUnits,
    pub duration: ClockUnits,
    pub len: usize,
    pub ok: bool,
}

/// Everything the mock sinks saw, shared with the test
#[derive(Debug, Default)]
pub struct MockLog {
    pub opened: Vec<PathBuf>,
    pub streams: Vec<StreamConfig>,
    pub begin_writing: usize,
    pub writes: Vec<WriteCall>,
    pub finalized: usize,
}

impl MockLog {
    pub fn stream_writes(&self, stream: StreamIndex) -> Vec<&WriteCall> {
        self.writes.iter().filter(|w| w.stream == stream).collect()
    }
}

/// Failure injection for the mock sink
#[derive(Debug, Default, Clone)]
pub struct MockBehavior {
    pub fail_open: bool,
    pub fail_add_stream: Option<StreamKind>,
    pub fail_begin_writing: bool,
    /// Zero-based write call numbers (across all streams) that fail
    pub fail_writes: Vec<usize>,
    pub fail_finalize: bool,
}

pub struct MockSinkFactory {
    pub log: Arc<Mutex<MockLog>>,
    pub behavior: Arc<Mutex<MockBehavior>>,
}

impl MockSinkFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(MockLog::default())),
            behavior: Arc::new(Mutex::new(MockBehavior::default())),
        }
    }
}

impl SinkFactory for MockSinkFactory {
    fn open(&mut self, output_path: &Path) -> Result<Box<dyn SampleSink>, SinkError> {
        if self.behavior.lock().unwrap().fail_open {
            return Err(SinkError::Open(format!("{:?}", output_path)));
        }
        self.log.lock().unwrap().opened.push(output_path.to_path_buf());
        Ok(Box::new(MockSink {
            log: self.log.clone(),
            behavior: self.behavior.clone(),
            next_index: 0,
        }))
    }
}

struct MockSink {
    log: Arc<Mutex<MockLog>>,
    behavior: Arc<Mutex<MockBehavior>>,
    next_index: u32,
}

impl SampleSink for MockSink {
    fn add_stream(&mut self, config: &StreamConfig) -> Result<StreamIndex, SinkError> {
        if self.behavior.lock().unwrap().fail_add_stream == Some(config.kind()) {
            return Err(SinkError::Rejected(format!("{} stream", config.kind())));
        }
        self.log.lock().unwrap().streams.push(*config);
        let index = StreamIndex(self.next_index);
        self.next_index += 1;
        Ok(index)
    }

    fn begin_writing(&mut self) -> Result<(), SinkError> {
        if self.behavior.lock().unwrap().fail_begin_writing {
            return Err(SinkError::Rejected("begin writing".into()));
        }
        self.log.lock().unwrap().begin_writing += 1;
        Ok(())
    }

    fn write_sample(&mut self, stream: StreamIndex, sample: &Sample<'_>) -> Result<(), SinkError> {
        let mut log = self.log.lock().unwrap();
        let call = log.writes.len();
        let ok = !self.behavior.lock().unwrap().fail_writes.contains(&call);
        log.writes.push(WriteCall {
            stream,
            timestamp: sample.timestamp,
            duration: sample.duration,
            len: sample.data.len(),
            ok,
        });
        if ok {
            Ok(())
        } else {
            Err(SinkError::Rejected(format!("write {}", call)))
        }
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.log.lock().unwrap().finalized += 1;
        if self.behavior.lock().unwrap().fail_finalize {
            return Err(SinkError::Rejected("finalize".into()));
        }
        Ok(())
    }
}
