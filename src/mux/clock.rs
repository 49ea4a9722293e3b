use crate::sink::StreamIndex;

use super::ClockUnits;

/// Per-stream clock cursor for one session
#[derive(Debug, Clone)]
pub struct StreamClock {
    index: StreamIndex,
    nominal_duration: ClockUnits,
    cursor: ClockUnits,
    samples: u64,
}

impl StreamClock {
    pub fn new(index: StreamIndex, nominal_duration: ClockUnits) -> Self {
        Self {
            index,
            nominal_duration,
            cursor: 0,
            samples: 0,
        }
    }

    /// Take the timestamp for the next sample and move the cursor past it
    pub fn advance(&mut self, duration: ClockUnits) -> ClockUnits {
        let timestamp = self.cursor;
        self.cursor = self.cursor.saturating_add(duration);
        self.samples += 1;
        timestamp
    }

    pub fn index(&self) -> StreamIndex {
        self.index
    }

    pub fn nominal_duration(&self) -> ClockUnits {
        self.nominal_duration
    }

    /// Timestamp the next sample will receive
    pub fn cursor(&self) -> ClockUnits {
        self.cursor
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}
