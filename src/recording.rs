use serde::{Deserialize, Serialize};

/// An annotation at a fixed point in the recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMarker {
    pub sample_index: usize,
    pub code: u16,
}

/// One loaded recording: channel-major sample matrix plus its event table.
/// Built once by a loader and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Channel-major samples, in volts. All channels have equal length.
    pub samples: Vec<Vec<f64>>,
    /// Event markers sorted ascending by sample_index, all within
    /// [0, total_samples).
    pub events: Vec<EventMarker>,
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    pub channel_names: Vec<String>,
    /// File name the recording was loaded from (display only)
    pub source_name: String,
}

impl Recording {
    pub fn total_samples(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.samples.len()
    }

    /// Column of the sample matrix at `index`, restricted to the first
    /// `channel_limit` channels and multiplied by `scale`.
    pub fn frame_at(&self, index: usize, channel_limit: usize, scale: f64) -> Vec<f64> {
        self.samples
            .iter()
            .take(channel_limit)
            .map(|ch| ch[index] * scale)
            .collect()
    }

    /// Display summary published to viewers and the status endpoint
    pub fn info(&self) -> RecordingInfo {
        RecordingInfo {
            source_name: self.source_name.clone(),
            channel_count: self.channel_count(),
            total_samples: self.total_samples(),
            sampling_rate: self.sampling_rate,
            event_count: self.events.len(),
            duration_secs: self.total_samples() as f64 / self.sampling_rate,
        }
    }
}

/// Read-only recording summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub source_name: String,
    pub channel_count: usize,
    pub total_samples: usize,
    pub sampling_rate: f64,
    pub event_count: usize,
    pub duration_secs: f64,
}
