use crate::actions::{Action, ActionMap};
use crate::gdf::LoadError;
use crate::recording::Recording;
use crate::registry::DeviceRegistry;
use crate::stream::cursor::StreamCursor;
use crate::stream::detector::EventDetector;
use std::time::Duration;

/// volts -> microvolts, applied to every emitted frame
pub const UNIT_SCALE: f64 = 1e6;

/// Tunables of one streaming session. Durations are converted to sample
/// counts against the recording's sampling rate at load time.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Real-time pacing of the streaming loop
    pub tick_interval: Duration,
    /// Half-width of the window within which a marker counts as "now"
    pub tolerance: Duration,
    /// Minimum distance between two accepted matches
    pub cooldown: Duration,
    /// Leading channels included in each emitted frame
    pub channel_limit: usize,
    /// Initial cursor position, taken modulo the recording length
    pub start_sample: Option<usize>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(4),
            tolerance: Duration::from_millis(100),
            cooldown: Duration::from_secs(2),
            channel_limit: 8,
            start_sample: None,
        }
    }
}

/// Whether a recording is available to stream, checked once per tick
#[derive(Debug)]
pub enum RecordingState {
    NotLoaded,
    Loaded {
        recording: Recording,
        cursor: StreamCursor,
        detector: EventDetector,
    },
    Failed(LoadError),
}

/// Result of one tick of the streaming engine
#[derive(Debug)]
pub enum TickOutcome {
    /// No recording available. A legitimate idle state, not an error.
    Unavailable,
    Sample {
        index: usize,
        channel_values: Vec<f64>,
        trigger: Option<Trigger>,
    },
}

/// A detected event and the device action it produced
#[derive(Debug, Clone)]
pub struct Trigger {
    pub code: u16,
    pub action: Action,
    /// False when the action targeted an unregistered device
    pub applied: bool,
}

/// The streaming core: cursor, detector, action table and device
/// registry under a single owner. One engine per session; the session
/// task drives [`tick`] and owns the engine exclusively.
///
/// [`tick`]: StreamEngine::tick
#[derive(Debug)]
pub struct StreamEngine {
    state: RecordingState,
    actions: ActionMap,
    registry: DeviceRegistry,
    settings: StreamSettings,
}

impl StreamEngine {
    pub fn new(actions: ActionMap, settings: StreamSettings) -> Self {
        Self {
            state: RecordingState::NotLoaded,
            actions,
            registry: DeviceRegistry::default(),
            settings,
        }
    }

    /// Make `recording` the streaming source, deriving the detector's
    /// sample counts from its sampling rate.
    pub fn load(&mut self, recording: Recording) {
        let rate = recording.sampling_rate;
        let cursor = StreamCursor::with_start(
            recording.total_samples(),
            self.settings.start_sample.unwrap_or(0),
        );
        let detector = EventDetector::new(
            samples_for(self.settings.tolerance, rate),
            samples_for(self.settings.cooldown, rate),
            self.actions.codes(),
        );
        self.state = RecordingState::Loaded {
            recording,
            cursor,
            detector,
        };
    }

    /// Record a load failure; every further tick reports Unavailable
    pub fn fail(&mut self, error: LoadError) {
        self.state = RecordingState::Failed(error);
    }

    /// Emit the frame at the cursor, advance, and consult the detector
    /// at the emitted index. Tick k (counted from load) emits sample k
    /// offset by the configured start sample, modulo the length.
    pub fn tick(&mut self) -> TickOutcome {
        let (recording, cursor, detector) = match &mut self.state {
            RecordingState::Loaded {
                recording,
                cursor,
                detector,
            } => (recording, cursor, detector),
            RecordingState::NotLoaded | RecordingState::Failed(_) => {
                return TickOutcome::Unavailable
            }
        };

        let index = cursor.advance();
        let channel_values = recording.frame_at(index, self.settings.channel_limit, UNIT_SCALE);

        let trigger = detector
            .check(index as i64, &recording.events)
            .and_then(|code| self.actions.map(code).map(|action| (code, action)))
            .map(|(code, action)| {
                let applied = self.registry.apply(&action);
                Trigger {
                    code,
                    action,
                    applied,
                }
            });

        TickOutcome::Sample {
            index,
            channel_values,
            trigger,
        }
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn recording(&self) -> Option<&Recording> {
        match &self.state {
            RecordingState::Loaded { recording, .. } => Some(recording),
            _ => None,
        }
    }

    pub fn state(&self) -> &RecordingState {
        &self.state
    }
}

fn samples_for(duration: Duration, sampling_rate: f64) -> i64 {
    (duration.as_secs_f64() * sampling_rate).round() as i64
}
