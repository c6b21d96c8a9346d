use crate::recording::EventMarker;

/// Scans the event table for a recognized marker inside a tolerance
/// window around the cursor, with a cooldown that converts a multi-tick
/// marker into a single logical trigger.
#[derive(Debug, Clone)]
pub struct EventDetector {
    tolerance_samples: i64,
    cooldown_samples: i64,
    recognized: Vec<u16>,
    last_triggered: i64,
}

impl EventDetector {
    pub fn new(tolerance_samples: i64, cooldown_samples: i64, recognized: Vec<u16>) -> Self {
        Self {
            tolerance_samples,
            cooldown_samples,
            recognized,
            // Sentinel below zero so a marker at the very start of the
            // recording can fire on the first check.
            last_triggered: -cooldown_samples,
        }
    }

    /// Return at most one recognized code whose marker lies within
    /// `[current - tolerance, current + tolerance]`. Candidates with
    /// unrecognized codes are discarded before the tie-break; among the
    /// remainder the first in ascending sample order wins. On a match
    /// the cooldown clock restarts at `current`.
    ///
    /// Indices are absolute: a window spanning the wraparound boundary
    /// is not stitched together, and after the cursor wraps the cooldown
    /// gate keeps suppressing until the cursor passes the old trigger
    /// point again. Recordings are long enough relative to the window
    /// and cooldown that neither gap matters in practice.
    pub fn check(&mut self, current: i64, events: &[EventMarker]) -> Option<u16> {
        if current - self.last_triggered < self.cooldown_samples {
            return None;
        }

        let window_start = current - self.tolerance_samples;
        let window_end = current + self.tolerance_samples;

        // The table is sorted by sample index
        let first_in_window =
            events.partition_point(|e| (e.sample_index as i64) < window_start);
        let code = events[first_in_window..]
            .iter()
            .take_while(|e| (e.sample_index as i64) <= window_end)
            .map(|e| e.code)
            .find(|code| self.recognized.contains(code))?;

        self.last_triggered = current;
        Some(code)
    }

    pub fn last_triggered(&self) -> i64 {
        self.last_triggered
    }
}
