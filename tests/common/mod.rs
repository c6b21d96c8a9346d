#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;

/// Builds minimal GDF 2.x files for loader and streaming tests.
///
/// Two int16 channels by default: "EEG-C3" ramps 0,1,2,.. and "EEG-C4"
/// holds a constant 50. Physical range -100..100 over digital
/// -1000..1000 gives a gain of 0.1 with zero offset.
pub struct GdfFixture {
    pub channels: Vec<(String, Vec<i16>)>,
    pub samples_per_record: u32,
    pub record_count: i64,
    /// Record duration in seconds as a (numerator, denominator) fraction
    pub duration: (u32, u32),
    pub physical_range: (f64, f64),
    pub digital_range: (f64, f64),
    /// (1-based position, raw event type)
    pub events: Vec<(u32, u16)>,
    pub event_mode: u8,
    pub include_event_table: bool,
}

impl GdfFixture {
    pub fn new(samples_per_record: u32, record_count: i64) -> Self {
        let total = samples_per_record as usize * record_count as usize;
        let ramp: Vec<i16> = (0..total).map(|s| s as i16).collect();
        let constant = vec![50i16; total];
        Self {
            channels: vec![
                ("EEG-C3".to_string(), ramp),
                ("EEG-C4".to_string(), constant),
            ],
            samples_per_record,
            record_count,
            duration: (1, 1),
            physical_range: (-100.0, 100.0),
            digital_range: (-1000.0, 1000.0),
            events: Vec::new(),
            event_mode: 1,
            include_event_table: true,
        }
    }

    pub fn with_events(mut self, events: Vec<(u32, u16)>) -> Self {
        self.events = events;
        self
    }

    pub fn with_event_mode(mut self, mode: u8) -> Self {
        self.event_mode = mode;
        self
    }

    pub fn without_event_table(mut self) -> Self {
        self.include_event_table = false;
        self
    }

    /// Serialize the fixture into GDF 2.x bytes
    pub fn bytes(&self) -> Vec<u8> {
        let ns = self.channels.len();
        let mut buf = vec![0u8; 256 + ns * 256];

        // Fixed header
        buf[0..8].copy_from_slice(b"GDF 2.20");
        put_u16(&mut buf, 184, 1 + ns as u16);
        put_i64(&mut buf, 236, self.record_count);
        put_u32(&mut buf, 244, self.duration.0);
        put_u32(&mut buf, 248, self.duration.1);
        put_u16(&mut buf, 252, ns as u16);

        // Channel headers, field-major
        for (i, (label, _)) in self.channels.iter().enumerate() {
            let label_bytes = label.as_bytes();
            buf[256 + i * 16..256 + i * 16 + label_bytes.len()].copy_from_slice(label_bytes);
            put_f64(&mut buf, 256 + 104 * ns + i * 8, self.physical_range.0);
            put_f64(&mut buf, 256 + 112 * ns + i * 8, self.physical_range.1);
            put_f64(&mut buf, 256 + 120 * ns + i * 8, self.digital_range.0);
            put_f64(&mut buf, 256 + 128 * ns + i * 8, self.digital_range.1);
            put_u32(&mut buf, 256 + 216 * ns + i * 4, self.samples_per_record);
            put_u32(&mut buf, 256 + 220 * ns + i * 4, 3); // int16
        }

        // Data records, record-major, channel-major within each record
        let spr = self.samples_per_record as usize;
        for record in 0..self.record_count as usize {
            for (_, samples) in &self.channels {
                for s in 0..spr {
                    buf.extend_from_slice(&samples[record * spr + s].to_le_bytes());
                }
            }
        }

        // Event table
        if self.include_event_table {
            buf.push(self.event_mode);
            buf.extend_from_slice(&(self.events.len() as u32).to_le_bytes()[0..3]);
            let rate =
                self.samples_per_record as f32 * self.duration.1 as f32 / self.duration.0 as f32;
            buf.extend_from_slice(&rate.to_le_bytes());
            for (position, _) in &self.events {
                buf.extend_from_slice(&position.to_le_bytes());
            }
            for (_, raw_type) in &self.events {
                buf.extend_from_slice(&raw_type.to_le_bytes());
            }
            if self.event_mode == 3 {
                for _ in &self.events {
                    buf.extend_from_slice(&0u16.to_le_bytes()); // channel
                }
                for _ in &self.events {
                    buf.extend_from_slice(&1u32.to_le_bytes()); // duration
                }
            }
        }

        buf
    }

    pub fn into_tempfile(&self) -> NamedTempFile {
        write_bytes(&self.bytes())
    }
}

/// Write raw bytes to a .gdf temp file
pub fn write_bytes(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".gdf")
        .tempfile()
        .expect("failed to create temp file");
    file.write_all(bytes).expect("failed to write fixture");
    file.flush().expect("failed to flush fixture");
    file
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_i64(buf: &mut [u8], offset: usize, value: i64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_f64(buf: &mut [u8], offset: usize, value: f64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
