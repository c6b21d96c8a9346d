//! GDF 2.x recording loader.
//!
//! Reads the subset of the GDF format used by motor imagery datasets
//! (BCI Competition IV 2a and friends): one fixed 256-byte header, one
//! 256-byte header per channel stored field-major, record-major sample
//! data, and an optional trailing event table.

use crate::recording::{EventMarker, Recording};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced while loading a recording file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("recording not found: {0}")]
    Missing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Cue annotation types (GDF) and the compact codes the action table uses
const CUE_CODE_ALIASES: [(u16, u16); 4] = [(769, 7), (770, 8), (771, 9), (772, 10)];

const FIXED_HEADER_LEN: usize = 256;
const CHANNEL_HEADER_LEN: usize = 256;

#[derive(Debug, Clone)]
struct GdfHeader {
    version: String,    // 8 bytes ascii, "GDF 2.xx"
    header_blocks: u16, // total header length in 256-byte blocks
    record_count: i64,
    duration_num: u32, // record duration in seconds, as a fraction
    duration_den: u32,
    channel_count: u16,
}

#[derive(Debug, Clone)]
struct GdfChannel {
    label: String, // 16 bytes
    physical_min: f64,
    physical_max: f64,
    digital_min: f64,
    digital_max: f64,
    samples_per_record: u32,
    sample_type: u32,
}

impl GdfChannel {
    fn gain(&self) -> f64 {
        (self.physical_max - self.physical_min) / (self.digital_max - self.digital_min)
    }

    fn offset(&self) -> f64 {
        self.physical_min - self.digital_min * self.gain()
    }
}

/// Load a GDF 2.x file into an immutable [`Recording`].
///
/// Sample values are scaled to physical units (volts) per channel; cue
/// annotation types 769..=772 are normalized to the compact codes 7..=10.
pub fn load(path: &Path) -> LoadResult<Recording> {
    if !path.is_file() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = parse_fixed_header(&mut reader)?;
    debug!(
        version = %header.version,
        channels = header.channel_count,
        records = header.record_count,
        "parsed GDF fixed header"
    );

    let channels = parse_channel_headers(&mut reader, header.channel_count as usize)?;

    // Anything between the channel headers and the first data record
    // (GDF 2.2+ tag-length-value section) is skipped.
    let consumed = FIXED_HEADER_LEN + channels.len() * CHANNEL_HEADER_LEN;
    let declared = header.header_blocks as usize * 256;
    if declared < consumed {
        return Err(LoadError::InvalidData(format!(
            "declared header length {} shorter than {} bytes of headers",
            declared, consumed
        )));
    }
    skip_bytes(&mut reader, declared - consumed)?;

    let spr = uniform_samples_per_record(&channels)?;
    let record_count = usize::try_from(header.record_count)
        .map_err(|_| LoadError::InvalidData("record count is unknown or negative".into()))?;
    let total_samples = record_count * spr as usize;
    if total_samples == 0 {
        return Err(LoadError::InvalidData("recording has no samples".into()));
    }

    let samples = read_data_records(&mut reader, &channels, record_count, spr)?;
    let events = read_event_table(&mut reader, total_samples)?;

    let sampling_rate =
        spr as f64 * header.duration_den as f64 / header.duration_num as f64;

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Recording {
        samples,
        events,
        sampling_rate,
        channel_names: channels.into_iter().map(|ch| ch.label).collect(),
        source_name,
    })
}

fn parse_fixed_header<R: Read>(reader: &mut R) -> LoadResult<GdfHeader> {
    let mut buf = [0u8; FIXED_HEADER_LEN];
    reader
        .read_exact(&mut buf)
        .map_err(|_| LoadError::UnsupportedFormat("file shorter than a GDF header".into()))?;

    let version = trimmed_string(&buf[0..8]);
    if version.starts_with("GDF 1") {
        return Err(LoadError::UnsupportedFormat(
            "GDF 1.x recordings are not supported".into(),
        ));
    }
    if !version.starts_with("GDF 2") {
        return Err(LoadError::UnsupportedFormat(format!(
            "not a GDF 2.x file (version id {:?})",
            version
        )));
    }

    let header = GdfHeader {
        version,
        header_blocks: u16_le(&buf, 184),
        record_count: i64_le(&buf, 236),
        duration_num: u32_le(&buf, 244),
        duration_den: u32_le(&buf, 248),
        channel_count: u16_le(&buf, 252),
    };

    if header.channel_count == 0 {
        return Err(LoadError::InvalidData("recording has no channels".into()));
    }
    if header.duration_num == 0 || header.duration_den == 0 {
        return Err(LoadError::InvalidData("record duration is zero".into()));
    }

    Ok(header)
}

/// Channel headers are stored field-major: all labels, then all
/// transducer strings, and so on. Offsets below are the start of each
/// field array within the `NS * 256` byte block.
fn parse_channel_headers<R: Read>(reader: &mut R, ns: usize) -> LoadResult<Vec<GdfChannel>> {
    let mut buf = vec![0u8; ns * CHANNEL_HEADER_LEN];
    reader
        .read_exact(&mut buf)
        .map_err(|_| LoadError::InvalidData("truncated channel headers".into()))?;

    let mut channels = Vec::with_capacity(ns);
    for i in 0..ns {
        let channel = GdfChannel {
            label: trimmed_string(&buf[i * 16..(i + 1) * 16]),
            physical_min: f64_le(&buf, 104 * ns + i * 8),
            physical_max: f64_le(&buf, 112 * ns + i * 8),
            digital_min: f64_le(&buf, 120 * ns + i * 8),
            digital_max: f64_le(&buf, 128 * ns + i * 8),
            samples_per_record: u32_le(&buf, 216 * ns + i * 4),
            sample_type: u32_le(&buf, 220 * ns + i * 4),
        };

        if (channel.digital_max - channel.digital_min).abs() < f64::EPSILON {
            return Err(LoadError::InvalidData(format!(
                "channel {:?} has a degenerate digital range",
                channel.label
            )));
        }

        channels.push(channel);
    }

    Ok(channels)
}

fn uniform_samples_per_record(channels: &[GdfChannel]) -> LoadResult<u32> {
    let spr = channels[0].samples_per_record;
    if spr == 0 {
        return Err(LoadError::InvalidData(
            "channel declares zero samples per record".into(),
        ));
    }
    if channels.iter().any(|ch| ch.samples_per_record != spr) {
        return Err(LoadError::UnsupportedFormat(
            "channels with varying samples per record are not supported".into(),
        ));
    }
    Ok(spr)
}

/// Data records are record-major, channel-major within a record.
fn read_data_records<R: Read>(
    reader: &mut R,
    channels: &[GdfChannel],
    record_count: usize,
    spr: u32,
) -> LoadResult<Vec<Vec<f64>>> {
    let total = record_count * spr as usize;
    let mut samples: Vec<Vec<f64>> = channels
        .iter()
        .map(|_| Vec::with_capacity(total))
        .collect();
    let widths = channels
        .iter()
        .map(|ch| sample_width(ch.sample_type))
        .collect::<LoadResult<Vec<_>>>()?;

    let mut scratch = Vec::new();
    for _ in 0..record_count {
        for (idx, channel) in channels.iter().enumerate() {
            let width = widths[idx];
            scratch.resize(spr as usize * width, 0);
            reader
                .read_exact(&mut scratch)
                .map_err(|_| LoadError::InvalidData("truncated data records".into()))?;

            let gain = channel.gain();
            let offset = channel.offset();
            for raw in scratch.chunks_exact(width) {
                let digital = decode_sample(raw, channel.sample_type);
                samples[idx].push(digital * gain + offset);
            }
        }
    }

    Ok(samples)
}

/// Trailing event table: mode byte, 24-bit event count, event sample
/// rate, then position/type arrays (mode 3 adds channel and duration
/// arrays). Absent table means no events.
fn read_event_table<R: Read>(reader: &mut R, total_samples: usize) -> LoadResult<Vec<EventMarker>> {
    let mut mode_byte = [0u8; 1];
    match reader.read_exact(&mut mode_byte) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    }
    let mode = mode_byte[0];
    if mode != 1 && mode != 3 {
        return Err(LoadError::UnsupportedFormat(format!(
            "unsupported event table mode {}",
            mode
        )));
    }

    let mut head = [0u8; 7];
    reader
        .read_exact(&mut head)
        .map_err(|_| LoadError::InvalidData("truncated event table header".into()))?;
    let count = u32::from_le_bytes([head[0], head[1], head[2], 0]) as usize;
    // head[3..7]: event sample rate, implied equal to the signal rate here

    let mut positions = vec![0u8; count * 4];
    reader
        .read_exact(&mut positions)
        .map_err(|_| LoadError::InvalidData("truncated event positions".into()))?;
    let mut types = vec![0u8; count * 2];
    reader
        .read_exact(&mut types)
        .map_err(|_| LoadError::InvalidData("truncated event types".into()))?;
    if mode == 3 {
        // channel (u16) and duration (u32) arrays, unused here
        skip_bytes(reader, count * 6)?;
    }

    let mut markers = Vec::with_capacity(count);
    for i in 0..count {
        let position = u32_le(&positions, i * 4);
        let raw_type = u16_le(&types, i * 2);

        // Positions are 1-based on disk
        if position == 0 {
            warn!("dropping event marker with zero position");
            continue;
        }
        let sample_index = position as usize - 1;
        if sample_index >= total_samples {
            warn!(
                sample_index,
                total_samples, "dropping event marker outside the recording"
            );
            continue;
        }

        markers.push(EventMarker {
            sample_index,
            code: normalize_code(raw_type),
        });
    }

    markers.sort_by_key(|m| m.sample_index);
    Ok(markers)
}

fn normalize_code(raw: u16) -> u16 {
    CUE_CODE_ALIASES
        .iter()
        .find(|(r, _)| *r == raw)
        .map(|(_, code)| *code)
        .unwrap_or(raw)
}

fn sample_width(sample_type: u32) -> LoadResult<usize> {
    match sample_type {
        1 | 2 => Ok(1),
        3 | 4 => Ok(2),
        5 | 6 | 16 => Ok(4),
        7 | 8 | 17 => Ok(8),
        other => Err(LoadError::UnsupportedFormat(format!(
            "unsupported GDF sample type {}",
            other
        ))),
    }
}

fn decode_sample(bytes: &[u8], sample_type: u32) -> f64 {
    match sample_type {
        1 => bytes[0] as i8 as f64,
        2 => bytes[0] as f64,
        3 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
        4 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
        5 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        6 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        7 => i64_le(bytes, 0) as f64,
        8 => u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]) as f64,
        16 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        // sample_width admits only 17 here
        _ => f64_le(bytes, 0),
    }
}

fn skip_bytes<R: Read>(reader: &mut R, len: usize) -> LoadResult<()> {
    let copied = std::io::copy(&mut reader.take(len as u64), &mut std::io::sink())?;
    if copied as usize != len {
        return Err(LoadError::InvalidData("file ends inside the header".into()));
    }
    Ok(())
}

fn trimmed_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn i64_le(buf: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}

fn f64_le(buf: &[u8], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}
