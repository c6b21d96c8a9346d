use crate::actions::{DeviceEffect, DeviceName, ImageryClass};
use crate::recording::RecordingInfo;
use crate::registry::Device;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One entry in the rolling activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl ActivityEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// Events pushed to every connected viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// One sample frame, microvolts per channel
    SampleTick {
        timestamp: DateTime<Utc>,
        channel_values: Vec<f64>,
    },

    /// Full device table, sent after every change and once on connect
    DeviceStatus {
        devices: BTreeMap<DeviceName, Device>,
    },

    /// Human-readable feed entry
    ActivityLog {
        timestamp: DateTime<Utc>,
        message: String,
    },

    /// A recognized motor imagery event and the action it mapped to
    MotorImageryEvent {
        event_type: ImageryClass,
        effect: DeviceEffect,
        device: Option<DeviceName>,
    },

    /// User-facing rejection or protocol error
    ErrorMessage { message: String },
}

impl From<ActivityEntry> for ServerEvent {
    fn from(entry: ActivityEntry) -> Self {
        ServerEvent::ActivityLog {
            timestamp: entry.timestamp,
            message: entry.message,
        }
    }
}

/// Commands viewers may send over the socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Start streaming; `recording` overrides the configured path
    StartSession {
        #[serde(default)]
        recording: Option<String>,
    },

    /// Stop the active session
    StopSession,

    /// Always rejected: devices follow brain signals only
    SetDevice {
        device: DeviceName,
        #[serde(default)]
        on: Option<bool>,
    },
}

/// Lifecycle of the single streaming session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum StreamPhase {
    #[default]
    Idle,
    Loading,
    Streaming,
    Failed { error: String },
}

/// Read-only view served by `/api/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub phase: StreamPhase,
    pub session_id: Option<Uuid>,
    pub recording: Option<RecordingInfo>,
    pub devices: BTreeMap<DeviceName, Device>,
    pub activity: Vec<ActivityEntry>,
}
