use crate::actions::{ActionMap, DeviceEffect, DeviceName};
use crate::gdf;
use crate::protocol::{ActivityEntry, ServerEvent, StatusSnapshot, StreamPhase};
use crate::recording::{Recording, RecordingInfo};
use crate::registry::{Device, DeviceRegistry};
use crate::stream::engine::{StreamEngine, StreamSettings, TickOutcome, Trigger};
use anyhow::Context;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Entries kept in the rolling activity feed
const ACTIVITY_CAPACITY: usize = 50;
/// Broadcast queue depth per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Status published by the streaming task for request handlers to read.
/// The task is the only writer of `devices` while a session runs.
#[derive(Debug, Default)]
struct ViewState {
    phase: StreamPhase,
    session_id: Option<Uuid>,
    recording: Option<RecordingInfo>,
    devices: BTreeMap<DeviceName, Device>,
    activity: VecDeque<ActivityEntry>,
}

struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the single streaming session. Spawns the task that drives the
/// engine, fans events out to subscribers and maintains the status view;
/// request handlers hold this behind an `Arc` and never touch the engine.
pub struct SessionManager {
    events: broadcast::Sender<ServerEvent>,
    view: Arc<RwLock<ViewState>>,
    settings: StreamSettings,
    actions: ActionMap,
    active: Mutex<Option<SessionHandle>>,
}

impl SessionManager {
    pub fn new(settings: StreamSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let view = ViewState {
            devices: DeviceRegistry::default().snapshot(),
            ..ViewState::default()
        };
        Self {
            events,
            view: Arc::new(RwLock::new(view)),
            settings,
            actions: ActionMap::default(),
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Spawn a streaming session for `path`. Refused with an activity
    /// notice while another session is running.
    pub fn start(&self, path: PathBuf) -> bool {
        let mut active = self.active.lock();
        if active
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
        {
            drop(active);
            warn!("session start requested while one is already running");
            self.announce("A streaming session is already running");
            return false;
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        {
            let mut view = self.view.write();
            view.phase = StreamPhase::Loading;
            view.session_id = Some(id);
            view.recording = None;
        }
        info!(session = %id, path = %path.display(), "starting streaming session");

        let task = tokio::spawn(run_session(
            id,
            path,
            self.settings.clone(),
            self.actions.clone(),
            self.events.clone(),
            Arc::clone(&self.view),
            cancel.clone(),
        ));
        *active = Some(SessionHandle { id, cancel, task });
        true
    }

    /// Cancel the active session and wait for its task to finish.
    /// Returns false when no session was running.
    pub async fn stop(&self) -> bool {
        let handle = self.active.lock().take();
        let Some(handle) = handle else {
            return false;
        };

        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            error!(session = %handle.id, "session task failed: {}", e);
        }
        true
    }

    /// Manual device control is disabled by design; tell the viewers why.
    pub fn reject_manual_control(&self) {
        self.announce("Manual control disabled - use brain signals to control devices!");
        let _ = self.events.send(ServerEvent::ErrorMessage {
            message: "Devices are controlled by brain signals only! \
                      Think of motor movements to control them."
                .to_string(),
        });
    }

    /// Append to the activity feed and broadcast the entry
    pub fn announce(&self, message: impl Into<String>) {
        push_activity(&self.view, &self.events, ActivityEntry::now(message));
    }

    pub fn status(&self) -> StatusSnapshot {
        let view = self.view.read();
        StatusSnapshot {
            phase: view.phase.clone(),
            session_id: view.session_id,
            recording: view.recording.clone(),
            devices: view.devices.clone(),
            activity: view.activity.iter().cloned().collect(),
        }
    }

    /// Device table as last published by the streaming task
    pub fn device_status(&self) -> BTreeMap<DeviceName, Device> {
        self.view.read().devices.clone()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.active.get_mut().take() {
            handle.cancel.cancel();
        }
    }
}

async fn run_session(
    id: Uuid,
    path: PathBuf,
    settings: StreamSettings,
    actions: ActionMap,
    events: broadcast::Sender<ServerEvent>,
    view: Arc<RwLock<ViewState>>,
    cancel: CancellationToken,
) {
    let mut engine = StreamEngine::new(actions, settings.clone());

    match load_recording(&path).await {
        Ok(recording) => {
            let recording_info = recording.info();
            info!(
                session = %id,
                channels = recording_info.channel_count,
                samples = recording_info.total_samples,
                rate = recording_info.sampling_rate,
                markers = recording_info.event_count,
                "recording loaded"
            );
            engine.load(recording);

            {
                let mut view = view.write();
                view.phase = StreamPhase::Streaming;
                view.recording = Some(recording_info.clone());
                view.devices = engine.devices().snapshot();
            }
            push_activity(
                &view,
                &events,
                ActivityEntry::now(format!(
                    "Recording loaded - {} streaming started",
                    recording_info.source_name
                )),
            );
            let _ = events.send(ServerEvent::DeviceStatus {
                devices: engine.devices().snapshot(),
            });
        }
        Err(e) => {
            // Terminal for this session; reported once, never retried
            error!(session = %id, "failed to load recording: {:#}", e);
            push_activity(
                &view,
                &events,
                ActivityEntry::now(format!("Failed to load recording: {:#}", e)),
            );
            view.write().phase = StreamPhase::Failed {
                error: format!("{:#}", e),
            };
            return;
        }
    }

    let mut tick = interval(settings.tick_interval);
    loop {
        tokio::select! {
            // Cancellation wins over a pending tick
            biased;

            _ = cancel.cancelled() => {
                info!(session = %id, "streaming session cancelled");
                break;
            }
            _ = tick.tick() => {
                match engine.tick() {
                    TickOutcome::Sample { index, channel_values, trigger } => {
                        let _ = events.send(ServerEvent::SampleTick {
                            timestamp: Utc::now(),
                            channel_values,
                        });
                        if let Some(trigger) = trigger {
                            publish_trigger(id, index, &engine, trigger, &events, &view);
                        }
                    }
                    TickOutcome::Unavailable => {
                        warn!(session = %id, "tick on an unavailable stream");
                        break;
                    }
                }
            }
        }
    }

    {
        let mut view = view.write();
        view.phase = StreamPhase::Idle;
        view.session_id = None;
    }
    push_activity(&view, &events, ActivityEntry::now("Streaming stopped"));
    info!(session = %id, "streaming session finished");
}

async fn load_recording(path: &Path) -> anyhow::Result<Recording> {
    let file = path.to_path_buf();
    let recording = tokio::task::spawn_blocking(move || gdf::load(&file))
        .await
        .context("recording loader task failed")??;
    Ok(recording)
}

fn publish_trigger(
    id: Uuid,
    index: usize,
    engine: &StreamEngine,
    trigger: Trigger,
    events: &broadcast::Sender<ServerEvent>,
    view: &RwLock<ViewState>,
) {
    let Trigger {
        code,
        action,
        applied,
    } = trigger;

    info!(
        session = %id,
        code,
        sample = index,
        class = %action.event_type,
        "motor imagery event detected"
    );

    if !applied {
        warn!(code, target = ?action.target, "action targeted an unregistered device");
        return;
    }

    let devices = engine.devices().snapshot();
    view.write().devices = devices.clone();

    let message = match action.effect {
        DeviceEffect::AllOff => format!(
            "Brain control ({}): all devices switched OFF",
            action.event_type
        ),
        _ => {
            let target = action.target.as_deref().unwrap_or_default();
            let state = if engine.devices().is_on(target).unwrap_or(false) {
                "ON"
            } else {
                "OFF"
            };
            format!(
                "Brain control ({}): {} switched {}",
                action.event_type, target, state
            )
        }
    };

    let _ = events.send(ServerEvent::DeviceStatus { devices });
    push_activity(view, events, ActivityEntry::now(message));
    let _ = events.send(ServerEvent::MotorImageryEvent {
        event_type: action.event_type,
        effect: action.effect,
        device: action.target,
    });
}

fn push_activity(
    view: &RwLock<ViewState>,
    events: &broadcast::Sender<ServerEvent>,
    entry: ActivityEntry,
) {
    {
        let mut view = view.write();
        view.activity.push_back(entry.clone());
        while view.activity.len() > ACTIVITY_CAPACITY {
            view.activity.pop_front();
        }
    }
    let _ = events.send(entry.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn initial_status_is_idle_with_default_devices() {
        let manager = SessionManager::new(StreamSettings::default());
        let status = manager.status();

        assert_eq!(status.phase, StreamPhase::Idle);
        assert_eq!(status.session_id, None);
        assert_eq!(status.devices.len(), 3);
        assert!(status.devices.values().all(|d| !d.is_on));
        assert!(status.activity.is_empty());
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn missing_recording_fails_the_session_once() {
        let manager = SessionManager::new(StreamSettings::default());
        let mut rx = manager.subscribe();
        assert!(manager.start(PathBuf::from("/nonexistent/recording.gdf")));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        match event {
            ServerEvent::ActivityLog { message, .. } => {
                assert!(message.starts_with("Failed to load recording"), "{message}");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        wait_until(|| !manager.is_running()).await;
        assert!(matches!(
            manager.status().phase,
            StreamPhase::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn manual_control_rejection_publishes_notice_and_error() {
        let manager = SessionManager::new(StreamSettings::default());
        let mut rx = manager.subscribe();
        manager.reject_manual_control();

        match rx.recv().await.expect("channel closed") {
            ServerEvent::ActivityLog { message, .. } => {
                assert!(message.contains("Manual control disabled"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.expect("channel closed") {
            ServerEvent::ErrorMessage { message } => {
                assert!(message.contains("brain signals only"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // The rejection also lands in the activity feed for late viewers
        let status = manager.status();
        assert_eq!(status.activity.len(), 1);
    }

    #[tokio::test]
    async fn stop_without_a_session_is_a_no_op() {
        let manager = SessionManager::new(StreamSettings::default());
        assert!(!manager.stop().await);
        assert_eq!(manager.status().phase, StreamPhase::Idle);
    }
}
