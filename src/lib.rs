pub mod actions;
pub mod config;
pub mod gdf;
pub mod protocol;
pub mod recording;
pub mod registry;
pub mod server;
pub mod stream;

pub use actions::{Action, ActionMap, DeviceEffect, DeviceName, ImageryClass};
pub use config::{ConfigError, ServerConfig};
pub use gdf::{LoadError, LoadResult};
pub use protocol::{ActivityEntry, ClientCommand, ServerEvent, StatusSnapshot, StreamPhase};
pub use recording::{EventMarker, Recording, RecordingInfo};
pub use registry::{Device, DeviceRegistry};
pub use server::{build_router, handle_websocket, AppState};
pub use stream::{SessionManager, StreamEngine, StreamSettings};
