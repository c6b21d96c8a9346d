pub mod cursor;
pub mod detector;
pub mod engine;
pub mod session;

pub use cursor::StreamCursor;
pub use detector::EventDetector;
pub use engine::{RecordingState, StreamEngine, StreamSettings, TickOutcome, Trigger, UNIT_SCALE};
pub use session::SessionManager;
