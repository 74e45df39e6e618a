pub mod clock;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod sim;
pub mod session;
pub mod snapshot;
pub mod types;

pub use clock::{Clock, FakeClock, RealClock, Ticker};
pub use error::{ProtocolError, QueueError};
pub use protocol::{parse_client_message, parse_server_message, ClientMessage, ServerMessage};
pub use queue::{CommandQueue, QueuedCommand};
pub use sim::{has_mismatch, step};
pub use session::{new_default_session, Session};
pub use snapshot::{Snapshot, SnapshotManager};
pub use types::*;
