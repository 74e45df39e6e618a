//! Named, matchable failure kinds for one connection's lifetime (§7, §9).
//! Everything here is local to a single session: nothing here ever tears
//! down the process, and callers that do need process-wide propagation
//! wrap these in `anyhow::Result` at the task boundary.

use orbit::ProtocolError;
use thiserror::Error;

use crate::connection::ConnectionError;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
