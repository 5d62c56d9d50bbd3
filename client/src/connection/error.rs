use thiserror::Error;

use crate::transport::TransportStatus;

/// Errors that can occur when opening or closing a Connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// `open` called on a connection that is already active
    #[error("Connection is already active. A process may only hold one active transport context")]
    AlreadyActive,

    /// `open` called on a connection that was closed
    #[error("Connection was closed and cannot be reopened")]
    Closed,

    /// The transport refused to create its context
    #[error("Failed to establish transport link: {status}")]
    Transport { status: TransportStatus },
}
