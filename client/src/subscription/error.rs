use thiserror::Error;

use pvproxy_shared::ChannelState;

use crate::{transport::TransportStatus, variable::IoError};

/// Errors that can occur when installing a monitor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    /// Monitors need a channel that has been connected at least once
    #[error("Cannot subscribe to {name}: channel is {state}")]
    NotConnected { name: String, state: ChannelState },

    /// The variable cannot be used (destroyed, unsupported type, ...)
    #[error(transparent)]
    Io(#[from] IoError),

    /// The transport refused or failed to confirm the monitor
    #[error("Failed to subscribe to {name}: {status}")]
    Transport { name: String, status: TransportStatus },
}
