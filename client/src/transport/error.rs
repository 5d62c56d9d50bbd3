use thiserror::Error;

/// Completion status reported by a transport for a failed request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportStatus {
    /// No server answered for the requested name
    #[error("No server hosts the requested channel")]
    ChannelNotFound,

    /// The request was not confirmed within the pend period
    #[error("Request was not confirmed before the pend timeout")]
    Timeout,

    /// The channel handle is unknown to the transport
    #[error("Unknown or already cleared channel handle")]
    BadChannel,

    /// The subscription handle is unknown to the transport
    #[error("Unknown or already cancelled subscription handle")]
    BadSubscription,

    /// The channel lost its server
    #[error("Channel is disconnected")]
    Disconnected,

    /// A context already exists for this transport
    #[error("A transport context is already active")]
    ContextActive,

    /// No context has been created, or it was already destroyed
    #[error("No active transport context")]
    NoContext,

    /// Requested type does not match the channel
    #[error("Transport rejected type tag {tag}")]
    BadType { tag: i16 },

    /// Requested more elements than the channel holds
    #[error("Requested {requested} elements but the channel holds {available}")]
    BadCount { requested: usize, available: usize },

    /// Server refused the write
    #[error("No write access to channel")]
    NoWriteAccess,

    /// Any other native status
    #[error("Transport failure (status {code}): {message}")]
    Other { code: i32, message: String },
}
