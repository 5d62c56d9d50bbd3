use std::time::Duration;

use thiserror::Error;

use pvproxy_shared::{WireError, WireType};

use crate::transport::TransportStatus;

/// Errors that can occur while creating a Variable's channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// No server hosts a variable of this name
    #[error("Failed to create channel for PV {name}: no such variable upstream")]
    NotFound { name: String },

    /// The search was not answered within the pend period
    #[error("Failed to create channel for PV {name}: not connected after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The owning connection is not active
    #[error("Failed to create channel for PV {name}: connection is not active")]
    ConnectionClosed { name: String },

    /// Any other transport failure
    #[error("Failed to create channel for PV {name}: {status}")]
    Transport { name: String, status: TransportStatus },
}

/// Errors that can occur during typed I/O on a Variable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// The requested host type does not carry the negotiated wire type
    #[error("Type mismatch on PV {name}: channel is {wire_type}, value is {requested}")]
    TypeMismatch {
        name: String,
        wire_type: WireType,
        requested: WireType,
    },

    /// The channel negotiated a type outside the type table
    #[error("Unsupported data type (tag {tag}) on PV {name}. The supported data types are: d, f, t, s, h, A40_c, l")]
    UnsupportedType { name: String, tag: i16 },

    /// Scalar access to a channel whose element count is not one
    #[error("The element count for PV {name} is {count}, not 1")]
    NotScalar { name: String, count: usize },

    /// Array access to a scalar-only wire type
    #[error("PV {name} is {wire_type}, which only supports scalar access")]
    ScalarOnly { name: String, wire_type: WireType },

    /// The Variable was already destroyed
    #[error("PV {name} was already destroyed")]
    Destroyed { name: String },

    /// The owning connection was closed
    #[error("PV {name} belongs to a connection that is no longer active")]
    ConnectionClosed { name: String },

    /// The transport did not confirm the request within the pend period
    #[error("I/O on PV {name} was not confirmed within {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// A deferred read was completed before any flush confirmed it
    #[error("Deferred read on PV {name} has not been confirmed yet")]
    Unconfirmed { name: String },

    /// The payload could not be encoded or decoded
    #[error("Payload for PV {name} rejected: {source}")]
    Encoding {
        name: String,
        #[source]
        source: WireError,
    },

    /// The transport reported a failure status
    #[error("Transport failure on PV {name}: {status}")]
    TransportFailure { name: String, status: TransportStatus },
}

impl IoError {
    pub(crate) fn from_status(name: &str, status: TransportStatus, timeout: Duration) -> Self {
        match status {
            TransportStatus::Timeout => IoError::Timeout {
                name: name.to_string(),
                timeout,
            },
            status => IoError::TransportFailure {
                name: name.to_string(),
                status,
            },
        }
    }

    pub(crate) fn encoding(name: &str, source: WireError) -> Self {
        IoError::Encoding {
            name: name.to_string(),
            source,
        }
    }
}
