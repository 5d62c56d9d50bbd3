use thiserror::Error;

use crate::{
    connection::ConnectError,
    subscription::SubscribeError,
    transport::TransportStatus,
    variable::{ChannelError, IoError},
};

/// Errors that can occur while initializing a Device. No partially
/// initialized Device is ever returned alongside one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    /// The connection could not be opened
    #[error("Failed to initialize device {device}: {source}")]
    Connect {
        device: String,
        #[source]
        source: ConnectError,
    },

    /// One of the variables could not be created
    #[error("Failed to initialize device {device} at {variable}: {source}")]
    Channel {
        device: String,
        variable: String,
        #[source]
        source: ChannelError,
    },

    /// The same field was listed twice
    #[error("Failed to initialize device {device}: field {field} listed twice")]
    DuplicateField { device: String, field: String },
}

/// Errors that can occur while operating on an initialized Device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No variable with this short name
    #[error("PV {field} not found on device {device}")]
    NotFound { device: String, field: String },

    /// `read_all` stopped at this variable
    #[error("Reading device {device} failed at {variable}: {source}")]
    Read {
        device: String,
        variable: String,
        #[source]
        source: IoError,
    },

    /// Single-variable I/O failed
    #[error("I/O on {variable} of device {device} failed: {source}")]
    Io {
        device: String,
        variable: String,
        #[source]
        source: IoError,
    },

    /// Installing a monitor failed
    #[error("Monitoring {variable} of device {device} failed: {source}")]
    Subscribe {
        device: String,
        variable: String,
        #[source]
        source: SubscribeError,
    },

    /// A variable could not be destroyed cleanly during teardown
    #[error("Tearing down {variable} of device {device} failed: {source}")]
    Teardown {
        device: String,
        variable: String,
        #[source]
        source: IoError,
    },

    /// Subscriptions left in the registry could not be cancelled
    #[error("Cancelling remaining subscriptions of device {device} failed: {status}")]
    Registry { device: String, status: TransportStatus },

    /// Closing the connection failed
    #[error("Closing the connection of device {device} failed: {source}")]
    Close {
        device: String,
        #[source]
        source: ConnectError,
    },
}
