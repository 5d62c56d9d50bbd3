//! # Pvproxy Client
//! A client-side proxy for named process variables. A [`Device`] groups
//! [`Variable`]s that share a name prefix and one [`Connection`]; each
//! Variable reads, writes and monitors a single remote channel through a
//! [`Transport`].

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod client_config;
mod connection;
mod device;
mod subscription;
mod transport;
mod variable;

pub use pvproxy_shared::{
    ChannelId, ChannelState, ConnectionConfig, PvData, PvType, SubscriptionId, WireError,
    WireType,
};

pub use client_config::ClientConfig;
pub use connection::{ConnectError, Connection, ConnectionState};
pub use device::{Device, DeviceError, InitError};
pub use subscription::{
    CallbackRouter, ContextToken, MonitorHandler, MonitorUpdate, Route, SubscribeError,
    SubscriptionHandle, SubscriptionRegistry,
};
pub use transport::{
    Completion, EventStatus, ExceptionCallback, ExceptionEvent, GetReply, MonitorCallback,
    MonitorEvent, PutReply, Transport, TransportStatus,
};
pub use variable::{ChannelError, IoError, PendingRead, Variable};
