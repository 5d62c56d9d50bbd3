//! # Pvproxy Shared
//! Wire type table, host type mapping and connection configuration used by
//! the pvproxy client and its transports.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod connection_config;
mod types;
mod wire;

pub use connection_config::ConnectionConfig;
pub use types::{ChannelId, ChannelState, SubscriptionId};
pub use wire::{
    error::WireError,
    pv_data::PvData,
    pv_type::{decode_array, decode_scalar, decode_text_bytes, PvType},
    wire_type::{TypeEntry, WireType, MAX_STRING_SIZE, TYPE_TABLE},
};
