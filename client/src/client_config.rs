use std::{default::Default, time::Duration};

use pvproxy_shared::ConnectionConfig;

/// Contains Config properties which will be used by a Connection and every
/// Variable created under it
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Network settings passed to the transport when the connection opens
    pub connection: ConnectionConfig,
    /// How long a blocking operation waits for the transport to confirm
    pub pend_timeout: Duration,
    /// Priority requested for every channel
    pub channel_priority: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            pend_timeout: Duration::from_secs(5),
            channel_priority: 20,
        }
    }
}
