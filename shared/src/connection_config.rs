use std::{default::Default, time::Duration};

/// Network settings handed to the transport once, when a connection opens.
///
/// Nothing in the client re-reads these after `Connection::open`. A native
/// binding typically exports them through [`ConnectionConfig::environment`]
/// before creating its context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Space separated list of server addresses to search
    pub address_list: String,
    /// Whether to add the local broadcast addresses to the search list
    pub auto_address_list: bool,
    /// Silence period after which a server is considered gone
    pub connection_timeout: Duration,
    /// Expected period between server beacons
    pub beacon_period: Duration,
    pub repeater_port: u16,
    pub server_port: u16,
    /// Upper bound on the payload of a single array transfer
    pub max_array_bytes: usize,
    /// Local time zone offset, in minutes west of UTC
    pub timezone_offset_minutes: i32,
}

impl ConnectionConfig {
    /// Renders the settings as the environment variables understood by
    /// Channel Access client libraries.
    pub fn environment(&self) -> Vec<(&'static str, String)> {
        let yes_no = |flag: bool| if flag { "YES" } else { "NO" }.to_string();

        vec![
            ("EPICS_CA_ADDR_LIST", self.address_list.clone()),
            ("EPICS_CA_AUTO_ADDR_LIST", yes_no(self.auto_address_list)),
            (
                "EPICS_CA_CONN_TMO",
                format!("{:.1}", self.connection_timeout.as_secs_f64()),
            ),
            (
                "EPICS_CA_BEACON_PERIOD",
                format!("{:.1}", self.beacon_period.as_secs_f64()),
            ),
            ("EPICS_CA_REPEATER_PORT", self.repeater_port.to_string()),
            ("EPICS_CA_SERVER_PORT", self.server_port.to_string()),
            ("EPICS_CA_MAX_ARRAY_BYTES", self.max_array_bytes.to_string()),
            ("EPICS_TS_MIN_WEST", self.timezone_offset_minutes.to_string()),
        ]
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address_list: String::new(),
            auto_address_list: true,
            connection_timeout: Duration::from_secs(30),
            beacon_period: Duration::from_secs(15),
            repeater_port: 5065,
            server_port: 5064,
            max_array_bytes: 16384,
            timezone_offset_minutes: 0,
        }
    }
}
