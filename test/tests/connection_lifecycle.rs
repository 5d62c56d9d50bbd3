/// Integration tests for Connection open/close semantics and configuration
/// passthrough
use std::time::{Duration, Instant};

use pvproxy_client::{
    ClientConfig, ConnectError, Connection, ConnectionConfig, ConnectionState, TransportStatus,
    Variable,
};
use pvproxy_shared::PvData;
use pvproxy_test::{fast_config, init_logging, SimTransport};

// ========== Open Tests ==========

#[test]
fn open_twice_fails_without_a_second_context() {
    init_logging();
    let sim = SimTransport::new();
    let connection = Connection::open_with(sim.clone(), fast_config()).unwrap();

    assert_eq!(connection.open(), Err(ConnectError::AlreadyActive));
    assert_eq!(sim.contexts_opened(), 1);
    assert!(connection.is_active());
}

#[test]
fn second_connection_on_the_same_transport_is_refused() {
    let sim = SimTransport::new();
    let first = Connection::open_with(sim.clone(), fast_config()).unwrap();
    let second = Connection::new(sim.clone(), fast_config());

    assert_eq!(second.open(), Err(ConnectError::AlreadyActive));
    assert_eq!(second.state(), ConnectionState::Uninitialized);
    drop(second);
    assert!(first.is_active());
    assert!(sim.is_context_open());
}

#[test]
fn new_connection_does_not_touch_the_transport() {
    let sim = SimTransport::new();
    let connection = Connection::new(sim.clone(), fast_config());
    assert_eq!(connection.state(), ConnectionState::Uninitialized);
    assert!(!sim.is_context_open());
    assert_eq!(connection.pend(), Err(TransportStatus::NoContext));
    assert_eq!(connection.flush(), Err(TransportStatus::NoContext));
}

// ========== Close Tests ==========

#[test]
fn close_is_idempotent() {
    let sim = SimTransport::new();
    let connection = Connection::open_with(sim.clone(), fast_config()).unwrap();

    connection.close().unwrap();
    connection.close().unwrap();
    assert_eq!(connection.state(), ConnectionState::Destroyed);
    assert!(!sim.is_context_open());
    assert_eq!(connection.open(), Err(ConnectError::Closed));
}

#[test]
fn clones_share_one_link() {
    let sim = SimTransport::new();
    let connection = Connection::open_with(sim.clone(), fast_config()).unwrap();
    let clone = connection.clone();

    drop(clone);
    assert!(connection.is_active());
    assert!(sim.is_context_open());

    drop(connection);
    assert!(!sim.is_context_open());
}

#[test]
fn closing_under_live_channels_is_detectable() {
    let sim = SimTransport::new();
    sim.add_record("early:VAL", PvData::scalar(1i32));
    let connection = Connection::open_with(sim.clone(), fast_config()).unwrap();
    let variable = Variable::create(&connection, "early:", "VAL").unwrap();
    assert_eq!(connection.live_channels(), 1);

    connection.close().unwrap();
    assert_eq!(sim.order_violations(), 1);
    assert!(variable.read::<i32>().is_err());
}

// ========== Config Tests ==========

#[test]
fn network_settings_reach_the_transport() {
    let sim = SimTransport::new();
    let config = ClientConfig {
        connection: ConnectionConfig {
            address_list: "192.168.1.255".to_string(),
            auto_address_list: false,
            max_array_bytes: 1 << 20,
            ..ConnectionConfig::default()
        },
        ..fast_config()
    };
    let _connection = Connection::open_with(sim.clone(), config.clone()).unwrap();

    assert_eq!(sim.opened_config(), Some(config.connection));
}

#[test]
fn channels_use_the_configured_priority() {
    let sim = SimTransport::new();
    sim.add_record("p:DEFAULT", PvData::scalar(0u8));
    sim.add_record("p:HIGH", PvData::scalar(0u8));

    {
        let connection = Connection::open_with(sim.clone(), fast_config()).unwrap();
        let _variable = Variable::create(&connection, "p:", "DEFAULT").unwrap();
        assert_eq!(sim.channel_priority("p:DEFAULT"), Some(20));
    }

    let config = ClientConfig {
        channel_priority: 90,
        ..fast_config()
    };
    let connection = Connection::open_with(sim.clone(), config).unwrap();
    let _variable = Variable::create(&connection, "p:", "HIGH").unwrap();
    assert_eq!(sim.channel_priority("p:HIGH"), Some(90));
}

#[test]
fn client_config_defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.pend_timeout, Duration::from_secs(5));
    assert_eq!(config.channel_priority, 20);
    assert_eq!(config.connection, ConnectionConfig::default());
}

#[test]
fn pend_timeout_bounds_channel_search() {
    let sim = SimTransport::new();
    sim.add_record("slow:VAL", PvData::scalar(0i32));
    sim.set_unresponsive("slow:VAL");
    let config = ClientConfig {
        pend_timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let connection = Connection::open_with(sim.clone(), config).unwrap();

    let started = Instant::now();
    let error = Variable::create(&connection, "slow:", "VAL").unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(
        error.to_string(),
        "Failed to create channel for PV slow:VAL: not connected after 50ms"
    );
}
