/// Integration tests for typed Variable reads and writes
///
/// Type negotiation is exact: a read or write must use the host type that
/// carries the channel's wire type, and shape mismatches fail before any
/// request reaches the transport.
use std::sync::Arc;

use pvproxy_client::{ChannelError, Connection, IoError, TransportStatus, Variable};
use pvproxy_shared::{ChannelState, PvData, WireError, WireType};
use pvproxy_test::{fast_config, init_logging, SimTransport};

fn connect(sim: &Arc<SimTransport>) -> Connection {
    init_logging();
    Connection::open_with(sim.clone(), fast_config()).expect("connection should open")
}

fn sim_with(name: &str, data: PvData) -> Arc<SimTransport> {
    let sim = SimTransport::new();
    sim.add_record(name, data);
    sim
}

// ========== Scalar Tests ==========

#[test]
fn scalar_write_then_read_for_each_host_type() {
    let sim = SimTransport::new();
    sim.add_record("t:short", PvData::scalar(0i16));
    sim.add_record("t:float", PvData::scalar(0f32));
    sim.add_record("t:enum", PvData::scalar(0u16));
    sim.add_record("t:char", PvData::scalar(0u8));
    sim.add_record("t:long", PvData::scalar(0i32));
    sim.add_record("t:ulong", PvData::scalar(0u32));
    sim.add_record("t:text", PvData::scalar(String::new()));
    let connection = connect(&sim);

    let short = Variable::create(&connection, "t:", "short").unwrap();
    short.write(-7i16).unwrap();
    assert_eq!(short.read::<i16>().unwrap(), -7);

    let float = Variable::create(&connection, "t:", "float").unwrap();
    float.write(0.25f32).unwrap();
    assert_eq!(float.read::<f32>().unwrap(), 0.25);

    let enumerated = Variable::create(&connection, "t:", "enum").unwrap();
    enumerated.write(3u16).unwrap();
    assert_eq!(enumerated.read::<u16>().unwrap(), 3);

    let character = Variable::create(&connection, "t:", "char").unwrap();
    character.write(200u8).unwrap();
    assert_eq!(character.read::<u8>().unwrap(), 200);

    let long = Variable::create(&connection, "t:", "long").unwrap();
    long.write(-100_000i32).unwrap();
    assert_eq!(long.read::<i32>().unwrap(), -100_000);

    let ulong = Variable::create(&connection, "t:", "ulong").unwrap();
    ulong.write(4_000_000_000u32).unwrap();
    assert_eq!(ulong.read::<u32>().unwrap(), 4_000_000_000);

    let text = Variable::create(&connection, "t:", "text").unwrap();
    text.write("MOVING".to_string()).unwrap();
    assert_eq!(text.read::<String>().unwrap(), "MOVING");
    assert_eq!(sim.record_value("t:text"), Some(PvData::scalar("MOVING".to_string())));
}

#[test]
fn read_caches_value_and_wire_type() {
    let sim = sim_with("c:VAL", PvData::scalar(9.5f64));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "c:", "VAL").unwrap();

    assert_eq!(variable.wire_type(), Some(WireType::Double));
    assert!(variable.value().is_none());
    variable.read::<f64>().unwrap();
    assert_eq!(variable.value(), Some(PvData::scalar(9.5f64)));
    assert_eq!(variable.channel_state(), ChannelState::Connected);
}

#[test]
fn read_value_uses_negotiated_type() {
    let sim = sim_with("n:VAL", PvData::scalar(12i32));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "n:", "VAL").unwrap();
    assert_eq!(variable.read_value().unwrap(), PvData::Long(vec![12]));
}

// ========== Type Mismatch Tests ==========

#[test]
fn read_with_wrong_host_type_is_rejected() {
    let sim = sim_with("m:VAL", PvData::scalar(1.0f64));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "m:", "VAL").unwrap();

    let error = variable.read::<f32>().unwrap_err();
    assert_eq!(
        error,
        IoError::TypeMismatch {
            name: "m:VAL".to_string(),
            wire_type: WireType::Double,
            requested: WireType::Float,
        }
    );
    assert_eq!(sim.queued_requests(), 0);
}

#[test]
fn write_with_wrong_host_type_leaves_record_untouched() {
    let sim = sim_with("m:VAL", PvData::scalar(1.0f64));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "m:", "VAL").unwrap();

    assert!(matches!(
        variable.write(5i32),
        Err(IoError::TypeMismatch { .. })
    ));
    assert!(matches!(
        variable.write_value(&PvData::scalar(5u16)),
        Err(IoError::TypeMismatch { .. })
    ));
    assert_eq!(sim.record_value("m:VAL"), Some(PvData::scalar(1.0f64)));
}

#[test]
fn unknown_native_type_fails_closed() {
    let sim = SimTransport::new();
    sim.add_raw_record("u:TIME", 14, 1, vec![0; 8]);
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "u:", "TIME").unwrap();

    assert_eq!(variable.wire_type(), None);
    let error = variable.read_value().unwrap_err();
    assert_eq!(
        error,
        IoError::UnsupportedType {
            name: "u:TIME".to_string(),
            tag: 14,
        }
    );
    assert!(matches!(
        variable.write(1.0f64),
        Err(IoError::UnsupportedType { tag: 14, .. })
    ));
}

#[test]
fn overlong_text_is_rejected_before_sending() {
    let sim = sim_with("s:DESC", PvData::scalar("idle".to_string()));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "s:", "DESC").unwrap();

    let error = variable.write("z".repeat(40)).unwrap_err();
    assert!(matches!(
        error,
        IoError::Encoding {
            source: WireError::TextTooLong { len: 40, max: 39 },
            ..
        }
    ));
    assert_eq!(sim.record_value("s:DESC"), Some(PvData::scalar("idle".to_string())));
}

#[test]
fn non_utf8_text_is_read_byte_for_byte() {
    let sim = SimTransport::new();
    let mut payload = vec![0u8; 40];
    payload[..4].copy_from_slice(&[b'd', 0xe9, b'g', 0xb0]);
    sim.add_raw_record("s:UNIT", 0, 1, payload);
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "s:", "UNIT").unwrap();

    assert!(matches!(
        variable.read::<String>(),
        Err(IoError::Encoding {
            source: WireError::InvalidText { .. },
            ..
        })
    ));
    assert_eq!(
        variable.read_text_bytes().unwrap(),
        vec![vec![b'd', 0xe9, b'g', 0xb0]]
    );
    assert_eq!(variable.last_error(), None);
}

#[test]
fn text_bytes_of_numeric_channel_is_a_type_mismatch() {
    let sim = sim_with("n:VAL", PvData::scalar(1i16));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "n:", "VAL").unwrap();
    assert!(matches!(
        variable.read_text_bytes(),
        Err(IoError::TypeMismatch {
            wire_type: WireType::Short,
            requested: WireType::String,
            ..
        })
    ));
}

// ========== Array Tests ==========

#[test]
fn scalar_access_to_array_channel_is_rejected() {
    let sim = sim_with("a:WF", PvData::array(vec![1.0f64, 2.0, 3.0]));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "a:", "WF").unwrap();

    assert_eq!(
        variable.read::<f64>().unwrap_err(),
        IoError::NotScalar {
            name: "a:WF".to_string(),
            count: 3,
        }
    );
    assert!(matches!(
        variable.write(4.0f64),
        Err(IoError::NotScalar { count: 3, .. })
    ));
}

#[test]
fn array_write_then_read() {
    let sim = sim_with("a:WF", PvData::array(vec![0i16; 4]));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "a:", "WF").unwrap();

    variable.write_array(&[1i16, 2, 3, 4]).unwrap();
    assert_eq!(variable.read_array::<i16>().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(variable.element_count().unwrap(), 4);
}

#[test]
fn zero_length_array_reads_empty_without_io() {
    let sim = sim_with("a:EMPTY", PvData::array(Vec::<f64>::new()));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "a:", "EMPTY").unwrap();

    assert_eq!(variable.read_array::<f64>().unwrap(), Vec::<f64>::new());
    assert_eq!(variable.read_value().unwrap(), PvData::Double(Vec::new()));
    assert_eq!(sim.queued_requests(), 0);
}

#[test]
fn extension_type_is_scalar_only() {
    let sim = SimTransport::new();
    sim.add_raw_record("x:COUNTS", WireType::ULong.tag(), 2, vec![0; 8]);
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "x:", "COUNTS").unwrap();

    assert_eq!(
        variable.read_array::<u32>().unwrap_err(),
        IoError::ScalarOnly {
            name: "x:COUNTS".to_string(),
            wire_type: WireType::ULong,
        }
    );
}

// ========== Deferred Tests ==========

#[test]
fn deferred_write_is_applied_on_pend() {
    let sim = sim_with("d:VAL", PvData::scalar(0i32));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "d:", "VAL").unwrap();

    variable.write_deferred(5i32).unwrap();
    assert_eq!(sim.queued_requests(), 1);
    assert_eq!(sim.record_value("d:VAL"), Some(PvData::scalar(0i32)));

    connection.pend().unwrap();
    assert_eq!(sim.record_value("d:VAL"), Some(PvData::scalar(5i32)));
}

#[test]
fn deferred_writes_complete_in_issue_order() {
    let sim = sim_with("d:VAL", PvData::scalar(0i32));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "d:", "VAL").unwrap();

    for value in 1..=3 {
        variable.write_deferred(value).unwrap();
    }
    let pending = variable.read_deferred::<i32>().unwrap();
    variable.pend().unwrap();

    assert_eq!(pending.complete().unwrap(), 3);
    assert_eq!(sim.record_value("d:VAL"), Some(PvData::scalar(3i32)));
}

#[test]
fn deferred_read_completes_after_pend() {
    let sim = sim_with("d:WF", PvData::array(vec![1.5f32, 2.5]));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "d:", "WF").unwrap();

    let pending = variable.read_array_deferred::<f32>().unwrap();
    assert!(!pending.is_confirmed());
    assert_eq!(pending.name(), "d:WF");

    connection.flush().unwrap();
    assert!(pending.is_confirmed());
    assert_eq!(pending.complete().unwrap(), vec![1.5, 2.5]);
}

#[test]
fn deferred_read_completed_early_is_unconfirmed() {
    let sim = sim_with("d:VAL", PvData::scalar(1u8));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "d:", "VAL").unwrap();

    let pending = variable.read_deferred::<u8>().unwrap();
    assert_eq!(
        pending.complete().unwrap_err(),
        IoError::Unconfirmed {
            name: "d:VAL".to_string()
        }
    );
}

// ========== Failure Tests ==========

#[test]
fn refused_write_records_last_error() {
    let sim = SimTransport::new();
    sim.add_read_only_record("r:RBV", PvData::scalar(1.0f64));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "r:", "RBV").unwrap();

    let error = variable.write(2.0f64).unwrap_err();
    assert_eq!(
        error,
        IoError::TransportFailure {
            name: "r:RBV".to_string(),
            status: TransportStatus::NoWriteAccess,
        }
    );
    assert_eq!(variable.last_error(), Some(error.to_string()));

    assert_eq!(variable.read::<f64>().unwrap(), 1.0);
    assert_eq!(variable.last_error(), None);
}

#[test]
fn failed_deferred_write_does_not_fail_another_variable() {
    let sim = SimTransport::new();
    sim.add_read_only_record("dev:A", PvData::scalar(1.0f64));
    sim.add_record("dev:B", PvData::scalar(1.0f64));
    sim.add_record("dev:C", PvData::scalar(3i32));
    let connection = connect(&sim);
    let a = Variable::create(&connection, "dev:", "A").unwrap();
    let b = Variable::create(&connection, "dev:", "B").unwrap();

    a.write_deferred(9.0f64).unwrap();
    b.write(2.0f64).unwrap();
    assert_eq!(b.last_error(), None);
    assert_eq!(sim.record_value("dev:B"), Some(PvData::scalar(2.0f64)));
    assert_eq!(sim.record_value("dev:A"), Some(PvData::scalar(1.0f64)));
    assert_eq!(sim.exceptions_reported(), 1);

    a.write_deferred(9.0f64).unwrap();
    let c = Variable::create(&connection, "dev:", "C").unwrap();
    assert_eq!(c.read::<i32>().unwrap(), 3);
    assert_eq!(sim.exceptions_reported(), 2);
    assert_eq!(connection.live_channels(), 3);
    assert_eq!(sim.live_channel_count(), 3);
}

#[test]
fn failed_read_does_not_fail_another_variables_read() {
    let sim = SimTransport::new();
    sim.add_record("dev:A", PvData::scalar(1.0f64));
    sim.add_record("dev:B", PvData::scalar(5i32));
    let connection = connect(&sim);
    let a = Variable::create(&connection, "dev:", "A").unwrap();
    let b = Variable::create(&connection, "dev:", "B").unwrap();

    let pending = a.read_deferred::<f64>().unwrap();
    sim.disconnect("dev:A");
    assert_eq!(b.read::<i32>().unwrap(), 5);
    assert!(matches!(
        pending.complete(),
        Err(IoError::TransportFailure {
            status: TransportStatus::Disconnected,
            ..
        })
    ));
}

#[test]
fn read_of_disconnected_channel_fails() {
    let sim = sim_with("g:VAL", PvData::scalar(1.0f64));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "g:", "VAL").unwrap();

    sim.disconnect("g:VAL");
    assert_eq!(variable.channel_state(), ChannelState::PreviouslyConnected);
    assert!(matches!(
        variable.read::<f64>(),
        Err(IoError::TransportFailure {
            status: TransportStatus::Disconnected,
            ..
        })
    ));

    sim.reconnect("g:VAL");
    assert_eq!(variable.read::<f64>().unwrap(), 1.0);
}

#[test]
fn missing_channel_is_not_found() {
    let sim = SimTransport::new();
    let connection = connect(&sim);
    let result = Variable::create(&connection, "nope:", "VAL");
    assert!(matches!(result, Err(ChannelError::NotFound { name }) if name == "nope:VAL"));
    assert_eq!(sim.live_channel_count(), 0);
    assert_eq!(connection.live_channels(), 0);
}

#[test]
fn create_on_closed_connection_fails() {
    let sim = SimTransport::new();
    let connection = connect(&sim);
    connection.close().unwrap();
    assert!(matches!(
        Variable::create(&connection, "c:", "VAL"),
        Err(ChannelError::ConnectionClosed { .. })
    ));
}

// ========== Destroy Tests ==========

#[test]
fn destroyed_variable_rejects_everything() {
    let sim = sim_with("k:VAL", PvData::scalar(1.0f64));
    let connection = connect(&sim);
    let variable = Variable::create(&connection, "k:", "VAL").unwrap();

    variable.destroy().unwrap();
    assert!(variable.is_destroyed());
    assert_eq!(variable.channel(), None);
    assert_eq!(variable.channel_state(), ChannelState::Closed);
    assert_eq!(sim.live_channel_count(), 0);

    let destroyed = IoError::Destroyed {
        name: "k:VAL".to_string(),
    };
    assert_eq!(variable.read::<f64>().unwrap_err(), destroyed);
    assert_eq!(variable.write(2.0f64).unwrap_err(), destroyed);
    assert_eq!(variable.destroy().unwrap_err(), destroyed);
    assert_eq!(variable.unsubscribe().unwrap_err(), destroyed);
}
