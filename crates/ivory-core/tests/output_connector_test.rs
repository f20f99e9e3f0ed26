mod common;

use common::{FakeMidiOutputPort, DEFAULT_DEVICE_NAME};
use ivory_core::{ConnectionState, Fault, OutputPortConnector};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn connects_to_device_matching_name_ignoring_case() {
    let port = FakeMidiOutputPort::with_devices(&["Microsoft GS Wavetable Synth", "LOOPMIDI PORT 2"]);
    let sent = Arc::clone(&port.sent);
    let mut connector = OutputPortConnector::new(Box::new(port), "loopMIDI Port 2");

    connector.send_note_on(0, 60, 120);

    assert_eq!(
        connector.state(),
        &ConnectionState::Connected("LOOPMIDI PORT 2".to_string())
    );
    assert_eq!(
        sent.lock().as_slice(),
        &[("LOOPMIDI PORT 2".to_string(), vec![0x90, 60, 120])]
    );
    assert!(connector.last_fault().is_none());
}

#[test]
fn falls_back_to_default_output_when_device_missing() {
    let port = FakeMidiOutputPort::with_devices(&["Some Other Port"]);
    let sent = Arc::clone(&port.sent);
    let mut connector = OutputPortConnector::new(Box::new(port), "loopMIDI Port 2");

    connector.send_note_on(0, 64, 120);
    connector.send_note_off(0, 64, 0);

    assert_eq!(
        connector.state(),
        &ConnectionState::DefaultRoute(DEFAULT_DEVICE_NAME.to_string())
    );
    assert_eq!(connector.device_name(), Some(DEFAULT_DEVICE_NAME));
    let sent = sent.lock();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1, vec![0x80, 64, 0]);
}

#[test]
fn device_lookup_is_lazy_and_happens_once() {
    let port = FakeMidiOutputPort::with_devices(&["loopMIDI Port 2"]);
    let list_calls = Arc::clone(&port.list_calls);
    let mut connector = OutputPortConnector::new(Box::new(port), "loopMIDI Port 2");

    assert_eq!(connector.state(), &ConnectionState::Pending);
    assert_eq!(*list_calls.lock(), 0);

    for note in 60..64 {
        connector.send_note_on(0, note, 100);
    }

    assert_eq!(*list_calls.lock(), 1);
}

#[test]
fn enumeration_failure_leaves_connector_unavailable_but_usable() {
    let port = FakeMidiOutputPort {
        fail_list: true,
        ..FakeMidiOutputPort::default()
    };
    let sent = Arc::clone(&port.sent);
    let mut connector = OutputPortConnector::new(Box::new(port), "loopMIDI Port 2");

    connector.send_note_on(0, 60, 120);
    connector.send_note_off(0, 60, 0);

    assert_eq!(connector.state(), &ConnectionState::Unavailable);
    assert!(matches!(
        connector.last_fault(),
        Some(Fault::OutputUnavailable(_))
    ));
    assert_eq!(connector.fault_count(), 1);
    assert!(sent.lock().is_empty());
}

#[test]
fn failed_open_of_matched_device_does_not_fall_back() {
    let port = FakeMidiOutputPort {
        fail_open: true,
        ..FakeMidiOutputPort::with_devices(&["loopMIDI Port 2"])
    };
    let sent = Arc::clone(&port.sent);
    let mut connector = OutputPortConnector::new(Box::new(port), "loopMIDI Port 2");

    connector.send_note_on(0, 60, 120);

    assert_eq!(connector.state(), &ConnectionState::Unavailable);
    assert!(sent.lock().is_empty());
}

#[test]
fn out_of_range_values_are_recorded_not_sent() {
    let port = FakeMidiOutputPort::with_devices(&["loopMIDI Port 2"]);
    let sent = Arc::clone(&port.sent);
    let mut connector = OutputPortConnector::new(Box::new(port), "loopMIDI Port 2");

    connector.send_note_on(16, 60, 120);
    assert!(matches!(
        connector.take_last_fault(),
        Some(Fault::InvalidMessage(_))
    ));

    connector.send_note_on(0, 200, 120);
    assert!(matches!(
        connector.take_last_fault(),
        Some(Fault::InvalidMessage(_))
    ));
    assert!(sent.lock().is_empty());
}

#[test]
fn send_failures_are_recorded() {
    let port = FakeMidiOutputPort {
        fail_send: true,
        ..FakeMidiOutputPort::with_devices(&["loopMIDI Port 2"])
    };
    let mut connector = OutputPortConnector::new(Box::new(port), "loopMIDI Port 2");

    connector.send_note_off(0, 60, 0);

    assert!(matches!(connector.last_fault(), Some(Fault::Send(_))));
}
