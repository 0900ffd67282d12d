//! Supervisor lifecycle integration tests
//!
//! Opening with backoff, total resets on device loss, reconnects, stop
//! requests and fatal connector errors.

use std::io;

use podfbv::io::Error as DeviceError;
use podfbv::{Error, Role};

use crate::helpers::*;

#[test]
fn test_unplug_resets_everything_and_reconnects() {
    let (rig, fbv, pod) = Rig::running(true);

    // Move the state away from its defaults so the reset is visible
    pod.send(&[0xC0, 0x0A]);
    rig.wait_for_state("bank sync", |state| state.bank == 2);

    fbv.unplug();
    // The healthy POD is closed too: resets are total
    wait_until("POD closed", || pod.is_closed());
    assert!(fbv.is_closed());

    let fbv2 = rig.fbv_plug.plug();
    let pod2 = rig.pod_plug.plug();
    rig.wait_for_generation(2);

    let state = rig.snapshot().state;
    assert_eq!(state.bank, 0);
    assert_eq!(state.button, None);

    fbv2.send(&[0xB0, 0x14, 0x7F]);
    let msg = pod2.recv_message(TIMEOUT).expect("no message after reconnect");
    assert_eq!(msg.as_bytes(), &[0xC0, 0x01]);

    // Nothing went to the old device after it was closed
    assert!(pod.recv_message(QUIET).is_none());
    rig.stop().unwrap();
}

#[test]
fn test_pod_unplug_resets() {
    let (rig, fbv, pod) = Rig::running(true);
    // Replacements are already waiting, so the reopen succeeds at once
    let fbv2 = rig.fbv_plug.plug();
    let pod2 = rig.pod_plug.plug();

    pod.unplug();
    rig.wait_for_generation(2);
    assert!(fbv.is_closed());

    fbv2.send(&[0xB0, 0x66, 0x7F]);
    let msg = pod2.recv_message(TIMEOUT).expect("no message after reconnect");
    assert_eq!(msg.as_bytes(), &[0xB0, 0x2B, 0x40]);
    rig.stop().unwrap();
}

#[test]
fn test_without_retry_run_ends_after_reset() {
    let (rig, fbv, pod) = Rig::running(false);

    pod.unplug();
    pod.send(&[0xC0, 0x01]);
    fbv.send(&[0xB0, 0x14, 0x7F]);

    let fbv_plug = rig.fbv_plug.clone();
    rig.join().unwrap();
    assert_eq!(fbv_plug.opens(), 1);
    assert!(fbv.is_closed());
}

#[test]
fn test_open_retries_with_backoff() {
    let rig = Rig::start(true);

    wait_until("several open attempts", || rig.fbv_plug.opens() >= 3);
    assert_eq!(rig.pod_plug.opens(), 0);
    assert_eq!(rig.snapshot().generation, 0);

    let _fbv = rig.fbv_plug.plug();
    wait_until("POD open attempts", || rig.pod_plug.opens() >= 2);
    let fbv_opens = rig.fbv_plug.opens();
    let _pod = rig.pod_plug.plug();
    rig.wait_for_generation(1);

    // The FBV stayed open while the POD was retried
    assert_eq!(rig.fbv_plug.opens(), fbv_opens);
    rig.stop().unwrap();
}

#[test]
fn test_open_failure_without_retry_is_an_error() {
    let rig = Rig::start(false);
    let err = rig.join().unwrap_err();
    assert!(matches!(err, Error::Device(DeviceError::DeviceNotFound(_))));
}

#[test]
fn test_fatal_connector_error_aborts() {
    let rig = Rig::start(true);
    let fbv = rig.fbv_plug.plug();
    rig.pod_plug.fail_next(DeviceError::Probe {
        device: "pod".into(),
        attempts: 5,
        source: io::Error::other("no response"),
    });

    let err = rig.join().unwrap_err();
    assert!(matches!(err, Error::Device(DeviceError::Probe { .. })));
    assert!(fbv.is_closed());
}

#[test]
fn test_stop_request_tears_down() {
    let (rig, fbv, pod) = Rig::running(true);
    let handle = rig.handle.clone();

    rig.stop().unwrap();

    let snapshot = handle.snapshot();
    assert!(snapshot.stop_requested);
    for role in Role::ALL {
        assert!(!snapshot.running[role], "{} still running", role);
    }
    assert!(fbv.is_closed());
    assert!(pod.is_closed());
}

#[test]
fn test_stop_while_waiting_for_devices() {
    let rig = Rig::start(true);
    wait_until("first open attempt", || rig.fbv_plug.opens() >= 1);

    assert!(!rig.handle.is_stop_requested());
    rig.stop().unwrap();
}

#[test]
fn test_every_role_stops_before_reopen() {
    let (rig, fbv, pod) = Rig::running(true);

    fbv.unplug();
    wait_until("teardown", || {
        let snapshot = rig.snapshot();
        Role::ALL.iter().all(|role| !snapshot.running[*role])
    });
    wait_until("POD closed", || pod.is_closed());
    // No devices queued: generation 2 cannot start
    assert_eq!(rig.snapshot().generation, 1);
    rig.stop().unwrap();
}
