//! Translation integration tests
//!
//! Messages go in at one virtual device and the test checks what comes out
//! of the other, with all five roles running.

use podfbv::prelude::*;

use crate::helpers::*;

fn recv(peer: &podfbv::VirtualPeer) -> Vec<u8> {
    peer.recv_message(TIMEOUT)
        .expect("no message arrived")
        .as_bytes()
        .to_vec()
}

#[test]
fn test_button_selects_preset_then_taps() {
    let (rig, fbv, pod) = Rig::running(false);

    fbv.send(&[0xB0, 0x14, 0x7F]);
    assert_eq!(recv(&pod), vec![0xC0, 0x01]);

    // Release produces nothing; pressing the active button again taps
    fbv.send(&[0xB0, 0x14, 0x00]);
    fbv.send(&[0xB0, 0x14, 0x7F]);
    assert_eq!(recv(&pod), vec![0xB0, 0x40, 0x7F]);

    fbv.send(&[0xB0, 0x17, 0x7F]);
    assert_eq!(recv(&pod), vec![0xC0, 0x04]);

    assert!(pod.recv_message(QUIET).is_none());
    assert!(fbv.recv_message(QUIET).is_none());
    rig.stop().unwrap();
}

#[test]
fn test_pedals_are_filtered() {
    let (rig, fbv, pod) = Rig::running(false);

    for value in [1, 2, 3, 10] {
        fbv.send(&[0xB0, 0x07, value]);
    }
    assert_eq!(recv(&pod), vec![0xB0, 0x07, 2]);
    assert_eq!(recv(&pod), vec![0xB0, 0x07, 10]);

    // Expression is remapped; its hysteresis is independent of volume
    fbv.send(&[0xB0, 0x0B, 0x01]);
    fbv.send(&[0xB0, 0x0B, 0x40]);
    fbv.send(&[0xB0, 0x0B, 0x41]);
    assert_eq!(recv(&pod), vec![0xB0, 0x04, 0x40]);

    assert!(pod.recv_message(QUIET).is_none());
    rig.stop().unwrap();
}

#[test]
fn test_foot_switch_and_noise() {
    let (rig, fbv, pod) = Rig::running(false);

    // Clock, note on and an unknown controller are all dropped
    fbv.send(&[0xF8, 0x90, 0x40, 0x40]);
    fbv.send(&[0xB0, 0x50, 0x7F]);
    fbv.send(&[0xB0, 0x66, 0x7F]);
    assert_eq!(recv(&pod), vec![0xB0, 0x2B, 0x40]);

    fbv.send(&[0xB0, 0x66, 0x00]);
    assert_eq!(recv(&pod), vec![0xB0, 0x2B, 0x00]);

    assert!(pod.recv_message(QUIET).is_none());
    rig.stop().unwrap();
}

#[test]
fn test_pod_program_change_syncs_buttons() {
    let (rig, fbv, pod) = Rig::running(false);

    pod.send_message(&Message::program_change(7));
    rig.wait_for_state("bank sync", |state| {
        state.bank == 1 && state.button == Some(Button::C)
    });

    fbv.send(&[0xB0, 0x16, 0x7F]);
    assert_eq!(recv(&pod), vec![0xB0, 0x40, 0x7F]);

    fbv.send(&[0xB0, 0x15, 0x7F]);
    assert_eq!(recv(&pod), vec![0xC0, 0x06]);

    // Nothing is ever sent back to the FBV
    pod.send(&[0xB0, 0x07, 0x7F]);
    assert!(fbv.recv_message(QUIET).is_none());
    rig.stop().unwrap();
}

#[test]
fn test_button_timestamps_recorded() {
    let (rig, fbv, pod) = Rig::running(false);
    let start = rig.snapshot().state.pressed[0];

    fbv.send(&[0xB0, 0x14, 0x7F]);
    assert_eq!(recv(&pod), vec![0xC0, 0x01]);
    fbv.send(&[0xB0, 0x14, 0x00]);
    rig.wait_for_state("release timestamp", |state| state.released[0] > start);

    let state = rig.snapshot().state;
    assert!(state.pressed[0] >= start);
    assert!(state.released[0] >= state.pressed[0]);
    assert_eq!(state.pressed[1], start);
    rig.stop().unwrap();
}

#[test]
fn test_messages_split_across_reads() {
    let (rig, fbv, pod) = Rig::running(false);

    fbv.send(&[0xB0]);
    std::thread::sleep(std::time::Duration::from_millis(20));
    fbv.send(&[0x15]);
    std::thread::sleep(std::time::Duration::from_millis(20));
    fbv.send(&[0x7F]);
    assert_eq!(recv(&pod), vec![0xC0, 0x02]);
    rig.stop().unwrap();
}
