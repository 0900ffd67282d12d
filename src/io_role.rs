//! Reader and writer roles: the only code that touches a device.
//!
//! Device I/O always happens with the pipeline mutex released so a slow or
//! blocked device never stalls the other direction.

use std::io;

use parking_lot::MutexGuard;
use podfbv_midi::{FrameStatus, Framer, Message, Tic};
use podfbv_midi_io::{DeviceHandle, MidiDevice};
use tracing::{debug, error, trace, warn};

use crate::role::{Endpoint, Role, RoleHandle};

/// Read bytes from `device` until `framer` completes a message.
///
/// The message is stamped with the time the read that delivered its first
/// byte returned. Unsupported status bytes are skipped one at a time.
pub fn read_message(device: &dyn MidiDevice, framer: &mut Framer) -> io::Result<Message> {
    loop {
        let n = match device.read(framer.spare()) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "device returned no data",
                ))
            }
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        match framer.advance(n, Tic::now()) {
            FrameStatus::Complete(msg) => return Ok(msg),
            FrameStatus::Incomplete => {}
            FrameStatus::Resync => debug!("{}: unsupported byte skipped", device.name()),
        }
    }
}

/// Reader role for `endpoint`: device → input slot.
pub fn run_reader(handle: RoleHandle, endpoint: Endpoint, device: DeviceHandle) {
    let role = handle.role();
    debug_assert_eq!(role, endpoint.input_role());
    debug!("{} started on {}", role, device.name());

    let mut framer = Framer::new();
    let mut guard = handle.lock();
    loop {
        while handle.is_running(&guard) && !guard.slots.input(endpoint).is_free() {
            handle.wait(&mut guard);
        }
        if !handle.is_running(&guard) {
            break;
        }

        let read = MutexGuard::unlocked(&mut guard, || read_message(&*device, &mut framer));
        let mut msg = match read {
            Ok(msg) => msg,
            Err(err) if !handle.is_running(&guard) => {
                debug!("{}: {} closed ({})", role, device.name(), err);
                break;
            }
            Err(err) => {
                warn!("{}: read from {} failed: {}", role, device.name(), err);
                break;
            }
        };
        if !handle.is_running(&guard) {
            break;
        }

        trace!("{} read {:?}", role, msg);
        if let Err(err) = guard.slots.input(endpoint).publish(&mut msg) {
            // Only this role fills the slot and it was free before the read.
            error!("{}: {}", role, err);
            break;
        }
        handle.notify(Role::Control);
    }
    handle.exit(guard);
}

/// Writer role for `endpoint`: output slot → device.
pub fn run_writer(handle: RoleHandle, endpoint: Endpoint, device: DeviceHandle) {
    let role = handle.role();
    debug_assert_eq!(role, endpoint.output_role());
    debug!("{} started on {}", role, device.name());

    let mut guard = handle.lock();
    loop {
        while handle.is_running(&guard) && guard.slots.output(endpoint).is_free() {
            handle.wait(&mut guard);
        }
        if !handle.is_running(&guard) {
            break;
        }
        let Some(msg) = guard.slots.output(endpoint).pending().copied() else {
            continue;
        };

        let written = MutexGuard::unlocked(&mut guard, || device.write_all(msg.as_bytes()));
        match written {
            Ok(()) => {}
            Err(err) if !handle.is_running(&guard) => {
                debug!("{}: {} closed ({})", role, device.name(), err);
                break;
            }
            Err(err) => {
                warn!("{}: write to {} failed: {}", role, device.name(), err);
                break;
            }
        }

        trace!("{} wrote {:?}", role, msg);
        guard.slots.output(endpoint).consume();
        handle.notify(Role::Control);
    }
    handle.exit(guard);
}
