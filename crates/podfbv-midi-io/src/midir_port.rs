//! Hardware MIDI ports through midir.
//!
//! Ports are matched by name prefix ("FBV Express Mk II", "Line 6 Pocket
//! POD"). Both connections live on a dedicated thread for platform
//! thread-safety; input bytes come back over a channel so the bridge can
//! treat the port like any other blocking byte stream.
//!
//! midir does not report unplugging, so the port thread polls the port lists
//! and shuts the connections down once either port has vanished.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use midir::{Ignore, MidiInput, MidiOutput};
use parking_lot::Mutex;
use podfbv_midi::MAX_MESSAGE_LEN;
use tracing::{debug, warn};

use crate::device::{Connector, DeviceHandle, MidiDevice};
use crate::{Error, Result};

const CLIENT_NAME: &str = "podfbv";

/// How often the port thread checks that its ports are still listed.
const PRESENCE_POLL: Duration = Duration::from_millis(250);

enum PortCommand {
    Send([u8; MAX_MESSAGE_LEN], usize),
    Close,
}

/// Names of all input and output ports currently visible to midir.
pub fn list_ports() -> Result<(Vec<String>, Vec<String>)> {
    let input = MidiInput::new(CLIENT_NAME).map_err(|e| Error::Backend(e.to_string()))?;
    let output = MidiOutput::new(CLIENT_NAME).map_err(|e| Error::Backend(e.to_string()))?;
    Ok((input_names(&input), output_names(&output)))
}

fn input_names(input: &MidiInput) -> Vec<String> {
    input
        .ports()
        .iter()
        .filter_map(|p| input.port_name(p).ok())
        .collect()
}

fn output_names(output: &MidiOutput) -> Vec<String> {
    output
        .ports()
        .iter()
        .filter_map(|p| output.port_name(p).ok())
        .collect()
}

fn listed(names: &[String], prefix: &str) -> bool {
    names.iter().any(|name| name.starts_with(prefix))
}

/// Separate clients used only to list ports while the connections are open.
struct Watcher {
    input: MidiInput,
    output: MidiOutput,
}

impl Watcher {
    fn new() -> Result<Self> {
        Ok(Self {
            input: MidiInput::new(CLIENT_NAME).map_err(|e| Error::Backend(e.to_string()))?,
            output: MidiOutput::new(CLIENT_NAME).map_err(|e| Error::Backend(e.to_string()))?,
        })
    }

    fn present(&self, prefix: &str) -> bool {
        listed(&input_names(&self.input), prefix) && listed(&output_names(&self.output), prefix)
    }
}

pub struct MidirConnector {
    prefix: String,
}

impl MidirConnector {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Connector for MidirConnector {
    fn describe(&self) -> String {
        format!("midir:{}", self.prefix)
    }

    fn open(&mut self) -> Result<DeviceHandle> {
        let (byte_tx, byte_rx) = unbounded();
        let (command_tx, command_rx) = bounded(16);
        let (ready_tx, ready_rx) = bounded(1);
        let prefix = self.prefix.clone();

        thread::Builder::new()
            .name(format!("podfbv-midir-{}", self.prefix))
            .spawn(move || port_thread(prefix, byte_tx, command_rx, ready_tx))?;

        let name = ready_rx
            .recv()
            .map_err(|_| Error::Backend("midir port thread exited".to_string()))??;

        let (close_tx, close_rx) = bounded(0);
        Ok(Arc::new(MidirDevice {
            name,
            incoming: byte_rx,
            commands: command_tx,
            closed: AtomicBool::new(false),
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
        }))
    }
}

fn port_thread(
    prefix: String,
    byte_tx: Sender<u8>,
    command_rx: Receiver<PortCommand>,
    ready_tx: Sender<Result<String>>,
) {
    let connected = Watcher::new().and_then(|watcher| Ok((watcher, connect(&prefix, byte_tx)?)));
    let (watcher, (input, mut output)) = match connected {
        Ok(connected) => connected,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };
    let _ = ready_tx.send(Ok(prefix.clone()));

    loop {
        match command_rx.recv_timeout(PRESENCE_POLL) {
            Ok(PortCommand::Send(bytes, len)) => {
                if let Err(e) = output.send(&bytes[..len]) {
                    warn!("midir send to {} failed: {}", prefix, e);
                    break;
                }
            }
            Ok(PortCommand::Close) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !watcher.present(&prefix) {
                    warn!("MIDI port {} disappeared", prefix);
                    break;
                }
            }
        }
    }

    // Dropping the input connection drops the byte sender, which fails the
    // bridge's pending read.
    input.close();
    output.close();
    debug!("midir port thread for {} exited", prefix);
}

fn connect(
    prefix: &str,
    byte_tx: Sender<u8>,
) -> Result<(midir::MidiInputConnection<()>, midir::MidiOutputConnection)> {
    let mut input = MidiInput::new(CLIENT_NAME).map_err(|e| Error::Backend(e.to_string()))?;
    input.ignore(Ignore::All);
    let in_port = input
        .ports()
        .into_iter()
        .find(|p| {
            input
                .port_name(p)
                .map(|n| n.starts_with(prefix))
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::DeviceNotFound(format!("no MIDI input matching '{}'", prefix)))?;

    let output = MidiOutput::new(CLIENT_NAME).map_err(|e| Error::Backend(e.to_string()))?;
    let out_port = output
        .ports()
        .into_iter()
        .find(|p| {
            output
                .port_name(p)
                .map(|n| n.starts_with(prefix))
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::DeviceNotFound(format!("no MIDI output matching '{}'", prefix)))?;

    let input_conn = input
        .connect(
            &in_port,
            "podfbv-in",
            move |_stamp, bytes, _| {
                for byte in bytes {
                    let _ = byte_tx.send(*byte);
                }
            },
            (),
        )
        .map_err(|e| Error::Backend(e.to_string()))?;
    let output_conn = output
        .connect(&out_port, "podfbv-out")
        .map_err(|e| Error::Backend(e.to_string()))?;

    Ok((input_conn, output_conn))
}

struct MidirDevice {
    name: String,
    incoming: Receiver<u8>,
    commands: Sender<PortCommand>,
    closed: AtomicBool,
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
}

impl MidirDevice {
    fn gone(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("MIDI port {} disconnected", self.name),
        )
    }
}

impl MidiDevice for MidirDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "device closed"));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let first = select! {
            recv(self.incoming) -> byte => byte.map_err(|_| self.gone())?,
            recv(self.close_rx) -> _ => {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "device closed"))
            }
        };
        buf[0] = first;
        let mut n = 1;
        while n < buf.len() {
            match self.incoming.try_recv() {
                Ok(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                Err(_) => break,
            }
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "device closed"));
        }
        for chunk in buf.chunks(MAX_MESSAGE_LEN) {
            let mut bytes = [0u8; MAX_MESSAGE_LEN];
            bytes[..chunk.len()].copy_from_slice(chunk);
            self.commands
                .send(PortCommand::Send(bytes, chunk.len()))
                .map_err(|_| self.gone())?;
        }
        Ok(buf.len())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.commands.try_send(PortCommand::Close);
        }
        self.close_tx.lock().take();
    }
}
