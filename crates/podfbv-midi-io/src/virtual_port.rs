//! In-memory MIDI devices.
//!
//! A [`VirtualDevice`] is what the bridge sees; its [`VirtualPeer`] plays the
//! hardware: it injects the bytes the device "sends" and collects the bytes
//! the bridge writes. [`VirtualConnector`] hands out devices that were
//! plugged in through its [`VirtualPlug`], which makes unplug/replug
//! sequences scriptable.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use podfbv_midi::{FrameStatus, Framer, Message, Tic};
use tracing::debug;

use crate::device::{Connector, DeviceHandle, MidiDevice};
use crate::{Error, Result};

pub struct VirtualDevice {
    name: String,
    incoming: Receiver<u8>,
    outgoing: Sender<u8>,
    closed: Arc<AtomicBool>,
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
}

/// The far end of a [`VirtualDevice`].
pub struct VirtualPeer {
    name: String,
    to_device: Mutex<Option<Sender<u8>>>,
    from_device: Mutex<Option<Receiver<u8>>>,
    closed: Arc<AtomicBool>,
}

fn disconnected(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("virtual device {} disconnected", name),
    )
}

impl VirtualDevice {
    pub fn pair(name: impl Into<String>) -> (VirtualDevice, VirtualPeer) {
        let name = name.into();
        let (to_device, incoming) = unbounded();
        let (outgoing, from_device) = unbounded();
        let (close_tx, close_rx) = bounded(0);
        let closed = Arc::new(AtomicBool::new(false));

        let device = VirtualDevice {
            name: name.clone(),
            incoming,
            outgoing,
            closed: Arc::clone(&closed),
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
        };
        let peer = VirtualPeer {
            name,
            to_device: Mutex::new(Some(to_device)),
            from_device: Mutex::new(Some(from_device)),
            closed,
        };
        (device, peer)
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(io::Error::new(io::ErrorKind::NotConnected, "device closed"))
        } else {
            Ok(())
        }
    }
}

impl MidiDevice for VirtualDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let first = select! {
            recv(self.incoming) -> byte => byte.map_err(|_| disconnected(&self.name))?,
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
        self.check_open()?;
        for byte in buf {
            self.outgoing
                .send(*byte)
                .map_err(|_| disconnected(&self.name))?;
        }
        Ok(buf.len())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Virtual device {} closed", self.name);
        }
        self.close_tx.lock().take();
    }
}

impl VirtualPeer {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes the device will return from `read`. `false` once unplugged.
    pub fn send(&self, bytes: &[u8]) -> bool {
        let guard = self.to_device.lock();
        match guard.as_ref() {
            Some(tx) => bytes.iter().all(|b| tx.send(*b).is_ok()),
            None => false,
        }
    }

    pub fn send_message(&self, msg: &Message) -> bool {
        self.send(msg.as_bytes())
    }

    /// Next complete message written by the bridge, framed the same way the
    /// bridge frames its input. Unsupported bytes are skipped.
    pub fn recv_message(&self, timeout: Duration) -> Option<Message> {
        let guard = self.from_device.lock();
        let rx = guard.as_ref()?;
        let deadline = Instant::now() + timeout;
        let mut framer = Framer::new();
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let byte = match rx.recv_timeout(remaining) {
                Ok(byte) => byte,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            };
            framer.spare()[0] = byte;
            if let FrameStatus::Complete(msg) = framer.advance(1, Tic::now()) {
                return Some(msg);
            }
        }
    }

    /// Everything written so far, without waiting.
    pub fn drain(&self) -> Vec<u8> {
        let guard = self.from_device.lock();
        match guard.as_ref() {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Simulate pulling the cable: pending reads fail once drained and
    /// writes fail immediately.
    pub fn unplug(&self) {
        self.to_device.lock().take();
        self.from_device.lock().take();
    }

    /// Whether the bridge closed its side.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Hands out devices queued through the matching [`VirtualPlug`].
pub struct VirtualConnector {
    name: String,
    queue: Receiver<Result<VirtualDevice>>,
    opens: Arc<AtomicUsize>,
}

/// Test-side handle that "plugs in" devices for a [`VirtualConnector`].
#[derive(Clone)]
pub struct VirtualPlug {
    name: String,
    queue: Sender<Result<VirtualDevice>>,
    opens: Arc<AtomicUsize>,
}

impl VirtualConnector {
    pub fn new(name: impl Into<String>) -> (VirtualConnector, VirtualPlug) {
        let name = name.into();
        let (tx, rx) = unbounded();
        let opens = Arc::new(AtomicUsize::new(0));
        (
            VirtualConnector {
                name: name.clone(),
                queue: rx,
                opens: Arc::clone(&opens),
            },
            VirtualPlug {
                name,
                queue: tx,
                opens,
            },
        )
    }
}

impl Connector for VirtualConnector {
    fn describe(&self) -> String {
        format!("virtual:{}", self.name)
    }

    fn open(&mut self) -> Result<DeviceHandle> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.queue.try_recv() {
            Ok(Ok(device)) => Ok(Arc::new(device)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::DeviceNotFound(self.describe())),
        }
    }
}

impl VirtualPlug {
    /// Queue a fresh device for the next `open` and return its peer.
    pub fn plug(&self) -> VirtualPeer {
        let (device, peer) = VirtualDevice::pair(self.name.clone());
        let _ = self.queue.send(Ok(device));
        peer
    }

    /// Make the next `open` fail with `err`.
    pub fn fail_next(&self, err: Error) {
        let _ = self.queue.send(Err(err));
    }

    /// Number of `open` calls so far, successful or not.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}
