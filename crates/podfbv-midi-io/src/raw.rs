//! ALSA raw MIDI devices (`/dev/snd/midiC<card>D0`).
//!
//! USB MIDI devices get a fresh card number every time they are plugged in,
//! so they are addressed through the stable symlinks in `/dev/snd/by-id`,
//! which point at the card's `controlC<card>` node.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::device::{Connector, DeviceHandle, DeviceId, MidiDevice};
use crate::{Error, Result};

pub const SND_ROOT: &str = "/dev/snd";

/// How often a blocked read re-checks whether the device was closed.
const POLL_INTERVAL_MS: libc::c_int = 100;

const PROBE_ATTEMPTS: u32 = 5;
const PROBE_DELAY: Duration = Duration::from_millis(100);

const CONTROL_NODE: &str = "controlC";

/// Resolve a `/dev/snd/by-id` name to the card's raw MIDI node.
pub fn resolve_by_id(id: &str) -> Result<PathBuf> {
    resolve_by_id_in(Path::new(SND_ROOT), id)
}

/// [`resolve_by_id`] against an arbitrary `/dev/snd`-like directory.
pub fn resolve_by_id_in(root: &Path, id: &str) -> Result<PathBuf> {
    if id.is_empty() || id.contains('/') {
        return Err(Error::InvalidDeviceId(id.to_string()));
    }

    let by_id = root.join("by-id");
    let link = by_id.join(id);
    let target = fs::read_link(&link)
        .map_err(|_| Error::DeviceNotFound(link.display().to_string()))?;
    let target = target
        .to_str()
        .ok_or_else(|| Error::InvalidDeviceId(target.display().to_string()))?;

    let pos = target
        .find(CONTROL_NODE)
        .ok_or_else(|| Error::DeviceNotFound(format!("{} -> {}", link.display(), target)))?;
    let card: u32 = target[pos + CONTROL_NODE.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .map_err(|_| Error::InvalidDeviceId(target.to_string()))?;

    Ok(by_id.join(format!("{}midiC{}D0", &target[..pos], card)))
}

pub struct RawMidiDevice {
    name: String,
    file: File,
    closed: AtomicBool,
}

impl RawMidiDevice {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            name: path.display().to_string(),
            file,
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(io::Error::new(io::ErrorKind::NotConnected, "device closed"))
        } else {
            Ok(())
        }
    }

    /// Wait for input, waking up periodically to notice `close()`.
    fn wait_readable(&self) -> io::Result<()> {
        loop {
            self.check_open()?;
            let mut pfd = libc::pollfd {
                fd: self.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: `pfd` is a valid pollfd for the duration of the call and
            // the descriptor stays open as long as `self.file` lives.
            let rc = unsafe { libc::poll(&mut pfd, 1, POLL_INTERVAL_MS) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if rc > 0 {
                // POLLHUP/POLLERR surface as an error or EOF from read()
                return Ok(());
            }
        }
    }
}

impl MidiDevice for RawMidiDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.wait_readable()?;
        (&self.file).read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        (&self.file).write(buf)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Opens a raw MIDI device, resolving its by-id name on every attempt.
pub struct RawMidiConnector {
    id: DeviceId,
    root: PathBuf,
    probe: bool,
}

impl RawMidiConnector {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            root: PathBuf::from(SND_ROOT),
            probe: false,
        }
    }

    /// Some devices (the POD) need a moment after open before they accept
    /// output. When enabled, `open` retries an empty write a few times and
    /// reopens in between; running out of attempts is a fatal error.
    pub fn probe(mut self, probe: bool) -> Self {
        self.probe = probe;
        self
    }

    /// Directory used in place of `/dev/snd`.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn path(&self) -> Result<PathBuf> {
        match &self.id {
            DeviceId::Path(path) => Ok(path.clone()),
            DeviceId::Id(id) => resolve_by_id_in(&self.root, id),
        }
    }

    fn probe_output(path: &Path, mut device: RawMidiDevice) -> Result<RawMidiDevice> {
        let mut last_err = None;
        for attempt in 1..=PROBE_ATTEMPTS {
            thread::sleep(PROBE_DELAY);
            match device.write(&[]) {
                Ok(_) => return Ok(device),
                Err(err) => {
                    debug!(
                        "Probe {} of {} failed ({}), reopening",
                        attempt,
                        path.display(),
                        err
                    );
                    last_err = Some(err);
                }
            }
            drop(device);
            device = RawMidiDevice::open(path).map_err(|source| Error::Probe {
                device: path.display().to_string(),
                attempts: attempt,
                source,
            })?;
        }
        Err(Error::Probe {
            device: path.display().to_string(),
            attempts: PROBE_ATTEMPTS,
            source: last_err.unwrap_or_else(|| io::Error::other("device never probed")),
        })
    }
}

impl Connector for RawMidiConnector {
    fn describe(&self) -> String {
        self.id.to_string()
    }

    fn open(&mut self) -> Result<DeviceHandle> {
        let path = self.path()?;
        let device = RawMidiDevice::open(&path).map_err(|source| Error::Open {
            device: path.display().to_string(),
            source,
        })?;
        let device = if self.probe {
            Self::probe_output(&path, device)?
        } else {
            device
        };
        Ok(Arc::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn snd_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("by-id")).unwrap();
        dir
    }

    #[test]
    fn test_resolve_relative_link() {
        let dir = snd_dir();
        symlink("../controlC3", dir.path().join("by-id/usb-Line_6_FBV-00")).unwrap();

        let path = resolve_by_id_in(dir.path(), "usb-Line_6_FBV-00").unwrap();
        assert_eq!(path, dir.path().join("by-id/../midiC3D0"));
    }

    #[test]
    fn test_resolve_multi_digit_card() {
        let dir = snd_dir();
        symlink("../controlC12", dir.path().join("by-id/pod")).unwrap();

        let path = resolve_by_id_in(dir.path(), "pod").unwrap();
        assert!(path.ends_with("midiC12D0"));
    }

    #[test]
    fn test_resolve_missing_link() {
        let dir = snd_dir();
        let err = resolve_by_id_in(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_resolve_link_without_control_node() {
        let dir = snd_dir();
        symlink("../pcmC0D0p", dir.path().join("by-id/odd")).unwrap();
        assert!(matches!(
            resolve_by_id_in(dir.path(), "odd"),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_path_like_ids() {
        assert!(matches!(
            resolve_by_id_in(Path::new("/dev/snd"), "../controlC0"),
            Err(Error::InvalidDeviceId(_))
        ));
        assert!(matches!(
            resolve_by_id_in(Path::new("/dev/snd"), ""),
            Err(Error::InvalidDeviceId(_))
        ));
    }

    #[test]
    fn test_connector_uses_explicit_path() {
        let connector = RawMidiConnector::new(DeviceId::Path(PathBuf::from("/dev/snd/midiC4D0")));
        assert_eq!(connector.path().unwrap(), PathBuf::from("/dev/snd/midiC4D0"));
        assert_eq!(connector.describe(), "/dev/snd/midiC4D0");
    }

    #[test]
    fn test_connector_open_missing_node() {
        let dir = snd_dir();
        symlink("../controlC1", dir.path().join("by-id/fbv")).unwrap();

        let mut connector = RawMidiConnector::new(DeviceId::Id("fbv".into())).root(dir.path());
        let err = connector.open().err().unwrap();
        assert!(matches!(err, Error::Open { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_device_over_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("midiC0D0");
        fs::write(&path, [0xC0, 0x02]).unwrap();

        let device = RawMidiDevice::open(&path).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(device.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [0xC0, 0x02]);

        device.close();
        let err = device.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(device.write(&[0xB0, 0x07, 0x00]).is_err());
    }
}
