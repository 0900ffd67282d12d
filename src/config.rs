//! Bridge configuration, loadable from TOML.
//!
//! ```toml
//! retry = true
//! backend = "raw"
//!
//! [fbv]
//! id = "usb-Line_6_FBV_Express_Mk_II-00"
//!
//! [pod]
//! path = "/dev/snd/midiC2D0"
//!
//! [backoff]
//! short_ms = 100
//! long_ms = 1000
//! short_attempts = 100
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use podfbv_midi_io::{Connector, DeviceId};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Port name prefixes used by the midir backend when no id is given.
pub const DEFAULT_FBV_PORT: &str = "FBV Express Mk II";
pub const DEFAULT_POD_PORT: &str = "Line 6 Pocket POD";

/// Delay between failed open attempts: `short_ms` for the first
/// `short_attempts` attempts after a successful start, `long_ms` after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub short_ms: u64,
    pub long_ms: u64,
    pub short_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            short_ms: 100,
            long_ms: 1000,
            short_attempts: 100,
        }
    }
}

impl Backoff {
    /// Delay before retrying after the `attempt`-th (0-based) failure.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt < self.short_attempts {
            Duration::from_millis(self.short_ms)
        } else {
            Duration::from_millis(self.long_ms)
        }
    }
}

/// Where device handles come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ALSA raw MIDI nodes (`/dev/snd`).
    #[default]
    Raw,
    /// Hardware ports through midir, matched by name prefix.
    Midir,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Raw => f.write_str("raw"),
            Backend::Midir => f.write_str("midir"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Backend::Raw),
            "midir" => Ok(Backend::Midir),
            other => Err(format!("unknown backend '{}' (expected raw or midir)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub fbv: DeviceId,
    pub pod: DeviceId,
    /// Keep reopening devices after failures instead of exiting.
    pub retry: bool,
    pub backoff: Backoff,
    pub backend: Backend,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fbv: DeviceId::fbv(),
            pod: DeviceId::pod(),
            retry: false,
            backoff: Backoff::default(),
            backend: Backend::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: BridgeConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backoff.short_ms == 0 && self.backoff.long_ms == 0 && self.retry {
            return Err(Error::Config(
                "retrying without any backoff delay would spin".to_string(),
            ));
        }
        if self.backend == Backend::Midir {
            for id in [&self.fbv, &self.pod] {
                if let DeviceId::Path(path) = id {
                    return Err(Error::Config(format!(
                        "midir backend matches ports by name, not by path ({})",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Connectors for the FBV and the POD, in that order. Only the POD is
    /// probed after opening.
    pub fn connectors(&self) -> Result<(Box<dyn Connector>, Box<dyn Connector>)> {
        self.validate()?;
        match self.backend {
            Backend::Raw => raw_connectors(self),
            Backend::Midir => midir_connectors(self),
        }
    }
}

#[cfg(unix)]
fn raw_connectors(config: &BridgeConfig) -> Result<(Box<dyn Connector>, Box<dyn Connector>)> {
    use podfbv_midi_io::RawMidiConnector;

    Ok((
        Box::new(RawMidiConnector::new(config.fbv.clone())),
        Box::new(RawMidiConnector::new(config.pod.clone()).probe(true)),
    ))
}

#[cfg(not(unix))]
fn raw_connectors(_config: &BridgeConfig) -> Result<(Box<dyn Connector>, Box<dyn Connector>)> {
    Err(Error::Config(
        "raw MIDI devices are only available on unix; use the midir backend".to_string(),
    ))
}

/// The by-id defaults make no sense as port names, so they are swapped for
/// the port prefixes.
#[cfg_attr(not(feature = "midir"), allow(dead_code))]
fn port_prefix(id: &DeviceId, by_id_default: &DeviceId, port_default: &str) -> String {
    if id == by_id_default {
        port_default.to_string()
    } else {
        id.to_string()
    }
}

#[cfg(feature = "midir")]
fn midir_connectors(config: &BridgeConfig) -> Result<(Box<dyn Connector>, Box<dyn Connector>)> {
    use podfbv_midi_io::MidirConnector;

    let fbv = port_prefix(&config.fbv, &DeviceId::fbv(), DEFAULT_FBV_PORT);
    let pod = port_prefix(&config.pod, &DeviceId::pod(), DEFAULT_POD_PORT);
    Ok((
        Box::new(MidirConnector::new(fbv)),
        Box::new(MidirConnector::new(pod)),
    ))
}

#[cfg(not(feature = "midir"))]
fn midir_connectors(_config: &BridgeConfig) -> Result<(Box<dyn Connector>, Box<dyn Connector>)> {
    Err(Error::Config("built without the midir feature".to_string()))
}
