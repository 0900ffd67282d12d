//! Builder for configuring and constructing a [`Supervisor`].

use podfbv_midi_io::{Connector, DeviceId};

use crate::config::{Backend, Backoff, BridgeConfig};
use crate::{Result, Supervisor};

/// Devices come from the configured backend unless a connector is supplied
/// explicitly, which is how tests plug in virtual devices.
///
/// # Example
///
/// ```ignore
/// use podfbv::prelude::*;
///
/// let supervisor = Supervisor::builder()
///     .pod(DeviceId::Path("/dev/snd/midiC2D0".into()))
///     .retry(true)
///     .build()?;
///
/// let handle = supervisor.handle();
/// ctrlc::set_handler(move || handle.request_stop())?;
/// supervisor.run()?;
/// ```
#[derive(Default)]
pub struct BridgeBuilder {
    config: BridgeConfig,
    fbv_connector: Option<Box<dyn Connector>>,
    pod_connector: Option<Box<dyn Connector>>,
}

impl BridgeBuilder {
    /// Replace every setting at once, e.g. with a loaded config file.
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: `usb-Line_6_FBV_Express_Mk_II-00`
    pub fn fbv(mut self, id: DeviceId) -> Self {
        self.config.fbv = id;
        self
    }

    /// Default: `usb-Line_6_Line_6_Pocket_POD-00`
    pub fn pod(mut self, id: DeviceId) -> Self {
        self.config.pod = id;
        self
    }

    /// Default: false
    pub fn retry(mut self, retry: bool) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Default: [`Backend::Raw`]
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Open the FBV through `connector` instead of the backend.
    pub fn fbv_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.fbv_connector = Some(Box::new(connector));
        self
    }

    /// Open the POD through `connector` instead of the backend.
    pub fn pod_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.pod_connector = Some(Box::new(connector));
        self
    }

    pub fn build(self) -> Result<Supervisor> {
        let (fbv, pod) = match (self.fbv_connector, self.pod_connector) {
            (Some(fbv), Some(pod)) => {
                self.config.validate()?;
                (fbv, pod)
            }
            (fbv, pod) => {
                let (default_fbv, default_pod) = self.config.connectors()?;
                (fbv.unwrap_or(default_fbv), pod.unwrap_or(default_pod))
            }
        };
        Ok(Supervisor::new(
            fbv,
            pod,
            self.config.retry,
            self.config.backoff,
        ))
    }
}
