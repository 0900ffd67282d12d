//! Opens the devices, runs the five roles, and tears everything down and
//! starts over when any of them stops.
//!
//! A reset is always total: every role is stopped and joined and both
//! devices are closed before anything is reopened, so a new generation of
//! roles never shares a handle or a slot with the previous one.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use podfbv_midi::Tic;
use podfbv_midi_io::{Connector, DeviceHandle};
use tracing::{debug, error, info, warn};

use crate::builder::BridgeBuilder;
use crate::config::Backoff;
use crate::io_role::{run_reader, run_writer};
use crate::role::{Endpoint, Role, RoleHandle, RoleTable, Shared};
use crate::translator::{run_control, ControllerState};
use crate::{Error, Result};

/// Point-in-time copy of the pipeline state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub state: ControllerState,
    pub running: RoleTable<bool>,
    pub stop_requested: bool,
    /// How many times the roles have been started.
    pub generation: u64,
}

impl Snapshot {
    pub fn all_running(&self) -> bool {
        self.running.iter().all(|(_, running)| *running)
    }
}

/// Cloneable handle for stopping a running [`Supervisor`] and peeking at it
/// from other threads (signal handlers, tests).
#[derive(Clone)]
pub struct SupervisorHandle {
    shared: Arc<Shared>,
}

impl SupervisorHandle {
    /// Stop the roles and end [`Supervisor::run`] after teardown. Takes the
    /// same path as a role failure.
    pub fn request_stop(&self) {
        let mut pipeline = self.shared.lock();
        if !pipeline.stop_requested() {
            info!("Stop requested");
        }
        pipeline.request_stop();
        self.shared.notify(Role::Control);
        self.shared.broadcast_reset();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.lock().stop_requested()
    }

    pub fn snapshot(&self) -> Snapshot {
        snapshot(&self.shared)
    }
}

fn snapshot(shared: &Shared) -> Snapshot {
    let pipeline = shared.lock();
    Snapshot {
        state: pipeline.state,
        running: pipeline.running(),
        stop_requested: pipeline.stop_requested(),
        generation: pipeline.generation(),
    }
}

#[derive(Default)]
struct Devices {
    fbv: Option<DeviceHandle>,
    pod: Option<DeviceHandle>,
}

impl Devices {
    fn close(&mut self) {
        if let Some(device) = self.fbv.take() {
            info!("Reset FBV ({})", device.name());
            device.close();
        }
        if let Some(device) = self.pod.take() {
            info!("Reset POD ({})", device.name());
            device.close();
        }
    }
}

pub struct Supervisor {
    fbv: Box<dyn Connector>,
    pod: Box<dyn Connector>,
    retry: bool,
    backoff: Backoff,
    shared: Arc<Shared>,
}

impl Supervisor {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    pub(crate) fn new(
        fbv: Box<dyn Connector>,
        pod: Box<dyn Connector>,
        retry: bool,
        backoff: Backoff,
    ) -> Self {
        Self {
            fbv,
            pod,
            retry,
            backoff,
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        snapshot(&self.shared)
    }

    /// Run until a stop is requested, a fatal error occurs, or (without
    /// retry) the first open attempt or pipeline run ends.
    pub fn run(mut self) -> Result<()> {
        info!(
            "Bridging {} <-> {}",
            self.fbv.describe(),
            self.pod.describe()
        );

        let mut devices = Devices::default();
        let mut attempt: u32 = 0;
        let result = loop {
            if self.shared.lock().stop_requested() {
                break Ok(());
            }

            match self.open(&mut devices) {
                Ok(()) => {
                    attempt = 0;
                    if let Err(err) = self.run_pipeline(&mut devices) {
                        error!("{}", err);
                        break Err(err);
                    }
                }
                Err(err) if err.is_fatal() => {
                    error!("{}", err);
                    break Err(err.into());
                }
                Err(err) if !self.retry => break Err(err.into()),
                Err(err) => debug!("{}", err),
            }

            if !self.retry {
                break Ok(());
            }
            let delay = self.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            if self.sleep_unless_stopped(delay) {
                break Ok(());
            }
        };

        devices.close();
        info!("Bridge stopped");
        result
    }

    /// Open whatever is not open yet. A device that opened stays open while
    /// the other one is retried.
    fn open(&mut self, devices: &mut Devices) -> podfbv_midi_io::Result<()> {
        if devices.fbv.is_none() {
            let device = self.fbv.open()?;
            info!("FBV device \"{}\" ready", device.name());
            devices.fbv = Some(device);
        }
        if devices.pod.is_none() {
            let device = self.pod.open()?;
            info!("POD device \"{}\" ready", device.name());
            devices.pod = Some(device);
        }
        Ok(())
    }

    /// Start all roles, wait for any of them to stop, then tear down.
    fn run_pipeline(&self, devices: &mut Devices) -> Result<()> {
        let (Some(fbv), Some(pod)) = (devices.fbv.clone(), devices.pod.clone()) else {
            return Ok(());
        };

        if !self.shared.lock().start(Tic::now()) {
            return Ok(());
        }

        let mut threads = Vec::with_capacity(Role::ALL.len());
        let spawned = Role::ALL.into_iter().try_for_each(|role| {
            let thread = self.spawn_role(role, &fbv, &pod)?;
            threads.push((role, thread));
            Ok::<_, Error>(())
        });
        if let Err(err) = spawned {
            self.teardown(devices, threads);
            return Err(err);
        }
        info!("Bridge running");

        {
            let mut pipeline = self.shared.lock();
            while pipeline.all_running() {
                self.shared.wait_reset(&mut pipeline);
            }
            for (role, running) in pipeline.running().iter() {
                if !running {
                    debug!("{} stopped", role);
                }
            }
        }

        self.teardown(devices, threads);
        Ok(())
    }

    fn spawn_role(
        &self,
        role: Role,
        fbv: &DeviceHandle,
        pod: &DeviceHandle,
    ) -> Result<JoinHandle<()>> {
        let handle = RoleHandle::new(role, Arc::clone(&self.shared));
        let builder = thread::Builder::new().name(format!("podfbv-{}", role));
        let spawned = match role.endpoint() {
            None => builder.spawn(move || run_control(handle)),
            Some(endpoint) => {
                let device = match endpoint {
                    Endpoint::Fbv => Arc::clone(fbv),
                    Endpoint::Pod => Arc::clone(pod),
                };
                if role == endpoint.input_role() {
                    builder.spawn(move || run_reader(handle, endpoint, device))
                } else {
                    builder.spawn(move || run_writer(handle, endpoint, device))
                }
            }
        };
        spawned.map_err(|source| Error::Spawn { role, source })
    }

    /// Stop every role, close both devices, join every thread.
    fn teardown(&self, devices: &mut Devices, threads: Vec<(Role, JoinHandle<()>)>) {
        {
            let mut pipeline = self.shared.lock();
            pipeline.stop_all();
            debug_assert!(pipeline.none_running());
            self.shared.notify_all_roles();
        }

        // Closing unblocks readers stuck in a device read.
        devices.close();

        for (role, thread) in threads {
            if thread.join().is_err() {
                warn!("{} thread panicked", role);
            }
        }
        debug!("All roles joined");
    }

    /// Returns `true` if a stop was requested before `delay` ran out.
    fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut pipeline = self.shared.lock();
        while !pipeline.stop_requested() {
            if self.shared.wait_reset_until(&mut pipeline, deadline) {
                return false;
            }
        }
        true
    }
}
