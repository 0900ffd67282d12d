//! Test helpers and fixtures for podfbv integration tests
//!
//! Every test runs the real supervisor against virtual devices: the test
//! holds the [`VirtualPeer`] side and plays FBV or POD.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use podfbv::prelude::*;
use podfbv::{Snapshot, VirtualConnector, VirtualPeer, VirtualPlug};

/// Upper bound for anything that should happen "soon".
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// How long to listen before concluding nothing was sent.
pub const QUIET: Duration = Duration::from_millis(150);

/// Retry quickly so reconnect tests stay fast.
pub fn fast_backoff() -> Backoff {
    Backoff {
        short_ms: 2,
        long_ms: 5,
        short_attempts: 10,
    }
}

/// Poll `what` until it holds or [`TIMEOUT`] passes.
pub fn wait_until(description: &str, mut what: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !what() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", description);
        thread::sleep(Duration::from_millis(2));
    }
}

/// A supervisor running on its own thread plus the test's side of it.
pub struct Rig {
    pub fbv_plug: VirtualPlug,
    pub pod_plug: VirtualPlug,
    pub handle: SupervisorHandle,
    runner: Option<JoinHandle<podfbv::Result<()>>>,
}

impl Rig {
    /// Start a supervisor with nothing plugged in yet.
    pub fn start(retry: bool) -> Rig {
        let (fbv, fbv_plug) = VirtualConnector::new("fbv");
        let (pod, pod_plug) = VirtualConnector::new("pod");
        Self::start_with(fbv, fbv_plug, pod, pod_plug, retry)
    }

    pub fn start_with(
        fbv: VirtualConnector,
        fbv_plug: VirtualPlug,
        pod: VirtualConnector,
        pod_plug: VirtualPlug,
        retry: bool,
    ) -> Rig {
        let supervisor = Supervisor::builder()
            .fbv_connector(fbv)
            .pod_connector(pod)
            .retry(retry)
            .backoff(fast_backoff())
            .build()
            .expect("Failed to build supervisor");
        let handle = supervisor.handle();
        let runner = thread::Builder::new()
            .name("supervisor".into())
            .spawn(move || supervisor.run())
            .expect("Failed to spawn supervisor");
        Rig {
            fbv_plug,
            pod_plug,
            handle,
            runner: Some(runner),
        }
    }

    /// Plug both devices, start, and wait for the first generation of roles.
    pub fn running(retry: bool) -> (Rig, VirtualPeer, VirtualPeer) {
        let (fbv, fbv_plug) = VirtualConnector::new("fbv");
        let (pod, pod_plug) = VirtualConnector::new("pod");
        let fbv_peer = fbv_plug.plug();
        let pod_peer = pod_plug.plug();
        let rig = Self::start_with(fbv, fbv_plug, pod, pod_plug, retry);
        rig.wait_for_generation(1);
        (rig, fbv_peer, pod_peer)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.handle.snapshot()
    }

    /// Wait until roles of generation `generation` are all up.
    pub fn wait_for_generation(&self, generation: u64) {
        wait_until(&format!("generation {} running", generation), || {
            let snapshot = self.snapshot();
            snapshot.generation == generation && snapshot.all_running()
        });
    }

    pub fn wait_for_state(&self, description: &str, what: impl Fn(&ControllerState) -> bool) {
        wait_until(description, || what(&self.snapshot().state));
    }

    /// Wait for `run` to return on its own.
    pub fn join(mut self) -> podfbv::Result<()> {
        let runner = self.runner.take().expect("supervisor already joined");
        wait_until("supervisor to finish", || runner.is_finished());
        runner.join().expect("supervisor panicked")
    }

    pub fn stop(self) -> podfbv::Result<()> {
        self.handle.request_stop();
        self.join()
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        if let Some(runner) = self.runner.take() {
            self.handle.request_stop();
            let _ = runner.join();
        }
    }
}
