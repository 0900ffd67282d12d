//! The five pipeline roles and the state they share.
//!
//! Everything the roles share lives in one [`Pipeline`] behind one mutex.
//! Each role has its own condition variable for "your predicate may have
//! changed" signalling, and the supervisor waits on a separate reset
//! condition variable that roles broadcast when they stop.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use podfbv_midi::Tic;
use tracing::debug;

use crate::slot::Slots;
use crate::translator::ControllerState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The translator.
    Control,
    FbvInput,
    FbvOutput,
    PodInput,
    PodOutput,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Control,
        Role::FbvInput,
        Role::FbvOutput,
        Role::PodInput,
        Role::PodOutput,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Role::Control => "control",
            Role::FbvInput => "fbv-input",
            Role::FbvOutput => "fbv-output",
            Role::PodInput => "pod-input",
            Role::PodOutput => "pod-output",
        }
    }

    /// The device a reader/writer role serves. `None` for the translator.
    pub const fn endpoint(self) -> Option<Endpoint> {
        match self {
            Role::Control => None,
            Role::FbvInput | Role::FbvOutput => Some(Endpoint::Fbv),
            Role::PodInput | Role::PodOutput => Some(Endpoint::Pod),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two bridged devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Fbv,
    Pod,
}

impl Endpoint {
    pub const fn name(self) -> &'static str {
        match self {
            Endpoint::Fbv => "FBV",
            Endpoint::Pod => "POD",
        }
    }

    pub const fn input_role(self) -> Role {
        match self {
            Endpoint::Fbv => Role::FbvInput,
            Endpoint::Pod => Role::PodInput,
        }
    }

    pub const fn output_role(self) -> Role {
        match self {
            Endpoint::Fbv => Role::FbvOutput,
            Endpoint::Pod => Role::PodOutput,
        }
    }

    /// The device on the other side of the translator.
    pub const fn peer(self) -> Endpoint {
        match self {
            Endpoint::Fbv => Endpoint::Pod,
            Endpoint::Pod => Endpoint::Fbv,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed table with one entry per [`Role`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoleTable<T>([T; 5]);

impl<T> RoleTable<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Copy> RoleTable<T> {
    pub const fn filled(value: T) -> Self {
        RoleTable([value; 5])
    }
}

impl<T> Index<Role> for RoleTable<T> {
    type Output = T;

    #[inline]
    fn index(&self, role: Role) -> &T {
        &self.0[role.index()]
    }
}

impl<T> IndexMut<Role> for RoleTable<T> {
    #[inline]
    fn index_mut(&mut self, role: Role) -> &mut T {
        &mut self.0[role.index()]
    }
}

/// All mutable state shared by the roles. Only reachable through the
/// pipeline mutex.
#[derive(Debug)]
pub struct Pipeline {
    pub slots: Slots,
    pub state: ControllerState,
    running: RoleTable<bool>,
    stop_requested: bool,
    generation: u64,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            slots: Slots::default(),
            state: ControllerState::new(Tic::ZERO),
            running: RoleTable::filled(false),
            stop_requested: false,
            generation: 0,
        }
    }

    #[inline]
    pub fn is_running(&self, role: Role) -> bool {
        self.running[role]
    }

    pub fn running(&self) -> RoleTable<bool> {
        self.running
    }

    pub fn all_running(&self) -> bool {
        self.running.iter().all(|(_, running)| *running)
    }

    pub fn none_running(&self) -> bool {
        self.running.iter().all(|(_, running)| !*running)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// How many times the roles have been started.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fresh slots and controller state, every role marked running.
    /// Refused once a stop has been requested.
    pub(crate) fn start(&mut self, tic: Tic) -> bool {
        if self.stop_requested {
            return false;
        }
        self.slots.clear();
        self.state = ControllerState::new(tic);
        self.running = RoleTable::filled(true);
        self.generation += 1;
        true
    }

    pub(crate) fn stop(&mut self, role: Role) {
        self.running[role] = false;
    }

    pub(crate) fn stop_all(&mut self) {
        self.running = RoleTable::filled(false);
    }

    /// A stop request is a failure of the control role that also ends
    /// retrying.
    pub(crate) fn request_stop(&mut self) {
        self.stop_requested = true;
        self.running[Role::Control] = false;
    }
}

/// The one mutex plus the condition variables of the pipeline.
pub struct Shared {
    pipeline: Mutex<Pipeline>,
    reset: Condvar,
    conds: RoleTable<Condvar>,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            pipeline: Mutex::new(Pipeline::new()),
            reset: Condvar::new(),
            conds: RoleTable::default(),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.pipeline.lock()
    }

    /// Wake `role` so it re-checks its predicate.
    #[inline]
    pub fn notify(&self, role: Role) {
        self.conds[role].notify_all();
    }

    pub fn notify_all_roles(&self) {
        for (_, cond) in self.conds.iter() {
            cond.notify_all();
        }
    }

    #[inline]
    pub fn wait(&self, role: Role, guard: &mut MutexGuard<'_, Pipeline>) {
        self.conds[role].wait(guard);
    }

    pub fn broadcast_reset(&self) {
        self.reset.notify_all();
    }

    pub fn wait_reset(&self, guard: &mut MutexGuard<'_, Pipeline>) {
        self.reset.wait(guard);
    }

    /// Returns `true` if `deadline` passed.
    pub fn wait_reset_until(&self, guard: &mut MutexGuard<'_, Pipeline>, deadline: Instant) -> bool {
        self.reset.wait_until(guard, deadline).timed_out()
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// What a role's entry point receives: its identity and the shared state.
pub struct RoleHandle {
    role: Role,
    shared: Arc<Shared>,
}

impl RoleHandle {
    pub fn new(role: Role, shared: Arc<Shared>) -> Self {
        Self { role, shared }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.shared.lock()
    }

    #[inline]
    pub fn is_running(&self, pipeline: &Pipeline) -> bool {
        pipeline.is_running(self.role)
    }

    /// Block on this role's condition variable. Spurious wakeups happen;
    /// callers re-check their predicate.
    #[inline]
    pub fn wait(&self, guard: &mut MutexGuard<'_, Pipeline>) {
        self.shared.wait(self.role, guard);
    }

    #[inline]
    pub fn notify(&self, role: Role) {
        self.shared.notify(role);
    }

    /// Clear this role's liveness flag and wake the supervisor.
    pub fn exit(&self, mut guard: MutexGuard<'_, Pipeline>) {
        guard.stop(self.role);
        self.shared.broadcast_reset();
        drop(guard);
        debug!("{} exit", self.role);
    }
}
