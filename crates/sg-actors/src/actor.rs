//! The `Actor` record (spec.md §3, component C6): a cooperatively scheduled
//! fiber with its own stack, bound to a host, identified by a dense PID.
//!
//! Grounded on `dslab-core`'s `component.rs` (`pub type Id = u32`, a dense
//! integer handed out by a name registry and never recycled) for the PID
//! shape, generalized from "one id per registered component" to "one id per
//! spawned actor, with parent/child bookkeeping and a restart entry point".

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use sg_kernel::ActivityId;
use sg_platform::HostId;

use crate::error::Killed;

/// Dense PID, assigned in creation order and never reused (spec.md §3
/// "PID (dense integer assigned at creation)").
pub type ActorId = u64;

/// Default actor stack size (spec.md §6 `contexts/stack-size` default),
/// grounded on SimGrid's own 8 MiB default noted in spec.md's supplemental
/// stack-size feature.
pub const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Lifecycle state of an actor (spec.md §3: "created → started (fiber
/// initialized) → running/ready/blocked → exiting → terminated").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// In the ready queue, not yet run this round.
    Ready,
    /// Currently holding the maestro's exclusive execution slot.
    Running,
    /// Suspended on an activity, `join`, or a synchro primitive.
    Blocked,
    /// Terminal transition in progress: on-exit callbacks are running.
    Exiting,
    /// Fiber reclaimed; PID remains valid for lookups like `join`.
    Terminated,
}

/// An actor's user entry point: takes its context, returns a future whose
/// `Result` lets suspension points short-circuit on kill with `?` (spec.md
/// §9 "implicit `?`-style early return at each await").
pub type Entry = Rc<dyn Fn(crate::context::ActorContext) -> Pin<Box<dyn Future<Output = Result<(), Killed>>>>>;

/// One scheduled actor (spec.md §3 `Actor`).
pub struct Actor {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) host: HostId,
    pub(crate) entry: Entry,
    pub(crate) stack_size: usize,
    pub(crate) state: ActorState,
    /// Explicit suspend flag (spec.md supplemental feature), independent of
    /// being blocked on an activity. Checked by `ActorContext::block_on` and
    /// `yield_now` on wake: a suspended actor parks itself back in a pending
    /// poll instead of returning control to its body.
    pub(crate) suspended: bool,
    pub(crate) daemon: bool,
    pub(crate) auto_restart: bool,
    pub(crate) kill_time: Option<f64>,
    /// Fires in reverse registration order on exit (spec.md §3 "LIFO").
    pub(crate) on_exit: Vec<Box<dyn FnOnce()>>,
    pub(crate) waiting_on: Option<ActivityId>,
    pub(crate) parent: Option<ActorId>,
    /// Set by `kill`; every `ActorContext` suspension method checks this
    /// after waking and short-circuits with `Err(Killed)` if set.
    pub(crate) killed: bool,
    /// String-keyed properties (spec.md §3 "pinned properties map",
    /// extended to actors per SPEC_FULL's supplemental features note).
    pub(crate) properties: HashMap<String, String>,
}

impl Actor {
    pub(crate) fn new(id: ActorId, name: String, host: HostId, entry: Entry, parent: Option<ActorId>) -> Self {
        Self {
            id,
            name,
            host,
            entry,
            stack_size: DEFAULT_STACK_SIZE,
            state: ActorState::Ready,
            suspended: false,
            daemon: false,
            auto_restart: false,
            kill_time: None,
            on_exit: Vec::new(),
            waiting_on: None,
            parent,
            killed: false,
            properties: HashMap::new(),
        }
    }

    /// Dense PID.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Actor name, as given to the builder.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host this actor currently runs on.
    pub fn host(&self) -> HostId {
        self.host
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Whether the daemon bit is set (spec.md §4.6 `daemonize`).
    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    /// Whether `auto_restart` is set (spec.md §4.6).
    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    /// Parent PID, if any.
    pub fn parent(&self) -> Option<ActorId> {
        self.parent
    }

    /// Whether this actor has been marked for termination.
    pub fn is_killed(&self) -> bool {
        self.killed
    }

    /// Configured stack size in bytes.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// The activity this actor is currently blocked on, if any — the
    /// engine reads this off every blocked actor when reporting a deadlock
    /// (spec.md §4.7 step 5).
    pub fn waiting_on(&self) -> Option<ActivityId> {
        self.waiting_on
    }

    /// Reads a pinned property (supplemental feature, grounded on
    /// `original_source/platform-properties.c`; see SPEC_FULL.md). No
    /// mutation API after spawn, matching the host property non-goal
    /// boundary.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub(crate) fn set_property(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }
}
