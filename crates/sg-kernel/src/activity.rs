//! The activity state machine (spec.md §4.4, component C4): identical
//! shape for every variant, the tag carrying variant-specific fields (spec.md
//! §9 design note: "replace virtual methods ... with a tagged sum type;
//! shared fields live in a common header, variant-specific fields in the
//! tag payload").

use std::task::Waker;

use sg_solver::VariableId;

use crate::arena::{Arena, Index};
use crate::comm::CommData;
use crate::error::{FailureKind, Outcome};
use crate::exec::ExecData;
use crate::io::IoData;
use crate::sleep::SleepData;
use crate::synchro::SynchroData;

/// Marker type distinguishing [`ActivityId`] from other arenas' handles.
pub struct ActivityTag;

/// A handle to an [`Activity`] (spec.md §3: copyable, refcounted by the
/// arena rather than intrusively).
pub type ActivityId = Index<ActivityTag>;

/// Lifecycle state of an activity (spec.md §4.4 diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    /// Parameters not yet finalized, no resource reserved.
    Inited,
    /// `start` was called; resources are being reserved.
    Starting,
    /// Holds a solver variable (or, for Synchro, is queued on a primitive).
    Started,
    /// Solver variable's priority is effectively zero; remaining is frozen.
    Suspended,
    /// `remaining <= epsilon`; finalize is in progress. Set momentarily by
    /// [`Kernel::finish`]/[`Kernel::fail`]/[`Kernel::cancel`] before the
    /// terminal state commits within the same call — there is no
    /// intervening suspension point, so code outside the kernel never
    /// observes an activity sitting in this state.
    Finishing,
    /// Terminal: completed normally.
    Finished,
    /// Terminal: completed abnormally. See [`Activity::outcome`].
    Failed,
    /// Terminal: explicit `cancel`.
    Canceled,
}

impl ActivityState {
    /// Whether this is one of the three terminal states (spec.md §4.4 I4).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityState::Finished | ActivityState::Failed | ActivityState::Canceled)
    }
}

/// Variant-specific payload (spec.md §3 tagged variants).
pub enum ActivityKind {
    /// Computes FLOPs on one or more hosts.
    Exec(ExecData),
    /// Moves bytes over a routed link path.
    Comm(CommData),
    /// Reads or writes bytes on a disk.
    Io(IoData),
    /// Elapses a fixed duration.
    Sleep(SleepData),
    /// Mutex/semaphore/barrier/condition wait.
    Synchro(SynchroData),
}

impl ActivityKind {
    /// Short tag name, used in logging and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Exec(_) => "exec",
            ActivityKind::Comm(_) => "comm",
            ActivityKind::Io(_) => "io",
            ActivityKind::Sleep(_) => "sleep",
            ActivityKind::Synchro(_) => "synchro",
        }
    }
}

/// An activity: the unit of simulated work (spec.md §3).
pub struct Activity {
    state: ActivityState,
    pub(crate) kind: ActivityKind,
    start_time: Option<f64>,
    finish_time: Option<f64>,
    /// Solver variable this activity owns while `started` (spec.md §4.4 I3).
    pub(crate) variable: Option<VariableId>,
    outcome: Option<Outcome>,
    wakers: Vec<Waker>,
    on_completion: Vec<Box<dyn FnOnce(Outcome)>>,
}

impl Activity {
    pub(crate) fn new(kind: ActivityKind) -> Self {
        Self {
            state: ActivityState::Inited,
            kind,
            start_time: None,
            finish_time: None,
            variable: None,
            outcome: None,
            wakers: Vec::new(),
            on_completion: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActivityState {
        self.state
    }

    /// Variant-specific payload.
    pub fn kind(&self) -> &ActivityKind {
        &self.kind
    }

    /// Mutable access to the variant-specific payload (the engine rewrites
    /// `remaining` fields here every scheduling round).
    pub fn kind_mut(&mut self) -> &mut ActivityKind {
        &mut self.kind
    }

    /// Virtual time `start` was called, if any.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Virtual time the activity reached a terminal state, if any.
    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    /// Terminal outcome, once reached.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Registers a completion observer (spec.md §4.4 "every activity
    /// publishes `on_completion(status)`"). Fired once, when the activity
    /// reaches a terminal state.
    pub fn on_completion(&mut self, f: impl FnOnce(Outcome) + 'static) {
        if let Some(outcome) = self.outcome {
            f(outcome);
        } else {
            self.on_completion.push(Box::new(f));
        }
    }

    fn remaining_nonzero(&self) -> f64 {
        match &self.kind {
            ActivityKind::Exec(e) => e.total_remaining(),
            ActivityKind::Comm(c) => c.remaining + c.latency_remaining,
            ActivityKind::Io(i) => i.remaining,
            ActivityKind::Sleep(s) => s.remaining,
            ActivityKind::Synchro(_) => 0.0,
        }
    }

    /// The common "remaining work" field (spec.md §3), read across variants.
    pub fn remaining(&self) -> f64 {
        self.remaining_nonzero()
    }
}

/// Owns every live [`Activity`] for one [`crate::Kernel`] (spec.md §4.4,
/// component C4). Transition methods are the only way to move an activity
/// between states; they fire wakers/observers and set `finish_time` so
/// callers never have to juggle that bookkeeping themselves.
#[derive(Default)]
pub struct Kernel {
    arena: Arena<Activity, ActivityTag>,
}

impl Kernel {
    /// An empty kernel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new activity in the `inited` state, returning a handle with
    /// one outstanding reference (the caller's).
    pub fn create(&mut self, kind: ActivityKind) -> ActivityId {
        self.arena.insert(Activity::new(kind))
    }

    /// Borrows an activity.
    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.arena.get(id)
    }

    /// Mutably borrows an activity.
    pub fn get_mut(&mut self, id: ActivityId) -> Option<&mut Activity> {
        self.arena.get_mut(id)
    }

    /// Adds one outstanding reference to `id` (a new handle, `ActivitySet`
    /// membership, or mailbox queue entry; spec.md §3 I5).
    pub fn retain(&mut self, id: ActivityId) {
        self.arena.retain(id);
    }

    /// Drops one outstanding reference to `id`.
    pub fn release(&mut self, id: ActivityId) {
        self.arena.release(id);
    }

    /// `inited -> starting`. Idempotent (spec.md §4.4).
    pub fn begin_starting(&mut self, id: ActivityId) {
        if let Some(a) = self.arena.get_mut(id) {
            if a.state == ActivityState::Inited {
                a.state = ActivityState::Starting;
            }
        }
    }

    /// `starting -> started`. For Exec/Io/Sleep this is called together
    /// with [`Kernel::set_variable`] in the same round; a Comm fused by
    /// `sg-mailbox` transitions here first (no variable yet — its route
    /// isn't known until the engine expands it) and gets its variable
    /// attached on the following round.
    pub fn mark_started(&mut self, id: ActivityId, time: f64) {
        if let Some(a) = self.arena.get_mut(id) {
            a.state = ActivityState::Started;
            a.start_time.get_or_insert(time);
        }
    }

    /// Attaches (or clears) the solver variable a started activity owns
    /// this round (spec.md §4.4 I3).
    pub fn set_variable(&mut self, id: ActivityId, variable: Option<VariableId>) {
        if let Some(a) = self.arena.get_mut(id) {
            a.variable = variable;
        }
    }

    /// The solver variable a started activity currently owns, if any.
    pub fn variable(&self, id: ActivityId) -> Option<VariableId> {
        self.arena.get(id).and_then(|a| a.variable)
    }

    /// `started -> suspended`: priority effectively zero, remaining frozen.
    pub fn suspend(&mut self, id: ActivityId) {
        if let Some(a) = self.arena.get_mut(id) {
            if a.state == ActivityState::Started {
                a.state = ActivityState::Suspended;
            }
        }
    }

    /// `suspended -> started`: priority restored.
    pub fn resume(&mut self, id: ActivityId) {
        if let Some(a) = self.arena.get_mut(id) {
            if a.state == ActivityState::Suspended {
                a.state = ActivityState::Started;
            }
        }
    }

    /// Transitions `id` to one of the three terminal states, recording
    /// `finish_time`, releasing its solver variable, propagating to a
    /// Comm's paired peer (spec.md §4.5/§8 P8), waking every pending
    /// `.wait()`, and firing completion observers (spec.md §4.4 I4).
    ///
    /// A no-op if the activity is already terminal (I4: terminal states are
    /// absorbing). Peer propagation is a plain recursive call on `self` (no
    /// `RefCell` re-borrow), so it cannot hit the re-entrancy hazard spec.md
    /// §7's `TracingError` warns about — only user-supplied `on_completion`
    /// closures need to heed that.
    fn finalize(&mut self, id: ActivityId, time: f64, state: ActivityState, outcome: Outcome) {
        let peer = match self.arena.get_mut(id) {
            Some(a) if !a.state.is_terminal() => {
                // Real, if instantaneous, `started/suspended -> finishing`
                // transition (spec.md §4.4 diagram) before the terminal
                // state commits: `remaining <= epsilon` is the condition
                // that lands here, and finalize (releasing the solver
                // variable, propagating to a peer) is the work that
                // `finishing` names.
                a.state = ActivityState::Finishing;
                log::debug!("activity {:?} ({}) -> {:?} at t={}", id, a.kind.label(), state, time);
                a.state = state;
                a.finish_time = Some(time);
                a.variable = None;
                a.outcome = Some(outcome);
                match &a.kind {
                    ActivityKind::Comm(c) => c.peer,
                    _ => None,
                }
            }
            _ => return,
        };

        if let Some(peer_id) = peer {
            if outcome.is_finished() {
                self.transfer_payload(id, peer_id);
            } else {
                self.run_cleanup(id);
            }
            self.finalize(peer_id, time, state, outcome);
        } else if !outcome.is_finished() {
            // A detached Comm canceled/failed before ever being paired (still
            // sitting in a mailbox queue, or parked in a permanent receiver's
            // `arrived` queue) has no peer to recurse into, but its payload
            // still owes a trip through the registered cleanup callback
            // (spec.md §4.5 "payload ownership").
            self.run_cleanup(id);
        }

        let (wakers, observers) = match self.arena.get_mut(id) {
            Some(a) => (std::mem::take(&mut a.wakers), std::mem::take(&mut a.on_completion)),
            None => return,
        };
        for waker in wakers {
            waker.wake();
        }
        for observer in observers {
            observer(outcome);
        }
    }

    /// Moves a finished Comm's payload from `from` into its peer `to`
    /// (spec.md §4.5 "the receiver takes ownership on completion").
    fn transfer_payload(&mut self, from: ActivityId, to: ActivityId) {
        let payload = match self.arena.get_mut(from).map(|a| &mut a.kind) {
            Some(ActivityKind::Comm(c)) => c.payload.take(),
            _ => None,
        };
        if let Some(payload) = payload {
            if let Some(ActivityKind::Comm(c)) = self.arena.get_mut(to).map(|a| &mut a.kind) {
                c.payload = Some(payload);
            }
        }
    }

    /// Runs a detached Comm's cleanup callback with its payload, if one was
    /// registered (spec.md §4.5 "on cancellation, the payload is returned
    /// to the sender via an optional `on_cleanup` callback").
    fn run_cleanup(&mut self, id: ActivityId) {
        let (cleanup, payload) = match self.arena.get_mut(id).map(|a| &mut a.kind) {
            Some(ActivityKind::Comm(c)) => (c.on_cleanup.take(), c.payload.take()),
            _ => (None, None),
        };
        if let (Some(cleanup), Some(payload)) = (cleanup, payload) {
            cleanup(payload);
        }
    }

    /// `started/finishing -> finished`: `remaining <= epsilon`.
    pub fn finish(&mut self, id: ActivityId, time: f64) {
        self.finalize(id, time, ActivityState::Finished, Outcome::Finished);
    }

    /// `started/starting -> failed`: resource off, route broken, deadline
    /// exceeded, or peer cancelled (spec.md §7).
    pub fn fail(&mut self, id: ActivityId, time: f64, kind: FailureKind) {
        self.finalize(id, time, ActivityState::Failed, Outcome::Failed(kind));
    }

    /// `started/suspended -> canceled`: explicit `cancel` call.
    pub fn cancel(&mut self, id: ActivityId, time: f64) {
        self.finalize(id, time, ActivityState::Canceled, Outcome::Canceled);
    }

    /// Registers `waker` to be woken the next time `id` reaches a terminal
    /// state, or wakes it immediately if `id` is already terminal. Used by
    /// [`crate::future::ActivityFuture`].
    pub fn register_waker(&mut self, id: ActivityId, waker: Waker) {
        match self.arena.get_mut(id) {
            Some(a) if a.state.is_terminal() => waker.wake(),
            Some(a) => a.wakers.push(waker),
            None => waker.wake(),
        }
    }

    /// Iterates over every live activity, for the engine to assemble
    /// solver input from (only `started` ones matter there).
    pub fn iter(&self) -> impl Iterator<Item = (ActivityId, &Activity)> {
        self.arena.iter()
    }
}
