//! The simulation engine main loop (spec.md §4.7, component C7's
//! consumer): wires the kernel (C4), resource models (C3), solver (C2) and
//! platform graph (C1) together around the actor scheduler (C6).
//!
//! Grounded on `dslab-core::simulation::Simulation` for the "one struct
//! owns everything, `run`/`step` drive it" shape, generalized from
//! `dslab-core`'s generic typed-event dispatch to the fixed seven-step
//! round spec.md §4.7 spells out: drain deferred commands, drain the ready
//! queue, assemble solver input from every started activity, solve, advance
//! the clock by the smallest Δt any started activity/trace event/sleeper
//! needs, apply it, repeat until every non-daemon actor has terminated.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::Rc;

use sg_actors::{ActorBuilder, ActorContext, ActorId, ActorState, Killed, Scheduler};
use sg_kernel::activity::{ActivityId, ActivityKind, ActivityState};
use sg_kernel::{FailureKind, Kernel, Outcome};
use sg_mailbox::MailboxRegistry;
use sg_platform::{DiskId, HostId, LinkId, PlatformGraph, SharingPolicy};
use sg_resources::{ConstraintBook, ConstraintKey};
use sg_solver::{Constraint, Variable};

use crate::plugin::{ActivityCompletion, CpuUtilization, PowerChange, Signals};
use sg_engine::Config;

/// A deadlocked actor, reported when [`Engine::run`] fails (spec.md §8
/// scenario 5).
#[derive(Debug, Clone)]
pub struct Blocked {
    /// The blocked actor's id.
    pub actor: ActorId,
    /// The blocked actor's name.
    pub name: String,
    /// The activity it's waiting on, if any (synchro-primitive waits and
    /// `join` polling loops leave this `None`).
    pub waiting_on: Option<ActivityId>,
}

/// Why [`Engine::run`] stopped short of every non-daemon actor terminating.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// No started activity, sleeper, or trace event can make progress, yet
    /// at least one non-daemon actor remains (spec.md §4.7 step 5).
    Deadlock(Vec<Blocked>),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Deadlock(blocked) => {
                write!(f, "deadlock: {} actor(s) blocked with no progress possible:", blocked.len())?;
                for b in blocked {
                    write!(f, " {}(#{}){}", b.name, b.actor, if b.waiting_on.is_some() { "*" } else { "" })?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Summary returned by a successful [`Engine::run`].
#[derive(Debug, Clone, Copy)]
pub struct EngineReport {
    /// Virtual clock reading when the run finished.
    pub clock: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceKind {
    Host(HostId, bool),
    Link(LinkId, bool),
}

struct TraceEvent {
    time: f64,
    seq: u64,
    kind: TraceKind,
}

impl PartialEq for TraceEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for TraceEvent {}

impl Ord for TraceEvent {
    // Reversed so a `BinaryHeap` (a max-heap) pops the earliest event first,
    // same trick `sg-engine::event::Event` uses for its own min-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for TraceEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone)]
enum RoundKind {
    Exec { hosts_weights: Vec<(HostId, f64)> },
    Comm,
    Io,
}

type DeferredCommand = Box<dyn FnOnce(&mut Engine)>;

/// The simulation engine: owns the platform, the kernel, the mailbox
/// registry, the actor scheduler, the virtual clock, and the trace-event
/// schedule, and drives the main loop of spec.md §4.7.
pub struct Engine {
    platform: PlatformGraph,
    kernel: Rc<RefCell<Kernel>>,
    mailboxes: Rc<RefCell<MailboxRegistry>>,
    scheduler: Rc<RefCell<Scheduler>>,
    clock: Rc<Cell<f64>>,
    config: Config,
    trace_events: BinaryHeap<TraceEvent>,
    trace_seq: u64,
    pending_restarts: HashMap<HostId, Vec<ActorId>>,
    deferred: VecDeque<DeferredCommand>,
    signals: Signals,
}

impl Engine {
    /// A new engine over `platform`, configured by `config`.
    pub fn new(platform: PlatformGraph, config: Config) -> Self {
        let kernel = Rc::new(RefCell::new(Kernel::new()));
        let mailboxes = Rc::new(RefCell::new(MailboxRegistry::new(kernel.clone())));
        let clock = Rc::new(Cell::new(0.0));
        let scheduler = Rc::new(RefCell::new(Scheduler::new(kernel.clone(), mailboxes.clone(), clock.clone())));
        log::info!("engine created, stack size default {} bytes", config.stack_size_bytes);
        Self {
            platform,
            kernel,
            mailboxes,
            scheduler,
            clock,
            config,
            trace_events: BinaryHeap::new(),
            trace_seq: 0,
            pending_restarts: HashMap::new(),
            deferred: VecDeque::new(),
            signals: Signals::default(),
        }
    }

    /// Read-only access to the platform graph.
    pub fn platform(&self) -> &PlatformGraph {
        &self.platform
    }

    /// Mutable access to the platform graph, for building it before `run`.
    pub fn platform_mut(&mut self) -> &mut PlatformGraph {
        &mut self.platform
    }

    /// Current virtual clock reading (spec.md §4.7 `simgrid_get_clock()`).
    pub fn time(&self) -> f64 {
        self.clock.get()
    }

    /// The engine's shared scheduler, for callers who want to build actors
    /// with [`ActorBuilder`] directly instead of [`Engine::create_actor`].
    pub fn scheduler(&self) -> Rc<RefCell<Scheduler>> {
        self.scheduler.clone()
    }

    /// Spawns an actor named `name` on `host`, running `body`, with the
    /// configured default stack size (spec.md §3/§6).
    pub fn create_actor<F, Fut>(&mut self, name: impl Into<String>, host: HostId, body: F) -> ActorId
    where
        F: Fn(ActorContext) -> Fut + 'static,
        Fut: std::future::Future<Output = Result<(), Killed>> + 'static,
    {
        let id = ActorBuilder::new(name, host).stack_size(self.config.stack_size_bytes).spawn(&self.scheduler, body);
        self.signals.actor_creation.fire(&id);
        id
    }

    /// Queues `cmd` to run at the start of the next round instead of
    /// immediately (spec.md §4.7 step 1: "drain deferred command queue
    /// enqueued by callbacks"). Signal subscribers should use this rather
    /// than mutating the engine from inside a `fire`.
    pub fn defer(&mut self, cmd: impl FnOnce(&mut Engine) + 'static) {
        self.deferred.push_back(Box::new(cmd));
    }

    /// Subscribes to per-host CPU utilization updates (spec.md §4.8,
    /// grounded on `plugin-hostload.c`).
    pub fn on_cpu_update(&mut self, callback: impl Fn(&CpuUtilization) + 'static) {
        self.signals.cpu_update.subscribe(callback);
    }

    /// Subscribes to host/link power changes.
    pub fn on_power_change(&mut self, callback: impl Fn(&PowerChange) + 'static) {
        self.signals.power_change.subscribe(callback);
    }

    /// Subscribes to activity completions.
    pub fn on_activity_completion(&mut self, callback: impl Fn(&ActivityCompletion) + 'static) {
        self.signals.activity_completion.subscribe(callback);
    }

    /// Subscribes to actor creation.
    pub fn on_actor_creation(&mut self, callback: impl Fn(&ActorId) + 'static) {
        self.signals.actor_creation.subscribe(callback);
    }

    /// Schedules `host` to turn on/off at `time` (spec.md §4.3 availability
    /// traces).
    pub fn schedule_host_power(&mut self, time: f64, host: HostId, on: bool) {
        let seq = self.trace_seq;
        self.trace_seq += 1;
        self.trace_events.push(TraceEvent { time, seq, kind: TraceKind::Host(host, on) });
    }

    /// Schedules `link` to turn on/off at `time`.
    pub fn schedule_link_power(&mut self, time: f64, link: LinkId, on: bool) {
        let seq = self.trace_seq;
        self.trace_seq += 1;
        self.trace_events.push(TraceEvent { time, seq, kind: TraceKind::Link(link, on) });
    }

    /// Immediately turns `host` on/off, applying the same cascade a
    /// scheduled trace event would (spec.md §8 scenario 6).
    pub fn power_host(&mut self, host: HostId, on: bool) {
        self.apply_host_power(host, on);
    }

    /// Immediately turns `link` on/off.
    pub fn power_link(&mut self, link: LinkId, on: bool) {
        self.apply_link_power(link, on);
    }

    /// Runs the engine to completion (spec.md §4.7), returning a summary or
    /// a deadlock report.
    pub fn run(&mut self) -> Result<EngineReport, EngineError> {
        loop {
            self.drain_deferred();
            self.scheduler.borrow().drain_ready();

            if self.scheduler.borrow().all_non_daemons_terminated() {
                break;
            }

            self.advance_round()?;
        }
        self.terminate_daemons();
        Ok(EngineReport { clock: self.clock.get() })
    }

    fn drain_deferred(&mut self) {
        while let Some(cmd) = self.deferred.pop_front() {
            cmd(self);
        }
    }

    fn terminate_daemons(&mut self) {
        let time = self.clock.get();
        let daemons: Vec<ActorId> =
            self.scheduler.borrow().iter().filter(|(_, a)| a.is_daemon() && a.state() != ActorState::Terminated).map(|(&id, _)| id).collect();
        for id in daemons {
            log::debug!("terminating daemon #{id} at t={time}");
            self.scheduler.borrow_mut().kill(id, time);
        }
        self.scheduler.borrow().drain_ready();
    }

    /// One round of spec.md §4.7 steps 3–7: route newly-started Comms,
    /// assemble and solve this round's constraints, compute Δt, and apply
    /// it.
    fn advance_round(&mut self) -> Result<(), EngineError> {
        self.promote_starting();
        self.route_new_comms();

        let snapshots = self.snapshot_started();
        let (variables, constraints, var_meta) = self.build_round(&snapshots);
        let rates = sg_solver::solve(&variables, &constraints);

        let sleep_ids: Vec<ActivityId> = {
            let kernel = self.kernel.borrow();
            kernel.iter().filter(|(_, a)| a.state() == ActivityState::Started && matches!(a.kind(), ActivityKind::Sleep(_))).map(|(id, _)| id).collect()
        };

        let dt = self.compute_dt(&rates, &var_meta, &sleep_ids);

        if !dt.is_finite() {
            let blocked: Vec<Blocked> = self
                .scheduler
                .borrow()
                .blocked()
                .map(|(&id, a)| Blocked { actor: id, name: a.name().to_string(), waiting_on: a.waiting_on() })
                .collect();
            log::warn!("deadlock at t={}: {} actor(s) blocked", self.clock.get(), blocked.len());
            return Err(EngineError::Deadlock(blocked));
        }

        self.apply_round(dt, &rates, &var_meta, &sleep_ids);
        Ok(())
    }

    /// `starting -> started` for every Exec/Io/Sleep posted since the last
    /// round (spec.md §4.4: a Comm's own halves are promoted by
    /// `sg-mailbox` as soon as they fuse; everything else waits for the
    /// engine to pick it up here).
    fn promote_starting(&mut self) {
        let time = self.clock.get();
        let ids: Vec<ActivityId> = {
            let kernel = self.kernel.borrow();
            kernel
                .iter()
                .filter(|(_, a)| a.state() == ActivityState::Starting)
                .filter(|(_, a)| !matches!(a.kind(), ActivityKind::Comm(_)))
                .map(|(id, _)| id)
                .collect()
        };
        for id in ids {
            self.kernel.borrow_mut().mark_started(id, time);
        }
    }

    fn route_new_comms(&mut self) {
        let ids: Vec<ActivityId> = {
            let kernel = self.kernel.borrow();
            kernel
                .iter()
                .filter(|(_, a)| a.state() == ActivityState::Started)
                .filter(|(_, a)| matches!(a.kind(), ActivityKind::Comm(c) if !c.routed))
                .map(|(id, _)| id)
                .collect()
        };
        for id in ids {
            let (src, dst) = {
                let kernel = self.kernel.borrow();
                match kernel.get(id).map(|a| a.kind()) {
                    Some(ActivityKind::Comm(c)) => (c.src_host, c.dst_host),
                    _ => (None, None),
                }
            };
            let (Some(src), Some(dst)) = (src, dst) else { continue };
            match self.platform.route(src, dst) {
                Ok(route) => {
                    let mut kernel = self.kernel.borrow_mut();
                    if let Some(ActivityKind::Comm(c)) = kernel.get_mut(id).map(|a| a.kind_mut()) {
                        c.route = route.links;
                        c.latency_remaining = route.latency;
                        c.routed = true;
                    }
                }
                Err(err) => {
                    log::debug!("comm {id:?} has no route from host {src} to host {dst}: {err}");
                    self.kernel.borrow_mut().fail(id, self.clock.get(), FailureKind::NetworkFailure);
                }
            }
        }
    }

    fn snapshot_started(&self) -> Vec<(ActivityId, ActivityKind)> {
        let kernel = self.kernel.borrow();
        kernel
            .iter()
            .filter(|(_, a)| a.state() == ActivityState::Started)
            .filter_map(|(id, a)| match a.kind() {
                ActivityKind::Exec(e) => Some((id, ActivityKind::Exec(e.clone()))),
                ActivityKind::Comm(c) if !c.in_latency_phase() => Some((
                    id,
                    ActivityKind::Comm(sg_kernel::comm::CommData {
                        direction: c.direction,
                        src_host: c.src_host,
                        dst_host: c.dst_host,
                        route: c.route.clone(),
                        size: c.size,
                        remaining: c.remaining,
                        latency_remaining: c.latency_remaining,
                        routed: c.routed,
                        bound: c.bound,
                        priority: c.priority,
                        payload: None,
                        src_buff: c.src_buff,
                        dst_buff: c.dst_buff,
                        peer: c.peer,
                        on_cleanup: None,
                    }),
                )),
                ActivityKind::Io(i) => Some((id, ActivityKind::Io(i.clone()))),
                _ => None,
            })
            .collect()
    }

    fn build_round(&mut self, snapshots: &[(ActivityId, ActivityKind)]) -> (Vec<Variable>, Vec<Constraint>, Vec<(ActivityId, RoundKind)>) {
        let mut variables = Vec::new();
        let mut var_meta = Vec::new();
        let mut book = ConstraintBook::new();
        let clock = self.clock.get();

        for (id, kind) in snapshots {
            match kind {
                ActivityKind::Exec(e) => {
                    let vid = variables.len();
                    variables.push(Variable::new().with_bound(e.bound).with_priority(e.priority));
                    let hosts_weights: Vec<(HostId, f64)> = e.hosts.iter().copied().zip(e.initial_flops.iter().copied()).collect();
                    for &(host, weight) in &hosts_weights {
                        let bound = sg_resources::cpu::bound(self.platform.host(host), clock);
                        book.add_member(ConstraintKey::Cpu(host), vid, weight, || Constraint::shared(bound));
                    }
                    if let Some(matrix) = &e.comm_matrix {
                        for i in 0..e.hosts.len() {
                            for j in 0..e.hosts.len() {
                                if i == j || matrix[i][j] <= 0.0 {
                                    continue;
                                }
                                if let Ok(route) = self.platform.route(e.hosts[i], e.hosts[j]) {
                                    for link in route.links {
                                        let bound = sg_resources::network::bound(self.platform.link(link));
                                        book.add_member(ConstraintKey::Link(link), vid, matrix[i][j], || Constraint::shared(bound));
                                    }
                                }
                            }
                        }
                    }
                    var_meta.push((*id, RoundKind::Exec { hosts_weights }));
                }
                ActivityKind::Comm(c) => {
                    let vid = variables.len();
                    variables.push(Variable::new().with_bound(c.bound).with_priority(c.priority));
                    for &link in &c.route {
                        let policy = self.platform.link(link).sharing_policy();
                        let bound = sg_resources::network::bound(self.platform.link(link));
                        book.add_member(ConstraintKey::Link(link), vid, sg_resources::network::DEFAULT_WEIGHT, || make_link_constraint(policy, bound));
                        if self.config.network_crosstraffic {
                            book.add_member(ConstraintKey::Link(link), vid, sg_resources::network::CROSSTRAFFIC_WEIGHT, || {
                                make_link_constraint(policy, bound)
                            });
                        }
                    }
                    var_meta.push((*id, RoundKind::Comm));
                }
                ActivityKind::Io(io) => {
                    let vid = variables.len();
                    variables.push(Variable::new().with_bound(io.bound).with_priority(io.priority));
                    let disk = self.platform.disk(io.disk);
                    let (key, bound) = match io.op {
                        sg_kernel::io::IoOp::Read => (ConstraintKey::DiskRead(io.disk), sg_resources::disk::bound(disk, sg_resources::disk::IoDirection::Read)),
                        sg_kernel::io::IoOp::Write => (ConstraintKey::DiskWrite(io.disk), sg_resources::disk::bound(disk, sg_resources::disk::IoDirection::Write)),
                    };
                    book.add_member(key, vid, sg_resources::disk::WEIGHT, || Constraint::shared(bound));
                    let aggregate = sg_resources::disk::aggregate_bound(disk);
                    book.add_member(ConstraintKey::DiskAggregate(io.disk), vid, sg_resources::disk::WEIGHT, || Constraint::shared(aggregate));
                    var_meta.push((*id, RoundKind::Io));
                }
                _ => {}
            }
        }

        (variables, book.into_constraints(), var_meta)
    }

    fn compute_dt(&self, rates: &[f64], var_meta: &[(ActivityId, RoundKind)], sleep_ids: &[ActivityId]) -> f64 {
        let kernel = self.kernel.borrow();
        let mut dt = f64::INFINITY;

        for (vid, (id, kind)) in var_meta.iter().enumerate() {
            let rate = rates[vid];
            if rate <= sg_solver::EPSILON {
                continue;
            }
            let remaining = match (kind, kernel.get(*id).map(|a| a.kind())) {
                (RoundKind::Exec { hosts_weights }, Some(ActivityKind::Exec(e))) => hosts_weights
                    .iter()
                    .enumerate()
                    .map(|(i, &(_, w))| if w <= sg_solver::EPSILON { f64::INFINITY } else { e.remaining_flops[i] / (rate * w) })
                    .fold(f64::INFINITY, f64::min),
                (RoundKind::Comm, Some(ActivityKind::Comm(c))) => c.remaining / rate,
                (RoundKind::Io, Some(ActivityKind::Io(io))) => io.remaining / rate,
                _ => f64::INFINITY,
            };
            dt = dt.min(remaining);
        }

        for &id in sleep_ids {
            if let Some(ActivityKind::Sleep(s)) = kernel.get(id).map(|a| a.kind()) {
                dt = dt.min(s.remaining);
            }
        }

        for (_, a) in kernel.iter() {
            if let ActivityKind::Comm(c) = a.kind() {
                if a.state() == ActivityState::Started && c.in_latency_phase() {
                    dt = dt.min(c.latency_remaining);
                }
            }
        }

        if let Some(event) = self.trace_events.peek() {
            dt = dt.min((event.time - self.clock.get()).max(0.0));
        }

        dt
    }

    fn apply_round(&mut self, dt: f64, rates: &[f64], var_meta: &[(ActivityId, RoundKind)], sleep_ids: &[ActivityId]) {
        let time = self.clock.get() + dt;
        self.clock.set(time);
        log::trace!("advancing clock by {dt} to {time}");

        while let Some(event) = self.trace_events.peek() {
            if event.time > time + self.config.surf_precision {
                break;
            }
            let event = self.trace_events.pop().unwrap();
            match event.kind {
                TraceKind::Host(host, on) => self.apply_host_power(host, on),
                TraceKind::Link(link, on) => self.apply_link_power(link, on),
            }
        }

        let mut cpu_touched: HashMap<HostId, (f64, f64)> = HashMap::new();

        for (vid, (id, kind)) in var_meta.iter().enumerate() {
            let rate = rates[vid];
            let finished = {
                let mut kernel = self.kernel.borrow_mut();
                match (kind, kernel.get_mut(*id).map(|a| a.kind_mut())) {
                    (RoundKind::Exec { hosts_weights }, Some(ActivityKind::Exec(e))) => {
                        for (i, &(host, weight)) in hosts_weights.iter().enumerate() {
                            let consumed = rate * weight * dt;
                            e.remaining_flops[i] = (e.remaining_flops[i] - consumed).max(0.0);
                            let entry = cpu_touched.entry(host).or_insert((0.0, 0.0));
                            entry.0 += rate * weight;
                        }
                        e.is_done(sg_kernel::EPSILON)
                    }
                    (RoundKind::Comm, Some(ActivityKind::Comm(c))) => {
                        c.remaining = (c.remaining - rate * dt).max(0.0);
                        c.remaining <= sg_kernel::EPSILON
                    }
                    (RoundKind::Io, Some(ActivityKind::Io(io))) => {
                        io.remaining = (io.remaining - rate * dt).max(0.0);
                        io.remaining <= sg_kernel::EPSILON
                    }
                    _ => false,
                }
            };
            if finished {
                self.kernel.borrow_mut().finish(*id, time);
                self.signals.activity_completion.fire(&ActivityCompletion { activity: *id, outcome: Outcome::Finished });
            }
        }

        for (host, (consumed, _)) in cpu_touched {
            let peak = self.platform.host(host).peak_speed() * self.platform.host(host).core_count() as f64;
            let utilization = if peak > 0.0 { (consumed / peak).min(1.0) } else { 0.0 };
            self.signals.cpu_update.fire(&CpuUtilization { host, utilization });
        }

        let latency_ids: Vec<ActivityId> = {
            let kernel = self.kernel.borrow();
            kernel
                .iter()
                .filter(|(_, a)| a.state() == ActivityState::Started)
                .filter(|(_, a)| matches!(a.kind(), ActivityKind::Comm(c) if c.in_latency_phase()))
                .map(|(id, _)| id)
                .collect()
        };
        for id in latency_ids {
            let mut kernel = self.kernel.borrow_mut();
            if let Some(ActivityKind::Comm(c)) = kernel.get_mut(id).map(|a| a.kind_mut()) {
                c.latency_remaining = (c.latency_remaining - dt).max(0.0);
            }
        }

        for &id in sleep_ids {
            let done = {
                let mut kernel = self.kernel.borrow_mut();
                if let Some(ActivityKind::Sleep(s)) = kernel.get_mut(id).map(|a| a.kind_mut()) {
                    s.remaining = (s.remaining - dt).max(0.0);
                    s.remaining <= sg_kernel::EPSILON
                } else {
                    false
                }
            };
            if done {
                self.kernel.borrow_mut().finish(id, time);
                self.signals.activity_completion.fire(&ActivityCompletion { activity: id, outcome: Outcome::Finished });
            }
        }
    }

    fn apply_host_power(&mut self, host: HostId, on: bool) {
        log::debug!("host {host} powering {}", if on { "on" } else { "off" });
        self.platform.set_host_power(host, on);
        self.signals.power_change.fire(&PowerChange::Host(host, on));

        if on {
            let restarts = self.pending_restarts.remove(&host).unwrap_or_default();
            for id in restarts {
                Scheduler::restart(&self.scheduler, id);
            }
            return;
        }

        let time = self.clock.get();
        let touching: Vec<(ActivityId, FailureKind)> = {
            let kernel = self.kernel.borrow();
            kernel
                .iter()
                .filter(|(_, a)| a.state() == ActivityState::Started)
                .filter_map(|(id, a)| {
                    let kind = a.kind();
                    if activity_touches_host(kind, host, &self.platform) {
                        let failure = if matches!(kind, ActivityKind::Comm(_)) { FailureKind::NetworkFailure } else { FailureKind::HostFailure };
                        Some((id, failure))
                    } else {
                        None
                    }
                })
                .collect()
        };
        for (id, failure) in touching {
            self.kernel.borrow_mut().fail(id, time, failure);
        }

        let actors = self.scheduler.borrow().actors_on_host(host);
        let mut restarts = Vec::new();
        for actor_id in actors {
            if let Some(actor) = self.scheduler.borrow().get(actor_id) {
                if actor.auto_restart() {
                    restarts.push(actor_id);
                }
            }
            self.scheduler.borrow_mut().kill(actor_id, time);
        }
        if !restarts.is_empty() {
            self.pending_restarts.entry(host).or_default().extend(restarts);
        }
    }

    fn apply_link_power(&mut self, link: LinkId, on: bool) {
        log::debug!("link {link} powering {}", if on { "on" } else { "off" });
        self.platform.set_link_power(link, on);
        self.signals.power_change.fire(&PowerChange::Link(link, on));
        if on {
            return;
        }
        let time = self.clock.get();
        let touching: Vec<ActivityId> = {
            let kernel = self.kernel.borrow();
            kernel
                .iter()
                .filter(|(_, a)| a.state() == ActivityState::Started)
                .filter(|(_, a)| matches!(a.kind(), ActivityKind::Comm(c) if c.route.contains(&link)))
                .map(|(id, _)| id)
                .collect()
        };
        for id in touching {
            self.kernel.borrow_mut().fail(id, time, FailureKind::NetworkFailure);
        }
    }
}

fn make_link_constraint(policy: SharingPolicy, bound: f64) -> Constraint {
    match policy {
        SharingPolicy::Fatpipe => Constraint::fatpipe(bound),
        SharingPolicy::Wifi => Constraint::wifi(bound),
        SharingPolicy::Shared => Constraint::shared(bound),
    }
}

fn activity_touches_host(kind: &ActivityKind, host: HostId, platform: &PlatformGraph) -> bool {
    match kind {
        ActivityKind::Exec(e) => e.hosts.contains(&host),
        ActivityKind::Comm(c) => c.src_host == Some(host) || c.dst_host == Some(host),
        ActivityKind::Io(io) => disk_host(platform, io.disk) == Some(host),
        ActivityKind::Sleep(_) | ActivityKind::Synchro(_) => false,
    }
}

fn disk_host(platform: &PlatformGraph, disk: DiskId) -> Option<HostId> {
    Some(platform.disk(disk).host())
}
