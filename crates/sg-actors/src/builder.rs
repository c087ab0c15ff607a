//! `ActorBuilder` (spec.md §4.6 `create`): configures an actor before its
//! fiber is spawned.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use sg_platform::HostId;

use crate::actor::{ActorId, Entry, DEFAULT_STACK_SIZE};
use crate::context::ActorContext;
use crate::error::Killed;
use crate::scheduler::Scheduler;

/// Builds and spawns one actor.
pub struct ActorBuilder {
    name: String,
    host: HostId,
    stack_size: usize,
    daemon: bool,
    auto_restart: bool,
    parent: Option<ActorId>,
    properties: Vec<(String, String)>,
}

impl ActorBuilder {
    /// A builder for an actor named `name` starting on `host`.
    pub fn new(name: impl Into<String>, host: HostId) -> Self {
        Self {
            name: name.into(),
            host,
            stack_size: DEFAULT_STACK_SIZE,
            daemon: false,
            auto_restart: false,
            parent: None,
            properties: Vec::new(),
        }
    }

    /// Pins a property readable via `Actor::property` after spawn
    /// (supplemental feature; see SPEC_FULL.md).
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Overrides the default stack size (spec.md §6 `contexts/stack-size`,
    /// per-actor override).
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Sets the daemon bit before spawn (spec.md §4.6 `daemonize`).
    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    /// Sets the auto-restart bit before spawn (spec.md §4.6 `auto_restart`).
    pub fn auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    /// Records the spawning actor as this one's parent (spec.md §3 "parent
    /// PID").
    pub fn parent(mut self, parent: ActorId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Spawns the actor, running `body` as its entry function (spec.md §4.6
    /// `create(host, fn, args)`; `args` are whatever `body`'s closure
    /// captures).
    pub fn spawn<F, Fut>(self, scheduler: &Rc<RefCell<Scheduler>>, body: F) -> ActorId
    where
        F: Fn(ActorContext) -> Fut + 'static,
        Fut: Future<Output = Result<(), Killed>> + 'static,
    {
        let entry: Entry = Rc::new(move |ctx| Box::pin(body(ctx)) as std::pin::Pin<Box<dyn Future<Output = Result<(), Killed>>>>);
        let id = Scheduler::spawn(scheduler, self.name, self.host, entry, self.parent);
        {
            let mut s = scheduler.borrow_mut();
            if let Some(a) = s.actors_mut().get_mut(&id) {
                a.stack_size = self.stack_size;
                a.daemon = self.daemon;
                a.auto_restart = self.auto_restart;
                for (key, value) in self.properties {
                    a.set_property(key, value);
                }
            }
            if self.daemon {
                s.daemonize(id);
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;
    use sg_kernel::Kernel;
    use sg_mailbox::MailboxRegistry;
    use sg_platform::{PlatformGraph, RoutingMethod};

    fn new_scheduler() -> Rc<RefCell<Scheduler>> {
        let kernel = Rc::new(RefCell::new(Kernel::new()));
        let mailboxes = Rc::new(RefCell::new(MailboxRegistry::new(kernel.clone())));
        let clock = Rc::new(StdCell::new(0.0));
        Rc::new(RefCell::new(Scheduler::new(kernel, mailboxes, clock)))
    }

    #[test]
    fn spawned_actor_runs_to_its_first_suspension() {
        let scheduler = new_scheduler();
        let mut graph = PlatformGraph::new("root", RoutingMethod::Full);
        let root = graph.root();
        let host = graph.add_host("h", root, 1e9, 1).unwrap();

        let ran = Rc::new(StdCell::new(false));
        let ran_clone = ran.clone();
        let id = ActorBuilder::new("a", host).spawn(&scheduler, move |ctx| {
            let ran = ran_clone.clone();
            async move {
                ran.set(true);
                ctx.sleep_for(1.0).await
            }
        });

        // `create` only enqueues the fiber (spec.md §4.6); it runs to its
        // first suspension point on the next drain of the ready queue.
        assert!(!ran.get());
        scheduler.borrow().drain_ready();
        assert!(ran.get());
        assert_eq!(scheduler.borrow().get(id).unwrap().name(), "a");
    }

    #[test]
    fn pinned_properties_are_readable_after_spawn() {
        let scheduler = new_scheduler();
        let mut graph = PlatformGraph::new("root", RoutingMethod::Full);
        let root = graph.root();
        let host = graph.add_host("h", root, 1e9, 1).unwrap();

        let id = ActorBuilder::new("a", host)
            .property("role", "worker")
            .spawn(&scheduler, |_ctx| async move { Ok::<(), Killed>(()) });

        assert_eq!(scheduler.borrow().get(id).unwrap().property("role"), Some("worker"));
        assert_eq!(scheduler.borrow().get(id).unwrap().property("missing"), None);
    }
}
