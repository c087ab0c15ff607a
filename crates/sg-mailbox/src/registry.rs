//! Name-indexed mailbox storage, mirroring `sg-platform`'s
//! name-to-id registries (spec.md §4.5: mailboxes are looked up by name,
//! created lazily on first use).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sg_kernel::Kernel;

use crate::mailbox::{Mailbox, MailboxId};

/// Owns every [`Mailbox`] in a simulation, keyed by name.
pub struct MailboxRegistry {
    kernel: Rc<RefCell<Kernel>>,
    mailboxes: Vec<Mailbox>,
    by_name: HashMap<String, MailboxId>,
}

impl MailboxRegistry {
    /// An empty registry sharing `kernel` with every mailbox it creates.
    pub fn new(kernel: Rc<RefCell<Kernel>>) -> Self {
        Self { kernel, mailboxes: Vec::new(), by_name: HashMap::new() }
    }

    /// Returns the mailbox named `name`, creating it if this is the first
    /// reference (spec.md §4.5: mailboxes spring into existence on lookup).
    pub fn get_or_create(&mut self, name: &str) -> MailboxId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.mailboxes.len();
        self.mailboxes.push(Mailbox::new(id, name, self.kernel.clone()));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Looks up an existing mailbox by name without creating one.
    pub fn find(&self, name: &str) -> Option<MailboxId> {
        self.by_name.get(name).copied()
    }

    /// Borrows a mailbox by id.
    pub fn get(&self, id: MailboxId) -> &Mailbox {
        &self.mailboxes[id]
    }

    /// Mutably borrows a mailbox by id.
    pub fn get_mut(&mut self, id: MailboxId) -> &mut Mailbox {
        &mut self.mailboxes[id]
    }
}
