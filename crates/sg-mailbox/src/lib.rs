//! Mailboxes (spec.md §4.5, component C5): FIFO rendez-vous points that
//! fuse a posted sender Comm with a posted receiver Comm, built on top of
//! `sg-kernel`'s Comm activity and peer-propagation machinery.

pub mod mailbox;
pub mod registry;

pub use mailbox::{Mailbox, MailboxId};
pub use registry::MailboxRegistry;
