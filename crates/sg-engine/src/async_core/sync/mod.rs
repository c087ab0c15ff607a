//! Synchronization primitives built on top of the async core.

use crate::async_details_core;

async_details_core! {
    pub mod channel;
}
