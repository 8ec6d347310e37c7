//! Periodic full-state resynchronization.
//!
//! Printers only push fields that change. Without a periodic "push
//! everything" request, metrics for quiet fields go stale after a
//! reconnect or a missed message.

mod scheduler;

pub use scheduler::{ResyncScheduler, MIN_INTERVAL};
