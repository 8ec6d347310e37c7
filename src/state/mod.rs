//! Printer state model and the source that maintains it.
//!
//! The [`StateSource`] folds device messages into a current
//! [`StateSnapshot`], queues each report for projection as delivered,
//! and forwards lifecycle notifications on their own queue.

mod snapshot;
mod source;

pub use snapshot::{
    Ams, AmsTray, AmsUnit, Camera, CurrentPrint, Fans, Gcode, Lights, Nozzle, Speed,
    StateSnapshot,
};
pub use source::StateSource;
