//! Projection of printer state onto metric instruments.
//!
//! The [`Projector`] maps each subsystem of a [`StateSnapshot`] to its
//! instruments. Absent fields are never coerced to a default; the
//! instrument keeps its last written value.
//!
//! Known limitations carried by the metric names:
//!
//! - String states (`gcode_state`, `nozzle_type_state`,
//!   `nozzle_speed_level`) set the current label to 1 and do not clear
//!   labels seen earlier.
//! - AMS units are labeled by list position. If the printer reorders
//!   units, attribution follows the position.
//!
//! [`StateSnapshot`]: crate::state::StateSnapshot

mod convert;
mod engine;

pub use convert::{flag, parse_dbm, DBM_SUFFIX};
pub use engine::Projector;
