//! Bambu Lab Prometheus Exporter Library
//!
//! Projects a stream of printer state snapshots onto a fixed set of
//! labeled Prometheus instruments, counts print lifecycle edges, and
//! periodically asks the printer to re-publish its full state so the
//! metrics do not go stale.
//!
//! # Architecture
//!
//! ```text
//! device client → state source ─(mpsc: reports)────→ projector ──┐
//!      ↑                 └──────(mpsc: lifecycle)──→ detector ───┼→ metrics → /metrics
//!      └── resync scheduler (timer)                              │
//! ```
//!
//! Every unit is an independent task observing one shared shutdown
//! signal. Instruments are individually atomic; nothing requires a lock
//! across instruments.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bambulab_exporter::{
//!     lifecycle::LifecycleMode,
//!     metrics::PrinterMetrics,
//!     projection::Projector,
//!     state::StateSnapshot,
//! };
//!
//! let metrics = Arc::new(PrinterMetrics::new("01S00A000000000").unwrap());
//! let mut projector = Projector::new(Arc::clone(&metrics), LifecycleMode::Events);
//!
//! let mut snapshot = StateSnapshot::default();
//! snapshot.gcode.current_file_name = Some("benchy.gcode".into());
//! snapshot.print.percent_complete = Some(42);
//! snapshot.wifi_signal = Some("-47dBm".into());
//! projector.apply(&snapshot);
//!
//! println!("{}", metrics.encode().unwrap());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod device;
pub mod lifecycle;
pub mod metrics;
pub mod projection;
pub mod resync;
pub mod shutdown;
pub mod state;

// Re-export commonly used types at crate root
pub use config::{ConfigError, FileConfig};
pub use device::{DeviceClient, DeviceError, DeviceMessage, SimulatedPrinter};
pub use lifecycle::{CompletionHeuristic, LifecycleDetector, LifecycleMode, PrintEvent};
pub use metrics::{MetricsServer, MetricsServerConfig, PrinterMetrics};
pub use projection::Projector;
pub use resync::ResyncScheduler;
pub use state::{StateSnapshot, StateSource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
