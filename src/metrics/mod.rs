//! Prometheus metrics for a single printer.
//!
//! All instruments live under the `bambulab_` namespace and carry a
//! constant `device` label.
//!
//! # Metrics Exposed
//!
//! ## AMS
//! - `bambulab_ams_enabled_state`, `bambulab_ams_powered_state` - 1/0 flags
//! - `bambulab_ams_humidity{unit}`, `bambulab_ams_temperature{unit}` - per unit, keyed by position
//! - `bambulab_ams_filament_remaining{id,material,color}` - per tray
//!
//! ## Camera and Lights
//! - `bambulab_camera_enabled_state`, `bambulab_camera_timelapse_state`
//! - `bambulab_chamber_light_state`
//!
//! ## Motion and Nozzle
//! - `bambulab_fan_speed_percent{fan}` - auxiliary, chamber, part, hotend
//! - `bambulab_nozzle_diameter`, `bambulab_nozzle_temperature`, `bambulab_nozzle_temperature_target`
//! - `bambulab_nozzle_speed_magnitude`
//! - `bambulab_nozzle_speed_level{level}`, `bambulab_nozzle_type_state{type}`
//!
//! ## Print Job
//! - `bambulab_gcode_state{state}`
//! - `bambulab_layer_number`, `bambulab_layer_number_target`
//! - `bambulab_print_percent{model}`, `bambulab_print_time_remaining_minutes{model}`
//! - `bambulab_prints_total{result}` - start, finish, cancel, fail
//!
//! ## Network
//! - `bambulab_wifi_signal` - dBm
//!
//! # Level-encoded vectors
//!
//! `gcode_state`, `nozzle_speed_level` and `nozzle_type_state` set the
//! label of the current value to 1 and never clear labels set earlier.
//! Read them as "last seen instant" per label, not as a one-hot vector.
//!
//! # Example
//!
//! ```no_run
//! use bambulab_exporter::metrics::PrinterMetrics;
//!
//! let metrics = PrinterMetrics::new("01S00A000000000").expect("Failed to create registry");
//! let text = metrics.encode().expect("Failed to encode metrics");
//! println!("{text}");
//! ```

mod registry;
mod server;

pub use registry::{MetricsError, PrinterMetrics, DEVICE_LABEL, INSTRUMENT_NAMES, NAMESPACE};
pub use server::{router, MetricsServer, MetricsServerConfig, ServerError};
