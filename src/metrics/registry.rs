//! Printer metric instruments and their registry.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

use crate::lifecycle::PrintEvent;

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "bambulab";

/// Constant label identifying the printer on every series.
pub const DEVICE_LABEL: &str = "device";

/// Names of all registered instruments, without the namespace prefix.
pub const INSTRUMENT_NAMES: &[&str] = &[
    "ams_enabled_state",
    "ams_powered_state",
    "ams_humidity",
    "ams_temperature",
    "ams_filament_remaining",
    "camera_enabled_state",
    "camera_timelapse_state",
    "chamber_light_state",
    "fan_speed_percent",
    "gcode_state",
    "layer_number",
    "layer_number_target",
    "nozzle_diameter",
    "nozzle_temperature",
    "nozzle_temperature_target",
    "nozzle_speed_level",
    "nozzle_speed_magnitude",
    "nozzle_type_state",
    "print_percent",
    "print_time_remaining_minutes",
    "prints_total",
    "wifi_signal",
];

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

fn opts(name: &str, help: &str, device_id: &str) -> Opts {
    Opts::new(name, help)
        .namespace(NAMESPACE)
        .const_label(DEVICE_LABEL, device_id)
}

/// Every instrument the exporter writes, registered once with the device
/// identifier baked in as a constant label.
///
/// Instruments are individually atomic; nothing here is transactional
/// across instruments.
pub struct PrinterMetrics {
    registry: Registry,

    // AMS
    pub(crate) ams_enabled: IntGauge,
    pub(crate) ams_powered: IntGauge,
    pub(crate) ams_humidity: GaugeVec,
    pub(crate) ams_temperature: GaugeVec,
    pub(crate) ams_filament_remaining: IntGaugeVec,

    // Camera and lights
    pub(crate) camera_enabled: IntGauge,
    pub(crate) camera_timelapse: IntGauge,
    pub(crate) chamber_light: IntGauge,

    pub(crate) fan_speed: GaugeVec,
    pub(crate) gcode_state: IntGaugeVec,

    pub(crate) layer_number: IntGauge,
    pub(crate) layer_number_target: IntGauge,

    // Nozzle
    pub(crate) nozzle_diameter: Gauge,
    pub(crate) nozzle_temperature: Gauge,
    pub(crate) nozzle_temperature_target: IntGauge,
    pub(crate) nozzle_speed_level: IntGaugeVec,
    pub(crate) nozzle_speed_magnitude: IntGauge,
    pub(crate) nozzle_type: IntGaugeVec,

    // Print job
    pub(crate) print_percent: IntGaugeVec,
    pub(crate) print_time_remaining: IntGaugeVec,
    pub(crate) prints_total: IntCounterVec,

    pub(crate) wifi_signal: Gauge,
}

impl PrinterMetrics {
    /// Creates and registers all instruments for one printer.
    ///
    /// Registering an instrument twice is a configuration error and is
    /// returned rather than tolerated.
    pub fn new(device_id: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let ams_enabled = IntGauge::with_opts(opts(
            "ams_enabled_state",
            "Whether the AMS is enabled (1=enabled, 0=disabled)",
            device_id,
        ))?;
        let ams_powered = IntGauge::with_opts(opts(
            "ams_powered_state",
            "Whether the AMS is powered (1=on, 0=off)",
            device_id,
        ))?;
        let ams_humidity = GaugeVec::new(
            opts("ams_humidity", "AMS unit relative humidity in percent", device_id),
            &["unit"],
        )?;
        let ams_temperature = GaugeVec::new(
            opts("ams_temperature", "AMS unit temperature in degrees Celsius", device_id),
            &["unit"],
        )?;
        let ams_filament_remaining = IntGaugeVec::new(
            opts(
                "ams_filament_remaining",
                "Filament remaining in an AMS tray, percent",
                device_id,
            ),
            &["id", "material", "color"],
        )?;

        let camera_enabled = IntGauge::with_opts(opts(
            "camera_enabled_state",
            "Whether the camera is recording (1=recording, 0=off)",
            device_id,
        ))?;
        let camera_timelapse = IntGauge::with_opts(opts(
            "camera_timelapse_state",
            "Whether timelapse capture is enabled (1=enabled, 0=disabled)",
            device_id,
        ))?;
        let chamber_light = IntGauge::with_opts(opts(
            "chamber_light_state",
            "Whether the chamber light is on (1=on, 0=off)",
            device_id,
        ))?;

        let fan_speed = GaugeVec::new(
            opts("fan_speed_percent", "Fan speed in percent", device_id),
            &["fan"],
        )?;
        let gcode_state = IntGaugeVec::new(
            opts(
                "gcode_state",
                "Last seen G-code state (1 on the most recent state label)",
                device_id,
            ),
            &["state"],
        )?;

        let layer_number = IntGauge::with_opts(opts(
            "layer_number",
            "Layer currently being printed",
            device_id,
        ))?;
        let layer_number_target = IntGauge::with_opts(opts(
            "layer_number_target",
            "Total layers of the current print",
            device_id,
        ))?;

        let nozzle_diameter = Gauge::with_opts(opts(
            "nozzle_diameter",
            "Nozzle diameter in millimetres",
            device_id,
        ))?;
        let nozzle_temperature = Gauge::with_opts(opts(
            "nozzle_temperature",
            "Nozzle temperature in degrees Celsius",
            device_id,
        ))?;
        let nozzle_temperature_target = IntGauge::with_opts(opts(
            "nozzle_temperature_target",
            "Nozzle target temperature in degrees Celsius",
            device_id,
        ))?;
        let nozzle_speed_level = IntGaugeVec::new(
            opts(
                "nozzle_speed_level",
                "Last seen speed level (1 on the most recent level label)",
                device_id,
            ),
            &["level"],
        )?;
        let nozzle_speed_magnitude = IntGauge::with_opts(opts(
            "nozzle_speed_magnitude",
            "Print speed magnitude in percent of nominal",
            device_id,
        ))?;
        let nozzle_type = IntGaugeVec::new(
            opts(
                "nozzle_type_state",
                "Last seen nozzle type (1 on the most recent type label)",
                device_id,
            ),
            &["type"],
        )?;

        let print_percent = IntGaugeVec::new(
            opts("print_percent", "Print completion in percent", device_id),
            &["model"],
        )?;
        let print_time_remaining = IntGaugeVec::new(
            opts(
                "print_time_remaining_minutes",
                "Estimated minutes remaining for the print",
                device_id,
            ),
            &["model"],
        )?;
        let prints_total = IntCounterVec::new(
            opts("prints_total", "Print lifecycle events by result", device_id),
            &["result"],
        )?;

        let wifi_signal = Gauge::with_opts(opts(
            "wifi_signal",
            "Wifi signal strength in dBm",
            device_id,
        ))?;

        // Register all metrics
        registry.register(Box::new(ams_enabled.clone()))?;
        registry.register(Box::new(ams_powered.clone()))?;
        registry.register(Box::new(ams_humidity.clone()))?;
        registry.register(Box::new(ams_temperature.clone()))?;
        registry.register(Box::new(ams_filament_remaining.clone()))?;
        registry.register(Box::new(camera_enabled.clone()))?;
        registry.register(Box::new(camera_timelapse.clone()))?;
        registry.register(Box::new(chamber_light.clone()))?;
        registry.register(Box::new(fan_speed.clone()))?;
        registry.register(Box::new(gcode_state.clone()))?;
        registry.register(Box::new(layer_number.clone()))?;
        registry.register(Box::new(layer_number_target.clone()))?;
        registry.register(Box::new(nozzle_diameter.clone()))?;
        registry.register(Box::new(nozzle_temperature.clone()))?;
        registry.register(Box::new(nozzle_temperature_target.clone()))?;
        registry.register(Box::new(nozzle_speed_level.clone()))?;
        registry.register(Box::new(nozzle_speed_magnitude.clone()))?;
        registry.register(Box::new(nozzle_type.clone()))?;
        registry.register(Box::new(print_percent.clone()))?;
        registry.register(Box::new(print_time_remaining.clone()))?;
        registry.register(Box::new(prints_total.clone()))?;
        registry.register(Box::new(wifi_signal.clone()))?;

        // Every result series exists from the start, at zero.
        for event in PrintEvent::ALL {
            prints_total.with_label_values(&[event.label()]);
        }

        Ok(Self {
            registry,
            ams_enabled,
            ams_powered,
            ams_humidity,
            ams_temperature,
            ams_filament_remaining,
            camera_enabled,
            camera_timelapse,
            chamber_light,
            fan_speed,
            gcode_state,
            layer_number,
            layer_number_target,
            nozzle_diameter,
            nozzle_temperature,
            nozzle_temperature_target,
            nozzle_speed_level,
            nozzle_speed_magnitude,
            nozzle_type,
            print_percent,
            print_time_remaining,
            prints_total,
            wifi_signal,
        })
    }

    /// Increments `prints_total` for one lifecycle result.
    pub fn record_print_event(&self, event: PrintEvent) {
        self.prints_total.with_label_values(&[event.label()]).inc();
    }

    /// Current `prints_total` value for one lifecycle result.
    pub fn print_event_count(&self, event: PrintEvent) -> u64 {
        self.prints_total.with_label_values(&[event.label()]).get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
