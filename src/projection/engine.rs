//! Snapshot to metric projection.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::convert::{flag, parse_dbm};
use crate::lifecycle::{CompletionHeuristic, LifecycleMode, PrintEvent};
use crate::metrics::PrinterMetrics;
use crate::shutdown;
use crate::state::{Ams, Camera, CurrentPrint, Fans, Gcode, Lights, Nozzle, Speed, StateSnapshot};

/// Writes printer snapshots into [`PrinterMetrics`].
///
/// Each present field is written after conversion; each absent field
/// leaves its instrument untouched. Subsystems are projected
/// independently and none of them can fail.
///
/// The projector carries the last reported file name, since progress
/// updates usually omit it. In [`LifecycleMode::Percent`] it also
/// carries the last completion percent to infer finished prints.
pub struct Projector {
    metrics: Arc<PrinterMetrics>,
    file: Option<String>,
    completion: Option<CompletionHeuristic>,
}

impl Projector {
    /// Creates a projector writing into `metrics`.
    pub fn new(metrics: Arc<PrinterMetrics>, mode: LifecycleMode) -> Self {
        let completion = match mode {
            LifecycleMode::Percent => Some(CompletionHeuristic::new()),
            LifecycleMode::Events => None,
        };
        Self {
            metrics,
            file: None,
            completion,
        }
    }

    /// The file name progress metrics are attributed to.
    pub fn carried_file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Projects one snapshot.
    pub fn apply(&mut self, snapshot: &StateSnapshot) {
        // The file name must be known before progress is attributed.
        if let Some(file) = &snapshot.gcode.current_file_name {
            if self.file.as_ref() != Some(file) {
                tracing::debug!(file = %file, "Tracking print file");
                self.file = Some(file.clone());
            }
        }

        self.record_ams(&snapshot.ams);
        self.record_camera(&snapshot.camera);
        self.record_lights(&snapshot.lights);
        self.record_fans(&snapshot.fans);
        self.record_gcode(&snapshot.gcode);
        self.record_nozzle(&snapshot.nozzle);
        self.record_speed(&snapshot.speed);
        self.record_print(&snapshot.print);
        self.record_wifi(snapshot.wifi_signal.as_deref());
    }

    fn record_ams(&self, ams: &Ams) {
        if let Some(enabled) = ams.enabled {
            self.metrics.ams_enabled.set(flag(enabled));
        }
        if let Some(powered) = ams.powered {
            self.metrics.ams_powered.set(flag(powered));
        }

        // Units are labeled by position, not by any printer-assigned id.
        for (index, unit) in ams.units.iter().enumerate() {
            let label = index.to_string();
            if let Some(humidity) = unit.humidity {
                self.metrics.ams_humidity.with_label_values(&[&label]).set(humidity);
            }
            if let Some(temperature) = unit.temperature {
                self.metrics
                    .ams_temperature
                    .with_label_values(&[&label])
                    .set(temperature);
            }
            for (slot, tray) in unit.trays.iter().enumerate() {
                let Some(remaining) = tray.remaining_percent else {
                    continue;
                };
                let id = format!("{index}-{slot}");
                self.metrics
                    .ams_filament_remaining
                    .with_label_values(&[
                        &id,
                        tray.material.as_deref().unwrap_or(""),
                        tray.color.as_deref().unwrap_or(""),
                    ])
                    .set(i64::from(remaining));
            }
        }
    }

    fn record_camera(&self, camera: &Camera) {
        if let Some(recording) = camera.recording {
            self.metrics.camera_enabled.set(flag(recording));
        }
        if let Some(timelapse) = camera.timelapse_enabled {
            self.metrics.camera_timelapse.set(flag(timelapse));
        }
    }

    fn record_lights(&self, lights: &Lights) {
        if let Some(on) = lights.chamber_on {
            self.metrics.chamber_light.set(flag(on));
        }
    }

    fn record_fans(&self, fans: &Fans) {
        let speeds = [
            ("auxiliary", fans.auxiliary),
            ("chamber", fans.chamber),
            ("part", fans.part),
            ("hotend", fans.hotend),
        ];
        for (fan, speed) in speeds {
            if let Some(speed) = speed {
                self.metrics.fan_speed.with_label_values(&[fan]).set(speed);
            }
        }
    }

    // Level encoding: labels seen earlier keep their value.
    fn record_gcode(&self, gcode: &Gcode) {
        if let Some(state) = &gcode.state {
            self.metrics.gcode_state.with_label_values(&[state]).set(1);
        }
    }

    fn record_nozzle(&self, nozzle: &Nozzle) {
        if let Some(diameter) = nozzle.diameter_mm {
            self.metrics.nozzle_diameter.set(diameter);
        }
        if let Some(temperature) = nozzle.temperature_c {
            self.metrics.nozzle_temperature.set(temperature);
        }
        if let Some(target) = nozzle.target_temperature_c {
            self.metrics.nozzle_temperature_target.set(i64::from(target));
        }
        if let Some(kind) = &nozzle.kind {
            self.metrics.nozzle_type.with_label_values(&[kind]).set(1);
        }
    }

    fn record_speed(&self, speed: &Speed) {
        if let Some(magnitude) = speed.magnitude {
            self.metrics.nozzle_speed_magnitude.set(i64::from(magnitude));
        }
        if let Some(level) = &speed.level_name {
            self.metrics.nozzle_speed_level.with_label_values(&[level]).set(1);
        }
    }

    fn record_print(&mut self, print: &CurrentPrint) {
        if let Some(layer) = print.layer_number {
            self.metrics.layer_number.set(i64::from(layer));
        }
        if let Some(target) = print.layer_number_target {
            self.metrics.layer_number_target.set(i64::from(target));
        }

        let model = self.file.as_deref().unwrap_or("");
        if let Some(remaining) = print.remaining_minutes {
            self.metrics
                .print_time_remaining
                .with_label_values(&[model])
                .set(i64::from(remaining));
        }

        let Some(percent) = print.percent_complete else {
            return;
        };
        self.metrics
            .print_percent
            .with_label_values(&[model])
            .set(i64::from(percent));

        if let Some(completion) = &mut self.completion {
            if completion.observe(percent) {
                tracing::info!(model = %model, "Print completed (percent threshold)");
                self.metrics.record_print_event(PrintEvent::Finished);
            }
        }
    }

    fn record_wifi(&self, raw: Option<&str>) {
        let Some(raw) = raw else {
            return;
        };
        match parse_dbm(raw) {
            Some(dbm) => self.metrics.wifi_signal.set(dbm),
            None => tracing::debug!(raw = %raw, "Unparseable wifi signal ignored"),
        }
    }

    /// Projects every report received on `updates`, in order, until
    /// shutdown or until the state source closes.
    pub async fn run(
        mut self,
        mut updates: mpsc::Receiver<StateSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("Projection listener started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown::cancelled(&mut shutdown) => {
                    tracing::info!("Projection listener shutting down");
                    break;
                }
                update = updates.recv() => match update {
                    Some(snapshot) => self.apply(&snapshot),
                    None => {
                        tracing::info!("State source closed");
                        break;
                    }
                },
            }
        }
    }
}
