//! Point-in-time printer state.
//!
//! Every field is independently present or absent. The printer only
//! reports what is currently relevant, so `None` means "unknown or
//! unchanged" and is never a stand-in for zero.

/// Overlays `src` onto `dst` when `src` carries a value.
fn overlay<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(value) = src {
        *dst = Some(value.clone());
    }
}

/// Merges two positional lists element by element, growing `dst` as needed.
fn overlay_positional<T: Clone + Default>(
    dst: &mut Vec<T>,
    src: &[T],
    merge: impl Fn(&mut T, &T),
) {
    if dst.len() < src.len() {
        dst.resize_with(src.len(), T::default);
    }
    for (slot, incoming) in dst.iter_mut().zip(src) {
        merge(slot, incoming);
    }
}

/// A single filament tray inside an AMS unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmsTray {
    /// Remaining filament, percent.
    pub remaining_percent: Option<u32>,
    /// Material token, e.g. `PLA`.
    pub material: Option<String>,
    /// Color as reported by the printer (hex RGBA).
    pub color: Option<String>,
}

impl AmsTray {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.remaining_percent, &other.remaining_percent);
        overlay(&mut self.material, &other.material);
        overlay(&mut self.color, &other.color);
    }
}

/// One AMS unit, addressed by its position in the unit list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmsUnit {
    /// Relative humidity, percent.
    pub humidity: Option<f64>,
    /// Temperature in °C.
    pub temperature: Option<f64>,
    /// Trays in slot order.
    pub trays: Vec<AmsTray>,
}

impl AmsUnit {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.humidity, &other.humidity);
        overlay(&mut self.temperature, &other.temperature);
        overlay_positional(&mut self.trays, &other.trays, AmsTray::merge_from);
    }
}

/// Automatic Material System state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ams {
    /// Whether the AMS is enabled.
    pub enabled: Option<bool>,
    /// Whether the AMS is powered.
    pub powered: Option<bool>,
    /// Units in positional order.
    pub units: Vec<AmsUnit>,
}

impl Ams {
    fn merge_from(&mut self, other: &Self) {
        overlay(&mut self.enabled, &other.enabled);
        overlay(&mut self.powered, &other.powered);
        overlay_positional(&mut self.units, &other.units, AmsUnit::merge_from);
    }
}

/// Built-in camera state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Camera {
    /// Whether the camera is recording.
    pub recording: Option<bool>,
    /// Whether timelapse capture is enabled.
    pub timelapse_enabled: Option<bool>,
}

/// Lighting state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lights {
    /// Whether the chamber light is on.
    pub chamber_on: Option<bool>,
}

/// Fan speeds in percent, keyed by fixed fan identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fans {
    /// Auxiliary (side) fan.
    pub auxiliary: Option<f64>,
    /// Chamber exhaust fan.
    pub chamber: Option<f64>,
    /// Part cooling fan.
    pub part: Option<f64>,
    /// Hotend heatsink fan.
    pub hotend: Option<f64>,
}

/// G-code execution state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gcode {
    /// Free-form state token, e.g. `RUNNING` or `FINISH`.
    pub state: Option<String>,
    /// File currently being printed.
    pub current_file_name: Option<String>,
}

/// Hotend nozzle state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nozzle {
    /// Nozzle diameter in millimetres.
    pub diameter_mm: Option<f64>,
    /// Current temperature in °C.
    pub temperature_c: Option<f64>,
    /// Target temperature in °C.
    pub target_temperature_c: Option<i32>,
    /// Nozzle type token, e.g. `hardened_steel`.
    pub kind: Option<String>,
}

/// Print speed profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Speed {
    /// Speed magnitude in percent of nominal.
    pub magnitude: Option<u32>,
    /// Level name, e.g. `standard` or `sport`.
    pub level_name: Option<String>,
}

/// Progress of the current print job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentPrint {
    /// Layer being printed.
    pub layer_number: Option<u32>,
    /// Total layers in the job.
    pub layer_number_target: Option<u32>,
    /// Completion, 0 to 100.
    pub percent_complete: Option<u32>,
    /// Estimated minutes left.
    pub remaining_minutes: Option<u32>,
}

/// Complete read of printer state, one struct per subsystem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    /// Automatic Material System.
    pub ams: Ams,
    /// Built-in camera.
    pub camera: Camera,
    /// Lighting.
    pub lights: Lights,
    /// Fan speeds.
    pub fans: Fans,
    /// G-code execution.
    pub gcode: Gcode,
    /// Hotend nozzle.
    pub nozzle: Nozzle,
    /// Speed profile.
    pub speed: Speed,
    /// Current job progress.
    pub print: CurrentPrint,
    /// Raw wifi signal as reported, e.g. `-47dBm`.
    pub wifi_signal: Option<String>,
}

impl StateSnapshot {
    /// Overlays every present field of `other` onto `self`.
    ///
    /// AMS units and trays are merged by position.
    pub fn merge_from(&mut self, other: &Self) {
        self.ams.merge_from(&other.ams);

        overlay(&mut self.camera.recording, &other.camera.recording);
        overlay(&mut self.camera.timelapse_enabled, &other.camera.timelapse_enabled);

        overlay(&mut self.lights.chamber_on, &other.lights.chamber_on);

        overlay(&mut self.fans.auxiliary, &other.fans.auxiliary);
        overlay(&mut self.fans.chamber, &other.fans.chamber);
        overlay(&mut self.fans.part, &other.fans.part);
        overlay(&mut self.fans.hotend, &other.fans.hotend);

        overlay(&mut self.gcode.state, &other.gcode.state);
        overlay(&mut self.gcode.current_file_name, &other.gcode.current_file_name);

        overlay(&mut self.nozzle.diameter_mm, &other.nozzle.diameter_mm);
        overlay(&mut self.nozzle.temperature_c, &other.nozzle.temperature_c);
        overlay(
            &mut self.nozzle.target_temperature_c,
            &other.nozzle.target_temperature_c,
        );
        overlay(&mut self.nozzle.kind, &other.nozzle.kind);

        overlay(&mut self.speed.magnitude, &other.speed.magnitude);
        overlay(&mut self.speed.level_name, &other.speed.level_name);

        overlay(&mut self.print.layer_number, &other.print.layer_number);
        overlay(
            &mut self.print.layer_number_target,
            &other.print.layer_number_target,
        );
        overlay(&mut self.print.percent_complete, &other.print.percent_complete);
        overlay(&mut self.print.remaining_minutes, &other.print.remaining_minutes);

        overlay(&mut self.wifi_signal, &other.wifi_signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_fields_absent_from_delta() {
        let mut state = StateSnapshot::default();
        state.nozzle.temperature_c = Some(220.0);
        state.gcode.current_file_name = Some("benchy.gcode".into());

        let mut delta = StateSnapshot::default();
        delta.print.percent_complete = Some(12);

        state.merge_from(&delta);

        assert_eq!(state.nozzle.temperature_c, Some(220.0));
        assert_eq!(state.gcode.current_file_name.as_deref(), Some("benchy.gcode"));
        assert_eq!(state.print.percent_complete, Some(12));
    }

    #[test]
    fn test_merge_overwrites_present_fields() {
        let mut state = StateSnapshot::default();
        state.lights.chamber_on = Some(true);

        let mut delta = StateSnapshot::default();
        delta.lights.chamber_on = Some(false);
        state.merge_from(&delta);

        assert_eq!(state.lights.chamber_on, Some(false));
    }

    #[test]
    fn test_merge_ams_units_by_position() {
        let mut state = StateSnapshot::default();
        state.ams.units = vec![AmsUnit {
            humidity: Some(30.0),
            temperature: Some(24.0),
            trays: Vec::new(),
        }];

        let mut delta = StateSnapshot::default();
        delta.ams.units = vec![
            AmsUnit {
                humidity: Some(31.0),
                ..Default::default()
            },
            AmsUnit {
                humidity: Some(55.0),
                ..Default::default()
            },
        ];
        state.merge_from(&delta);

        assert_eq!(state.ams.units.len(), 2);
        assert_eq!(state.ams.units[0].humidity, Some(31.0));
        assert_eq!(state.ams.units[0].temperature, Some(24.0));
        assert_eq!(state.ams.units[1].humidity, Some(55.0));
    }
}
