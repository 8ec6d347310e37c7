//! In-process printer used for demonstrations and tests.
//!
//! Plays a repeating print cycle: a short idle period, a job that
//! advances by a fixed step per tick, then a finish (or a cancellation
//! every `cancel_every` jobs). Regular ticks send partial reports the
//! way a real printer does; a full state request sends everything.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{DeviceClient, DeviceError, DeviceMessage};
use crate::config::SimulationConfig;
use crate::lifecycle::PrintEvent;
use crate::state::{AmsTray, AmsUnit, StateSnapshot};

const LAYERS_PER_JOB: u32 = 250;
const MINUTES_PER_JOB: u32 = 90;
const NOZZLE_TARGET_C: i32 = 220;
const NOZZLE_IDLE_C: f64 = 28.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Printing,
}

/// Mutable state of the simulated machine.
#[derive(Debug)]
struct Machine {
    phase: Phase,
    job: u32,
    percent: u32,
    idle_remaining: u32,
    file: Option<String>,
    gcode_state: &'static str,
}

impl Machine {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            job: 0,
            percent: 0,
            idle_remaining: 0,
            file: None,
            gcode_state: "IDLE",
        }
    }

    fn layer(&self) -> u32 {
        self.percent * LAYERS_PER_JOB / 100
    }

    fn remaining_minutes(&self) -> u32 {
        (100 - self.percent) * MINUTES_PER_JOB / 100
    }

    fn nozzle_temperature(&self) -> f64 {
        match self.phase {
            Phase::Printing => f64::from(NOZZLE_TARGET_C),
            Phase::Idle => NOZZLE_IDLE_C,
        }
    }

    /// Advances one tick and returns the messages the printer would emit.
    fn advance(&mut self, config: &SimulationConfig) -> Vec<DeviceMessage> {
        match self.phase {
            Phase::Idle => {
                if self.idle_remaining > 0 {
                    self.idle_remaining -= 1;
                    return Vec::new();
                }
                self.job += 1;
                self.percent = 0;
                self.file = Some(format!("job-{:03}.gcode", self.job));
                self.phase = Phase::Printing;
                self.gcode_state = "RUNNING";

                let mut report = self.progress_report();
                report.gcode.current_file_name = self.file.clone();
                report.print.layer_number_target = Some(LAYERS_PER_JOB);
                report.nozzle.target_temperature_c = Some(NOZZLE_TARGET_C);

                vec![
                    DeviceMessage::Lifecycle(PrintEvent::Started),
                    DeviceMessage::Report(report),
                ]
            }
            Phase::Printing => {
                self.percent = (self.percent + config.progress_step).min(100);

                let cancel = config.cancel_every > 0
                    && self.job % config.cancel_every == 0
                    && self.percent >= 50;
                if cancel {
                    self.finish_job(config, "IDLE");
                    return vec![
                        DeviceMessage::Report(self.progress_report()),
                        DeviceMessage::Lifecycle(PrintEvent::Cancelled),
                    ];
                }

                if self.percent == 100 {
                    self.finish_job(config, "FINISH");
                    return vec![
                        DeviceMessage::Report(self.progress_report()),
                        DeviceMessage::Lifecycle(PrintEvent::Finished),
                    ];
                }

                vec![DeviceMessage::Report(self.progress_report())]
            }
        }
    }

    fn finish_job(&mut self, config: &SimulationConfig, gcode_state: &'static str) {
        self.phase = Phase::Idle;
        self.idle_remaining = config.idle_ticks;
        self.gcode_state = gcode_state;
    }

    /// Partial report sent on every printing tick. Omits the file name.
    fn progress_report(&self) -> StateSnapshot {
        let mut report = StateSnapshot::default();
        report.gcode.state = Some(self.gcode_state.to_string());
        report.print.percent_complete = Some(self.percent);
        report.print.layer_number = Some(self.layer());
        report.print.remaining_minutes = Some(self.remaining_minutes());
        report.nozzle.temperature_c = Some(self.nozzle_temperature());
        report
    }

    /// Everything the printer knows.
    fn full_report(&self) -> StateSnapshot {
        let mut report = self.progress_report();

        report.ams.enabled = Some(true);
        report.ams.powered = Some(true);
        report.ams.units = (0..2u32)
            .map(|unit| AmsUnit {
                humidity: Some(30.0 + f64::from(unit) * 5.0),
                temperature: Some(24.5),
                trays: (0..4u32)
                    .map(|tray| AmsTray {
                        remaining_percent: Some(100 - (unit * 4 + tray) * 10),
                        material: Some("PLA".to_string()),
                        color: Some("FFFFFFFF".to_string()),
                    })
                    .collect(),
            })
            .collect();

        report.camera.recording = Some(true);
        report.camera.timelapse_enabled = Some(false);
        report.lights.chamber_on = Some(true);

        let printing = self.phase == Phase::Printing;
        report.fans.auxiliary = Some(0.0);
        report.fans.chamber = Some(if printing { 40.0 } else { 0.0 });
        report.fans.part = Some(if printing { 100.0 } else { 0.0 });
        report.fans.hotend = Some(if printing { 100.0 } else { 0.0 });

        report.gcode.current_file_name = self.file.clone();

        report.nozzle.diameter_mm = Some(0.4);
        report.nozzle.target_temperature_c = Some(if printing { NOZZLE_TARGET_C } else { 0 });
        report.nozzle.kind = Some("hardened_steel".to_string());

        report.speed.magnitude = Some(100);
        report.speed.level_name = Some("standard".to_string());

        report.print.layer_number_target = Some(LAYERS_PER_JOB);
        report.wifi_signal = Some("-47dBm".to_string());
        report
    }
}

/// A [`DeviceClient`] that simulates a printer in-process.
pub struct SimulatedPrinter {
    config: SimulationConfig,
    machine: Arc<Mutex<Machine>>,
    sink: Arc<Mutex<Option<mpsc::Sender<DeviceMessage>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedPrinter {
    /// Creates a disconnected simulated printer.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            machine: Arc::new(Mutex::new(Machine::new())),
            sink: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }

    /// Returns true while the print cycle is running.
    pub fn is_connected(&self) -> bool {
        lock(&self.task).is_some()
    }
}

impl DeviceClient for SimulatedPrinter {
    fn connect(&self) -> Result<(), DeviceError> {
        self.config
            .validate()
            .map_err(|e| DeviceError::ConnectFailed(e.to_string()))?;

        let mut task = lock(&self.task);
        if task.is_some() {
            return Err(DeviceError::AlreadyConnected);
        }

        let machine = Arc::clone(&self.machine);
        let sink = Arc::clone(&self.sink);
        let config = self.config.clone();
        *task = Some(tokio::spawn(run_cycle(machine, sink, config)));

        tracing::info!(tick_ms = self.config.tick_ms, "Simulated printer connected");
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
            tracing::info!("Simulated printer disconnected");
        }
    }

    fn subscribe(&self, sink: mpsc::Sender<DeviceMessage>) {
        *lock(&self.sink) = Some(sink);
    }

    fn publish_full_state_request(
        &self,
    ) -> impl std::future::Future<Output = Result<(), DeviceError>> + Send {
        let connected = self.is_connected();
        let sink = lock(&self.sink).clone();
        let report = lock(&self.machine).full_report();

        async move {
            if !connected {
                return Err(DeviceError::NotConnected);
            }
            let sink = sink.ok_or(DeviceError::NoSubscriber)?;
            sink.send(DeviceMessage::Report(report))
                .await
                .map_err(|e| DeviceError::PublishFailed(e.to_string()))
        }
    }
}

impl Drop for SimulatedPrinter {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_cycle(
    machine: Arc<Mutex<Machine>>,
    sink: Arc<Mutex<Option<mpsc::Sender<DeviceMessage>>>>,
    config: SimulationConfig,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_ms));
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let messages = lock(&machine).advance(&config);
        let subscriber = lock(&sink).clone();
        let Some(subscriber) = subscriber else {
            continue;
        };

        for message in messages {
            if subscriber.send(message).await.is_err() {
                tracing::debug!("Subscriber dropped, stopping print cycle");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig {
            tick_ms: 10,
            progress_step: 25,
            idle_ticks: 1,
            cancel_every: 2,
        }
    }

    fn lifecycle_events(messages: &[DeviceMessage]) -> Vec<PrintEvent> {
        messages
            .iter()
            .filter_map(|m| match m {
                DeviceMessage::Lifecycle(event) => Some(*event),
                DeviceMessage::Report(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_first_tick_starts_job_with_file_name() {
        let mut machine = Machine::new();
        let messages = machine.advance(&config());

        assert_eq!(lifecycle_events(&messages), vec![PrintEvent::Started]);
        let report = messages
            .iter()
            .find_map(|m| match m {
                DeviceMessage::Report(r) => Some(r),
                DeviceMessage::Lifecycle(_) => None,
            })
            .unwrap();
        assert_eq!(report.gcode.current_file_name.as_deref(), Some("job-001.gcode"));
        assert_eq!(report.gcode.state.as_deref(), Some("RUNNING"));
    }

    #[test]
    fn test_progress_reports_omit_file_name() {
        let mut machine = Machine::new();
        let config = config();
        machine.advance(&config);

        let messages = machine.advance(&config);
        match &messages[..] {
            [DeviceMessage::Report(report)] => {
                assert_eq!(report.print.percent_complete, Some(25));
                assert!(report.gcode.current_file_name.is_none());
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[test]
    fn test_cycle_finishes_then_cancels_every_second_job() {
        let mut machine = Machine::new();
        let config = config();

        let mut events = Vec::new();
        for _ in 0..12 {
            events.extend(lifecycle_events(&machine.advance(&config)));
        }

        assert_eq!(
            &events[..4],
            &[
                PrintEvent::Started,
                PrintEvent::Finished,
                PrintEvent::Started,
                PrintEvent::Cancelled,
            ]
        );
    }

    #[test]
    fn test_full_report_populates_every_subsystem() {
        let report = Machine::new().full_report();

        assert_eq!(report.ams.units.len(), 2);
        assert_eq!(report.wifi_signal.as_deref(), Some("-47dBm"));
        assert!(report.fans.hotend.is_some());
        assert!(report.nozzle.kind.is_some());
        assert!(report.speed.level_name.is_some());
    }

    #[tokio::test]
    async fn test_full_state_request_requires_connection() {
        let printer = SimulatedPrinter::new(config());
        let (tx, _rx) = mpsc::channel(4);
        printer.subscribe(tx);

        assert!(matches!(
            printer.publish_full_state_request().await,
            Err(DeviceError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_state_request_delivers_report() {
        let printer = SimulatedPrinter::new(config());
        let (tx, mut rx) = mpsc::channel(16);
        printer.subscribe(tx);
        printer.connect().unwrap();

        printer.publish_full_state_request().await.unwrap();

        match rx.recv().await {
            Some(DeviceMessage::Report(report)) => {
                assert_eq!(report.wifi_signal.as_deref(), Some("-47dBm"));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        printer.disconnect();
        assert!(!printer.is_connected());
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let printer = SimulatedPrinter::new(config());
        printer.connect().unwrap();
        assert!(matches!(printer.connect(), Err(DeviceError::AlreadyConnected)));
    }
}
