//! Maintains the current printer snapshot from device messages.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

use super::StateSnapshot;
use crate::device::DeviceMessage;
use crate::lifecycle::PrintEvent;
use crate::shutdown;

/// Folds device reports into the latest known state and fans them out.
///
/// Consumers get two independent bounded queues: one carrying each
/// device report as delivered, in order, and one carrying lifecycle
/// events. Neither send waits, so a stalled consumer on one queue never
/// holds up the other; a message that does not fit is dropped with a
/// warning.
///
/// The merged state is kept only for [`StateSource::current_state`].
pub struct StateSource {
    state: watch::Sender<StateSnapshot>,
    reports: mpsc::Sender<StateSnapshot>,
    events: mpsc::Sender<PrintEvent>,
}

impl StateSource {
    /// Creates a source with an empty snapshot.
    ///
    /// Returns the source, the report receiver and the lifecycle receiver.
    pub fn new(
        report_capacity: usize,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<StateSnapshot>, mpsc::Receiver<PrintEvent>) {
        let (state, _) = watch::channel(StateSnapshot::default());
        let (reports, updates) = mpsc::channel(report_capacity.max(1));
        let (events, lifecycle) = mpsc::channel(event_capacity.max(1));
        (
            Self {
                state,
                reports,
                events,
            },
            updates,
            lifecycle,
        )
    }

    /// Returns a copy of the latest merged snapshot.
    pub fn current_state(&self) -> StateSnapshot {
        self.state.borrow().clone()
    }

    /// Applies one device message.
    pub fn apply(&self, message: DeviceMessage) {
        match message {
            DeviceMessage::Report(report) => {
                self.state.send_modify(|state| state.merge_from(&report));
                match self.reports.try_send(report) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("State update queue full, report dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!("No update listener, report dropped");
                    }
                }
            }
            DeviceMessage::Lifecycle(event) => match self.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(event = %event, "Lifecycle queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(event = %event, "No lifecycle listener, event dropped");
                }
            },
        }
    }

    /// Consumes device messages until shutdown or until the device side closes.
    pub async fn run(
        self,
        mut messages: mpsc::Receiver<DeviceMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("State source started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown::cancelled(&mut shutdown) => {
                    tracing::info!("State source shutting down");
                    break;
                }
                message = messages.recv() => match message {
                    Some(message) => self.apply(message),
                    None => {
                        tracing::info!("Device message stream closed");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with_percent(percent: u32) -> DeviceMessage {
        let mut snapshot = StateSnapshot::default();
        snapshot.print.percent_complete = Some(percent);
        DeviceMessage::Report(snapshot)
    }

    #[test]
    fn test_report_updates_current_state_and_is_queued() {
        let (source, mut updates, _events) = StateSource::new(8, 8);

        source.apply(report_with_percent(42));

        assert_eq!(updates.try_recv().unwrap().print.percent_complete, Some(42));
        assert_eq!(source.current_state().print.percent_complete, Some(42));
    }

    #[test]
    fn test_queued_reports_are_not_merged() {
        let (source, mut updates, _events) = StateSource::new(8, 8);

        let mut first = StateSnapshot::default();
        first.gcode.current_file_name = Some("A.gcode".into());
        source.apply(DeviceMessage::Report(first));
        source.apply(report_with_percent(10));

        let state = source.current_state();
        assert_eq!(state.gcode.current_file_name.as_deref(), Some("A.gcode"));
        assert_eq!(state.print.percent_complete, Some(10));

        let first = updates.try_recv().unwrap();
        assert_eq!(first.print.percent_complete, None);
        let second = updates.try_recv().unwrap();
        assert_eq!(second.gcode.current_file_name, None);
        assert_eq!(second.print.percent_complete, Some(10));
    }

    #[test]
    fn test_lifecycle_events_forwarded_in_order() {
        let (source, _updates, mut events) = StateSource::new(8, 8);

        source.apply(DeviceMessage::Lifecycle(PrintEvent::Started));
        source.apply(DeviceMessage::Lifecycle(PrintEvent::Failed));

        assert_eq!(events.try_recv(), Ok(PrintEvent::Started));
        assert_eq!(events.try_recv(), Ok(PrintEvent::Failed));
    }

    #[test]
    fn test_full_lifecycle_queue_does_not_stall_updates() {
        let (source, mut updates, mut events) = StateSource::new(8, 1);

        source.apply(DeviceMessage::Lifecycle(PrintEvent::Started));
        source.apply(DeviceMessage::Lifecycle(PrintEvent::Finished));
        source.apply(report_with_percent(3));

        assert_eq!(updates.try_recv().unwrap().print.percent_complete, Some(3));
        assert_eq!(events.try_recv(), Ok(PrintEvent::Started));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_closed_listeners_are_tolerated() {
        let (source, updates, events) = StateSource::new(8, 8);
        drop(updates);
        drop(events);

        source.apply(report_with_percent(9));
        source.apply(DeviceMessage::Lifecycle(PrintEvent::Started));

        assert_eq!(source.current_state().print.percent_complete, Some(9));
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let (source, _updates, _events) = StateSource::new(8, 8);
        let (_device_tx, device_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = shutdown::channel();

        let handle = tokio::spawn(source.run(device_rx, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_forwards_messages_until_stream_closes() {
        let (source, mut updates, _events) = StateSource::new(8, 8);
        let (device_tx, device_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = shutdown::channel();

        device_tx.send(report_with_percent(7)).await.unwrap();
        drop(device_tx);
        source.run(device_rx, shutdown_rx).await;

        assert_eq!(updates.recv().await.unwrap().print.percent_complete, Some(7));
        assert!(updates.recv().await.is_none());
    }
}
