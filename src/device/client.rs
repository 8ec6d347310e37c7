//! Device client abstraction.
//!
//! The transport session to the printer lives behind this trait. The
//! exporter only ever asks for a full state push and reads what the
//! client delivers to its subscription sink.

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::lifecycle::PrintEvent;
use crate::state::StateSnapshot;

/// Errors that can occur during device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to connect to device: {0}")]
    ConnectFailed(String),
    #[error("device already connected")]
    AlreadyConnected,
    #[error("device not connected")]
    NotConnected,
    #[error("no subscriber registered")]
    NoSubscriber,
    #[error("failed to publish request: {0}")]
    PublishFailed(String),
}

/// A message delivered by the device client to its subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    /// A (possibly partial) state report.
    Report(StateSnapshot),
    /// A discrete print lifecycle notification.
    Lifecycle(PrintEvent),
}

/// Trait for printer connections.
///
/// Implementations own the session; all methods take `&self` so one
/// client can be shared between the resync scheduler and shutdown.
pub trait DeviceClient: Send + Sync + 'static {
    /// Establishes the session. Failure here is fatal at startup.
    fn connect(&self) -> Result<(), DeviceError>;

    /// Tears the session down. Idempotent.
    fn disconnect(&self);

    /// Registers the sink that receives every message from the device.
    fn subscribe(&self, sink: mpsc::Sender<DeviceMessage>);

    /// Asks the device to re-publish its complete current state.
    fn publish_full_state_request(
        &self,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;
}
