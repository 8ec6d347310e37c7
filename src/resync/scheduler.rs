//! Timer-driven full state requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ResyncConfig;
use crate::device::DeviceClient;
use crate::shutdown;

/// Shortest accepted interval between requests.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Issues one full state request after `initial_delay`, then one every
/// `interval`, until shutdown.
///
/// Request failures are logged and the schedule keeps going. Once
/// shutdown is observed no further request is sent.
#[derive(Debug, Clone)]
pub struct ResyncScheduler {
    initial_delay: Duration,
    interval: Duration,
}

impl ResyncScheduler {
    /// Creates a scheduler. An `interval` below [`MIN_INTERVAL`] is
    /// raised to it.
    pub fn new(initial_delay: Duration, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(
                interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                "Resync interval too short, using minimum"
            );
        }
        Self {
            initial_delay,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Creates a scheduler from the `[resync]` section.
    pub fn from_config(config: &ResyncConfig) -> Self {
        Self::new(config.initial_delay(), config.interval())
    }

    /// Runs the schedule against `client` until shutdown.
    pub async fn run<C: DeviceClient>(&self, client: Arc<C>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            initial_delay_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX),
            interval_secs = self.interval.as_secs(),
            "Resync scheduler started"
        );

        tokio::select! {
            biased;
            _ = shutdown::cancelled(&mut shutdown) => {
                tracing::info!("Resync scheduler cancelled before first request");
                return;
            }
            _ = tokio::time::sleep(self.initial_delay) => {}
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.request(client.as_ref(), &mut shutdown).await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown::cancelled(&mut shutdown) => {
                    tracing::info!("Resync scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => self.request(client.as_ref(), &mut shutdown).await,
            }
        }
    }

    async fn request<C: DeviceClient>(&self, client: &C, shutdown: &mut watch::Receiver<bool>) {
        if shutdown::is_cancelled(shutdown) {
            return;
        }

        tokio::select! {
            biased;
            _ = shutdown::cancelled(shutdown) => {
                tracing::debug!("Full state request abandoned on shutdown");
            }
            result = client.publish_full_state_request() => match result {
                Ok(()) => tracing::debug!("Full state request sent"),
                Err(e) => tracing::warn!(error = %e, "Full state request failed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceError, DeviceMessage};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingClient {
        requests: AtomicUsize,
        fail: bool,
    }

    impl RecordingClient {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl DeviceClient for RecordingClient {
        fn connect(&self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn disconnect(&self) {}

        fn subscribe(&self, _sink: mpsc::Sender<DeviceMessage>) {}

        fn publish_full_state_request(
            &self,
        ) -> impl Future<Output = Result<(), DeviceError>> + Send {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            async move {
                if fail {
                    Err(DeviceError::PublishFailed("printer offline".into()))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn scheduler() -> ResyncScheduler {
        ResyncScheduler::new(Duration::from_secs(1), Duration::from_secs(300))
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_request_after_delay_then_interval() {
        let client = Arc::new(RecordingClient::default());
        let (_tx, rx) = shutdown::channel();
        let runner = Arc::clone(&client);
        tokio::spawn(async move { scheduler().run(runner, rx).await });

        sleep_ms(999).await;
        assert_eq!(client.requests(), 0);

        sleep_ms(2).await;
        assert_eq!(client.requests(), 1);

        sleep_ms(299_000).await;
        assert_eq!(client.requests(), 1);

        sleep_ms(1_000).await;
        assert_eq!(client.requests(), 2);

        sleep_ms(300_000).await;
        assert_eq!(client.requests(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_schedule() {
        let client = Arc::new(RecordingClient::failing());
        let (_tx, rx) = shutdown::channel();
        let runner = Arc::clone(&client);
        tokio::spawn(async move { scheduler().run(runner, rx).await });

        sleep_ms(1_000 + 2 * 300_000 + 1).await;
        assert_eq!(client.requests(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_request_after_shutdown() {
        let client = Arc::new(RecordingClient::default());
        let (tx, rx) = shutdown::channel();
        let runner = Arc::clone(&client);
        let handle = tokio::spawn(async move { scheduler().run(runner, rx).await });

        sleep_ms(2_000).await;
        assert_eq!(client.requests(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();

        sleep_ms(600_000).await;
        assert_eq!(client.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let scheduler = ResyncScheduler::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(scheduler.interval, MIN_INTERVAL);

        let client = Arc::new(RecordingClient::default());
        let (_tx, rx) = shutdown::channel();
        let runner = Arc::clone(&client);
        tokio::spawn(async move { scheduler.run(runner, rx).await });

        sleep_ms(1).await;
        assert_eq!(client.requests(), 1);

        sleep_ms(1_000).await;
        assert_eq!(client.requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_initial_delay() {
        let client = Arc::new(RecordingClient::default());
        let (tx, rx) = shutdown::channel();
        let runner = Arc::clone(&client);
        let handle = tokio::spawn(async move { scheduler().run(runner, rx).await });

        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(client.requests(), 0);
    }
}
