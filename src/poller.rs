// Message polling
// Periodic receive loop with deterministic start/stop

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::messages::MessageReceiver;
use crate::models::Message;

/// How long `stop` waits for the polling task to finish
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Polling configuration
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between polls
    pub interval: Duration,

    /// Maximum messages fetched per poll
    pub limit: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            limit: 10,
        }
    }
}

/// Polls for new messages on a background task
///
/// The first poll runs immediately. Poll failures are logged and polling continues.
/// Dropping a running poller cancels its task.
pub struct Poller {
    receiver: Arc<MessageReceiver>,
    config: PollerConfig,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(receiver: Arc<MessageReceiver>, config: PollerConfig) -> Self {
        Self {
            receiver,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start polling; `callback` runs for every non-empty batch
    pub async fn start<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(Vec<Message>) + Send + Sync + 'static,
    {
        if self.is_running() {
            return Err(Error::InvalidState("poller already running".to_string()));
        }

        tracing::info!(
            "Starting message polling with {} seconds interval",
            self.config.interval.as_secs_f64()
        );

        // Fresh token so the poller can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let receiver = Arc::clone(&self.receiver);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::poll_loop(receiver, config, cancel, callback).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Cancel the polling task and wait for it to finish
    pub async fn stop(&mut self) -> Result<()> {
        let handle = match self.task_handle.take() {
            Some(handle) => handle,
            None => return Err(Error::InvalidState("poller not running".to_string())),
        };

        self.cancellation_token.cancel();

        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Polling task panicked: {}", e);
                return Err(Error::InvalidState("polling task panicked".to_string()));
            }
            Err(_) => {
                tracing::warn!("Polling task did not complete within timeout");
                return Err(Error::InvalidState("polling task stop timed out".to_string()));
            }
        }

        tracing::info!("Message polling stopped");
        Ok(())
    }

    /// A poller is running while its task is alive
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn poll_loop<F>(
        receiver: Arc<MessageReceiver>,
        config: PollerConfig,
        cancel: CancellationToken,
        callback: F,
    ) where
        F: Fn(Vec<Message>) + Send + Sync + 'static,
    {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = receiver.receive_messages(config.limit, false) => match result {
                    Ok(batch) if !batch.messages.is_empty() => {
                        tracing::info!("Found {} new messages", batch.messages.len());
                        callback(batch.messages);
                    }
                    Ok(_) => tracing::debug!("No new messages found"),
                    Err(e) => tracing::error!("Error in polling: {}", e),
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.interval) => {}
            }
        }

        tracing::debug!("Polling loop exited");
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if self.is_running() {
            tracing::warn!("Poller dropped while running; cancelling");
        }
        self.cancellation_token.cancel();
    }
}
