//! Handles for running key watches.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle for the watch tasks started by one `subscribe` call.
///
/// Watches run for as long as the process does unless they are cancelled
/// explicitly, either through this handle or through
/// [`ConfigClient::shutdown`](crate::core::ConfigClient::shutdown). Dropping the
/// handle leaves the watches running.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::prelude::*;
///
/// # async fn example(client: ConfigClient) {
/// let subscription = client.subscribe("app.feature-flag", |key, value| {
///     println!("{key} changed to {value}");
/// });
///
/// // Later, stop watching and wait for the tasks to exit
/// subscription.shutdown().await;
/// # }
/// ```
#[derive(Debug)]
pub struct Subscription {
    key: String,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(key: impl Into<String>, token: CancellationToken, tasks: Vec<JoinHandle<()>>) -> Self {
        Self {
            key: key.into(),
            token,
            tasks,
        }
    }

    /// The watched key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of sources that accepted the watch.
    ///
    /// Zero means no active source supports change notification.
    pub fn watch_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal all watch tasks of this subscription to stop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the subscription has been cancelled (directly or by client shutdown).
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the subscription and wait for its watch tasks to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
