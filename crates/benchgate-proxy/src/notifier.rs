//! HTTP implementation of the fire-and-forget [`Notifier`].

use std::time::Duration;

use benchgate_core::{Command, Notifier};
use tokio::runtime::Handle;
use tracing::debug;

/// Sends [`Command`]s as `GET`s on a spawned task and ignores the outcome.
///
/// A batch handed to [`Notifier::notify_all`] shares one task and is sent
/// strictly in order.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Notifier for HttpNotifier {
    fn notify(&self, command: Command) {
        self.notify_all(vec![command]);
    }

    fn notify_all(&self, commands: Vec<Command>) {
        if commands.is_empty() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            debug!(count = commands.len(), "no runtime, commands dropped");
            return;
        };
        let client = self.client.clone();
        handle.spawn(async move {
            for command in commands {
                let url = command.url();
                match client.get(&url).send().await {
                    Ok(response) => {
                        debug!(%url, status = %response.status(), "command delivered")
                    }
                    Err(e) => debug!(%url, error = %e, "command failed"),
                }
            }
        });
    }
}
