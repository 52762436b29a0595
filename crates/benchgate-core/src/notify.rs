//! Best-effort notification contract.
//!
//! A [`Notifier`] accepts a [`Command`] and returns immediately. There is no
//! result channel: delivery failures never reach the caller. The HTTP
//! implementation lives in `benchgate-proxy`.

use std::sync::Mutex;
use std::sync::PoisonError;

use crate::types::Command;

/// Sink for fire-and-forget downstream commands.
pub trait Notifier: Send + Sync {
    fn notify(&self, command: Command);

    /// Deliver `commands` in order, each one only after the previous finished.
    fn notify_all(&self, commands: Vec<Command>) {
        for command in commands {
            self.notify(command);
        }
    }
}

/// Discards every command.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _command: Command) {}
}

/// Keeps every command in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Command>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Command> {
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *sent)
    }

    /// URLs of everything recorded so far, without draining.
    pub fn urls(&self) -> Vec<String> {
        let sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.iter().map(Command::url).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, command: Command) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_drains_in_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Command::new("a:1", "/poweroff"));
        notifier.notify(Command::new("b:2", "/cleanUp"));

        assert_eq!(notifier.urls(), vec!["http://a:1/poweroff", "http://b:2/cleanUp"]);
        assert_eq!(notifier.take().len(), 2);
        assert!(notifier.take().is_empty());
    }

    #[test]
    fn notify_all_keeps_batch_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify_all(vec![
            Command::new("c:1", "/startbmc"),
            Command::new("c:1", "/startbmcconsole"),
        ]);
        assert_eq!(
            notifier.urls(),
            vec!["http://c:1/startbmc", "http://c:1/startbmcconsole"]
        );
    }
}
