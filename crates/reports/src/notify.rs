//! User-facing notices.
//!
//! Controllers never print. They push [`Notice`]s into a channel and the
//! presentation layer drains it with [`Notices::recv`] or
//! [`Notices::drain`].

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

/// How a notice should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Neutral progress information.
    Info,
    /// An action completed.
    Success,
    /// An action failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/// A transient, user-facing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Presentation severity.
    pub severity: Severity,
    /// Text to show.
    pub message: String,
}

impl Notice {
    /// Creates an informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    /// Creates a success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    /// Creates an error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Sending half of the notice channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    /// Sends a notice. A closed receiver is not an error; the notice is only
    /// logged.
    pub fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Error => warn!(message = %notice.message, "Notice"),
            Severity::Info | Severity::Success => info!(message = %notice.message, "Notice"),
        }
        let _ = self.tx.send(notice);
    }

    /// Sends an informational notice.
    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notice::info(message));
    }

    /// Sends a success notice.
    pub fn success(&self, message: impl Into<String>) {
        self.notify(Notice::success(message));
    }

    /// Sends an error notice.
    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notice::error(message));
    }
}

/// Receiving half of the notice channel.
#[derive(Debug)]
pub struct Notices {
    rx: mpsc::UnboundedReceiver<Notice>,
}

impl Notices {
    /// Waits for the next notice. Returns `None` once every [`Notifier`] is
    /// gone.
    pub async fn recv(&mut self) -> Option<Notice> {
        self.rx.recv().await
    }

    /// Returns every notice queued so far without waiting.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.rx.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

/// Creates a connected notifier and receiver.
#[must_use]
pub fn channel() -> (Notifier, Notices) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier { tx }, Notices { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notices_arrive_in_order() {
        let (notifier, mut notices) = channel();
        notifier.info("Upload started. Job ID: J1");
        notifier.success("Upload completed successfully.");

        assert_eq!(
            notices.recv().await,
            Some(Notice::info("Upload started. Job ID: J1"))
        );
        assert_eq!(
            notices.drain(),
            vec![Notice::success("Upload completed successfully.")]
        );
        assert!(notices.drain().is_empty());
    }

    #[test]
    fn test_notify_without_receiver_does_not_panic() {
        let (notifier, notices) = channel();
        drop(notices);
        notifier.error("Upload failed. Please try again.");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Notice::error("Please select a CSV file").to_string(),
            "[error] Please select a CSV file"
        );
    }
}
