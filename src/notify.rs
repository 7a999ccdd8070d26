//! Status notifications and indicator events for the presentation layer.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

pub const DEFAULT_DISMISS_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, auto-dismissing status line.
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
    #[serde(skip)]
    pub dismiss_after: Duration,
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Status(StatusMessage),
    ProgressShown { title: String, message: String },
    ProgressHidden,
    /// The segment collection or a segment field changed; re-project.
    SegmentsChanged,
    SpeakersChanged,
    VideoLoaded { url: String, filename: String },
}

/// Cheap handle for emitting [`UiEvent`]s. Sends are dropped if nobody listens.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<UiEvent>,
    dismiss_after: Duration,
}

impl Notifier {
    pub fn channel(dismiss_after: Duration) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx, dismiss_after },
            rx,
        )
    }

    pub fn emit(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }

    pub fn status(&self, level: StatusLevel, text: impl Into<String>) {
        self.emit(UiEvent::Status(StatusMessage {
            level,
            text: text.into(),
            dismiss_after: self.dismiss_after,
        }));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.status(StatusLevel::Info, text);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.status(StatusLevel::Success, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.status(StatusLevel::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.status(StatusLevel::Error, text);
    }
}
