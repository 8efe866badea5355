//! On-screen diagnostic messages
//!
//! Session progress is reported as short-lived screen messages. The sink logs
//! every message through tracing and forwards it to whoever renders the overlay.
//! Delivery is best effort: a full or closed overlay channel never blocks the
//! session worker.

use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageColor {
    Blue,
    Red,
    Cyan,
    Yellow,
}

impl fmt::Display for MessageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageColor::Blue => write!(f, "blue"),
            MessageColor::Red => write!(f, "red"),
            MessageColor::Cyan => write!(f, "cyan"),
            MessageColor::Yellow => write!(f, "yellow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenMessage {
    pub color: MessageColor,
    pub duration: Duration,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl fmt::Display for ScreenMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ({}, {:.0}s) {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.color,
            self.duration.as_secs_f32(),
            self.text
        )
    }
}

/// Tagged producer of screen messages
#[derive(Debug, Clone)]
pub struct DiagnosticsSink {
    source: String,
    overlay: Option<mpsc::Sender<ScreenMessage>>,
}

impl DiagnosticsSink {
    pub fn new(source: impl Into<String>, overlay: mpsc::Sender<ScreenMessage>) -> Self {
        Self {
            source: source.into(),
            overlay: Some(overlay),
        }
    }

    /// Sink that only logs
    pub fn log_only(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            overlay: None,
        }
    }

    pub fn show(&self, duration: Duration, color: MessageColor, text: impl Into<String>) {
        let message = ScreenMessage {
            color,
            duration,
            text: text.into(),
            timestamp: Local::now(),
        };
        info!(source = %self.source, color = %message.color, "{}", message.text);

        if let Some(overlay) = &self.overlay {
            if let Err(e) = overlay.try_send(message) {
                debug!("Dropping screen message for {}: {}", self.source, e);
            }
        }
    }
}

/// Drains the overlay channel until every sink is dropped
pub async fn run_overlay(mut rx: mpsc::Receiver<ScreenMessage>) -> usize {
    let mut shown = 0;
    while let Some(message) = rx.recv().await {
        debug!("overlay: {}", message);
        shown += 1;
    }
    shown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_reach_overlay_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = DiagnosticsSink::new("test", tx);

        sink.show(Duration::from_secs(5), MessageColor::Blue, "first");
        sink.show(Duration::from_secs(10), MessageColor::Red, "second");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(first.color, MessageColor::Blue);
        assert_eq!(second.text, "second");
        assert_eq!(second.duration, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn full_overlay_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = DiagnosticsSink::new("test", tx);

        sink.show(Duration::from_secs(1), MessageColor::Cyan, "kept");
        sink.show(Duration::from_secs(1), MessageColor::Cyan, "dropped");
        drop(sink);

        assert_eq!(rx.recv().await.map(|m| m.text), Some("kept".to_string()));
        assert!(rx.recv().await.is_none());
    }
}
