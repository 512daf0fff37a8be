//! Badge showing the number of incomplete notes on the extension icon.
use std::sync::{Arc, Mutex};

use console::style;
use log::{debug, trace};

/// Badge background colour.
pub const BADGE_BACKGROUND: &str = "#EF4444";

/// Badge text colour.
pub const BADGE_TEXT_COLOR: &str = "#FFFFFF";

/// Host API able to decorate the extension icon.
pub trait BadgeHost: Send + Sync {
    fn set_badge_text(&self, text: &str);

    fn set_badge_background_color(&self, color: &str);

    fn set_badge_text_color(&self, color: &str);
}

/// Pushes incomplete counts to the host badge, if there is one.
#[derive(Clone, Default)]
pub struct BadgeNotifier {
    host: Option<Arc<dyn BadgeHost>>,
}

impl BadgeNotifier {
    pub fn new(host: Option<Arc<dyn BadgeHost>>) -> Self {
        Self { host }
    }

    /// Notifier for environments without a badge API
    pub fn disabled() -> Self {
        Self { host: None }
    }

    pub fn is_available(&self) -> bool {
        self.host.is_some()
    }

    /// Shows `count` on the badge, or clears it when there is nothing left to do.
    pub fn set_badge(&self, count: usize) {
        let Some(host) = &self.host else {
            trace!("No badge host, skipping update to {}", count);
            return;
        };

        let text = badge_text(count);
        debug!("Updating badge text to '{}'", text);
        host.set_badge_text(&text);
        host.set_badge_background_color(BADGE_BACKGROUND);
        host.set_badge_text_color(BADGE_TEXT_COLOR);
    }
}

/// Text rendered for `count`; zero clears the badge.
pub fn badge_text(count: usize) -> String {
    if count > 0 {
        count.to_string()
    } else {
        String::new()
    }
}

/// Renders the badge in the terminal as white text on a red background.
#[derive(Default)]
pub struct TerminalBadge {
    text: Mutex<String>,
}

impl TerminalBadge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Styled badge, or `None` while the badge is cleared
    pub fn render(&self) -> Option<String> {
        let text = self.text.lock().ok()?.clone();
        if text.is_empty() {
            return None;
        }
        Some(
            style(format!(" {} ", text))
                .white()
                .on_red()
                .bold()
                .to_string(),
        )
    }
}

impl BadgeHost for TerminalBadge {
    fn set_badge_text(&self, text: &str) {
        if let Ok(mut current) = self.text.lock() {
            *current = text.to_string();
        }
    }

    // Terminal colours are fixed in render()
    fn set_badge_background_color(&self, _color: &str) {}

    fn set_badge_text_color(&self, _color: &str) {}
}

/// One call received by a [`RecordingBadge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeCall {
    Text(String),
    Background(String),
    TextColor(String),
}

/// Badge host that remembers every call it receives.
#[derive(Default)]
pub struct RecordingBadge {
    calls: Mutex<Vec<BadgeCall>>,
}

impl RecordingBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BadgeCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Most recent badge text, if any was set
    pub fn last_text(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|call| match call {
            BadgeCall::Text(text) => Some(text),
            _ => None,
        })
    }

    fn record(&self, call: BadgeCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl BadgeHost for RecordingBadge {
    fn set_badge_text(&self, text: &str) {
        self.record(BadgeCall::Text(text.to_string()));
    }

    fn set_badge_background_color(&self, color: &str) {
        self.record(BadgeCall::Background(color.to_string()));
    }

    fn set_badge_text_color(&self, color: &str) {
        self.record(BadgeCall::TextColor(color.to_string()));
    }
}
