//! User-visible save confirmations and warnings.

use serde::Serialize;
use tracing::{info, warn};

use crate::observability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, title: title.into(), description: description.into() }
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, title: title.into(), description: description.into() }
    }
}

/// Fire-and-forget sink; implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Emits notices as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        observability::NOTICES_TOTAL.with_label_values(&[notice.level.as_str()]).inc();
        match notice.level {
            NoticeLevel::Info => info!(event = "notice", title = %notice.title, description = %notice.description),
            NoticeLevel::Warning => warn!(event = "notice", title = %notice.title, description = %notice.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_notifier_counts_by_level() {
        let warnings = || observability::NOTICES_TOTAL.with_label_values(&["warning"]).get();
        let before = warnings();
        TracingNotifier.notify(Notice::warning("Oops", "remote down"));
        assert!(warnings() >= before + 1);
    }
}
