use log::{debug, error, info, warn};

/// Message severities accepted by a [`LogSink`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Success,
}

/// Where the loader and its worker pool send progress and failure messages.
///
/// The core only ever writes; it never reads log state back. Tests inject a
/// capturing sink to assert on the lines a load produced.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

/// Forwards every message to the `log` facade.
///
/// [`Severity::Success`] has no `log` counterpart and lands at info level.
#[derive(Debug, Default)]
pub struct StandardSink;

impl LogSink for StandardSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => debug!("{message}"),
            Severity::Info | Severity::Success => info!("{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
    }
}
