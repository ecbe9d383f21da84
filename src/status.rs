use std::fmt::{self, Display};
use std::sync::Arc;

use log::Level;

/// Severity of a status event. Maps one-to-one onto `log` levels when the
/// event is mirrored to the log facade.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    fn log_level(self) -> Level {
        match self {
            Severity::Error => Level::Error,
            Severity::Warning => Level::Warn,
            Severity::Info => Level::Info,
            Severity::Debug => Level::Debug,
        }
    }
}

/// Identifies where a status event came from: the reporting module plus a
/// module-local id, with a stable name for display.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Category {
    pub module: &'static str,
    pub local_id: u16,
    pub name: &'static str,
}

impl Category {
    pub const fn new(module: &'static str, local_id: u16, name: &'static str) -> Category {
        Category {
            module,
            local_id,
            name,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A structured diagnostic event. Informational only; never drives control
/// flow. Equality compares severity and category, the message is free-form.
#[derive(Clone, Debug)]
pub struct Status {
    severity: Severity,
    category: Category,
    message: String,
}

impl Status {
    pub fn new(severity: Severity, category: Category, message: impl Into<String>) -> Status {
        Status {
            severity,
            category,
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl PartialEq for Status {
    fn eq(&self, other: &Status) -> bool {
        self.severity == other.severity && self.category == other.category
    }
}

impl Eq for Status {}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

pub trait StatusObserver: Send + Sync {
    fn observe(&self, status: &Status);
}

/// Fan-out point for status events. Observers are registered explicitly per
/// reporter instance and invoked synchronously, in registration order.
#[derive(Default)]
pub struct StatusReporter {
    observers: Vec<Arc<dyn StatusObserver>>,
}

impl StatusReporter {
    pub fn new() -> StatusReporter {
        StatusReporter::default()
    }

    pub fn register_observer(&mut self, observer: Arc<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    pub fn unregister_observer(&mut self, observer: &Arc<dyn StatusObserver>) {
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    pub fn report(&self, status: Status) {
        log::log!(status.severity.log_level(), "{}", status);
        for observer in &self.observers {
            observer.observe(&status);
        }
    }
}
