//! Log writing for rendered telemetry entries.
//!
//! Writers receive finished entries and give nothing back. Alerting is a
//! writer decorator with explicit, scoped observer registration.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use telemetry_details::{ExceptionInfo, Severity};

/// A rendered event plus the metadata the log store keeps beside it.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub category: String,
    pub caption: String,
    pub description: String,
    pub session_id: Option<String>,
    pub exception: Option<ExceptionInfo>,
    pub received_at: DateTime<Utc>,
    /// The complete `<Details>…</Details>` text.
    pub details: String,
}

pub trait LogWriter: Send + Sync {
    fn write(&self, entry: LogEntry);
}

impl<W: LogWriter + ?Sized> LogWriter for Arc<W> {
    fn write(&self, entry: LogEntry) {
        (**self).write(entry)
    }
}

// =============================================================================
// TracingWriter
// =============================================================================

/// Emits each entry as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWriter;

impl LogWriter for TracingWriter {
    fn write(&self, entry: LogEntry) {
        let session = entry.session_id.as_deref().unwrap_or("-");
        let exception = entry
            .exception
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .unwrap_or("");
        match entry.severity {
            Severity::Critical | Severity::Error => tracing::error!(
                target: "telemetry",
                category = %entry.category,
                session = %session,
                exception = %exception,
                details = %entry.details,
                "{}: {}", entry.caption, entry.description
            ),
            Severity::Warning => tracing::warn!(
                target: "telemetry",
                category = %entry.category,
                session = %session,
                exception = %exception,
                details = %entry.details,
                "{}: {}", entry.caption, entry.description
            ),
            Severity::Information => tracing::info!(
                target: "telemetry",
                category = %entry.category,
                session = %session,
                details = %entry.details,
                "{}: {}", entry.caption, entry.description
            ),
            Severity::Verbose => tracing::debug!(
                target: "telemetry",
                category = %entry.category,
                session = %session,
                details = %entry.details,
                "{}: {}", entry.caption, entry.description
            ),
        }
    }
}

// =============================================================================
// MemoryWriter
// =============================================================================

/// Keeps entries in arrival order.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn take(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl LogWriter for MemoryWriter {
    fn write(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

// =============================================================================
// AlertingWriter
// =============================================================================

type Observer = Arc<dyn Fn(&LogEntry) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: AtomicU64,
    list: Mutex<Vec<(u64, Observer)>>,
}

/// Forwards every entry to `inner` and notifies observers of entries at or
/// above the alert threshold.
pub struct AlertingWriter<W> {
    inner: W,
    threshold: Severity,
    observers: Arc<Observers>,
}

impl<W: LogWriter> AlertingWriter<W> {
    pub fn new(inner: W, threshold: Severity) -> Self {
        Self {
            inner,
            threshold,
            observers: Arc::new(Observers::default()),
        }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Register an observer. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        let id = self.observers.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.list.lock().push((id, Arc::new(observer)));
        Subscription {
            observers: Arc::downgrade(&self.observers),
            id,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.list.lock().len()
    }
}

impl<W: LogWriter> LogWriter for AlertingWriter<W> {
    fn write(&self, entry: LogEntry) {
        if entry.severity.is_at_least(self.threshold) {
            // Snapshot so observers may subscribe or unsubscribe re-entrantly.
            let observers: Vec<Observer> = self
                .observers
                .list
                .lock()
                .iter()
                .map(|(_, observer)| observer.clone())
                .collect();
            for observer in observers {
                (*observer)(&entry);
            }
        }
        self.inner.write(entry);
    }
}

/// Keeps an alert observer registered while alive.
#[must_use = "dropping a Subscription unregisters the observer"]
pub struct Subscription {
    observers: Weak<Observers>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.list.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn entry(severity: Severity, caption: &str) -> LogEntry {
        LogEntry {
            severity,
            category: "Test".to_string(),
            caption: caption.to_string(),
            description: String::new(),
            session_id: None,
            exception: None,
            received_at: Utc::now(),
            details: "<Details></Details>".to_string(),
        }
    }

    #[test]
    fn memory_writer_keeps_order() {
        let writer = MemoryWriter::new();
        writer.write(entry(Severity::Information, "first"));
        writer.write(entry(Severity::Error, "second"));
        let captions: Vec<String> = writer.entries().into_iter().map(|e| e.caption).collect();
        assert_eq!(captions, vec!["first", "second"]);
        assert_eq!(writer.take().len(), 2);
        assert!(writer.is_empty());
    }

    #[test]
    fn alerts_only_at_or_above_threshold() {
        let writer = AlertingWriter::new(MemoryWriter::new(), Severity::Warning);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = writer.subscribe(move |e| sink.lock().push(e.caption.clone()));

        writer.write(entry(Severity::Verbose, "quiet"));
        writer.write(entry(Severity::Warning, "warn"));
        writer.write(entry(Severity::Critical, "fire"));

        assert_eq!(*seen.lock(), vec!["warn".to_string(), "fire".to_string()]);
        assert_eq!(writer.inner().len(), 3);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let writer = AlertingWriter::new(MemoryWriter::new(), Severity::Error);
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let subscription = writer.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(writer.observer_count(), 1);

        writer.write(entry(Severity::Error, "one"));
        drop(subscription);
        writer.write(entry(Severity::Error, "two"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(writer.observer_count(), 0);
    }

    #[test]
    fn subscription_outliving_writer_is_harmless() {
        let subscription = {
            let writer = AlertingWriter::new(MemoryWriter::new(), Severity::Error);
            writer.subscribe(|_| {})
        };
        drop(subscription);
    }

    #[test]
    fn tracing_writer_accepts_every_severity() {
        for severity in Severity::ALL {
            TracingWriter.write(entry(severity, "traced"));
        }
    }
}
