//! Destinos del log de eventos de cache.
//!
//! Each dealer with logging enabled writes one human-readable line per
//! cache event (`Cache Hit:  "Woo" / product 12`, invalidations, key
//! errors) to a [`LogSink`]. Sinks must never fail the caller.

use parking_lot::Mutex;

/// Target used by [`TracingLogSink`].
pub const LOG_TARGET: &str = "fragcache::log";

/// Receives cache event lines.
pub trait LogSink: Send + Sync {
    /// Records one line. Implementations swallow their own errors.
    fn log(&self, message: &str);
}

/// Forwards event lines to `tracing` at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, message: &str) {
        tracing::info!(target: LOG_TARGET, "{}", message);
    }
}

/// Keeps event lines in memory.
///
/// Util para tests y para hosts que muestran el log en su propia UI.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Crea un sink vacio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retorna una copia de las lineas registradas.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns true if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }

    /// Vacia el buffer.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}
