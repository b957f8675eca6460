//! Optional verbose diagnostics sink
//!
//! Connections and clusters report progress (attempt failures, routing
//! decisions, lifecycle events) through a `Diagnostics` value. When the
//! sink is disabled nothing is produced.

use std::fmt;
use std::sync::Arc;

/// Callable receiving one formatted diagnostic line
pub type VerboseSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Verbose diagnostics sink (cheap to clone)
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<VerboseSink>,
}

impl Diagnostics {
    /// No diagnostic output
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Forward every line to `tracing::info!`
    pub fn tracing() -> Self {
        Self::sink(|line: &str| tracing::info!(target: "redis_connection", "{}", line))
    }

    /// Forward every line to a custom callable
    pub fn sink<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(f)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit a line; formatting is skipped entirely when disabled
    pub fn info(&self, args: fmt::Arguments<'_>) {
        if let Some(ref sink) = self.sink {
            sink(&args.to_string());
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
