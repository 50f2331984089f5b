//! Creation backtraces for transient allocations.
//!
//! Captured unresolved at registration time and only symbolized when an
//! allocation is reported as leaked.

/// Stack captured when an allocation was registered.
#[derive(Debug, Clone)]
pub(crate) struct CreationTrace {
    backtrace: backtrace::Backtrace,
}

impl CreationTrace {
    /// Capture the current stack without resolving symbols.
    pub fn capture() -> Self {
        Self {
            backtrace: backtrace::Backtrace::new_unresolved(),
        }
    }

    /// Resolve symbols and format the trace.
    pub fn resolve(mut self) -> String {
        self.backtrace.resolve();
        format!("{:?}", self.backtrace)
    }
}
