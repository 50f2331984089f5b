//! Diagnostic kinds and predefined codes.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
    /// Actionable suggestion to fix the issue.
    Help,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
            DiagnosticKind::Help => "help",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `TA0xx` - Allocation requests
/// - `TA1xx` - Heaps and pages
/// - `TA2xx` - Allocation lifetime
/// - `TA3xx` - Shutdown and leaks
/// - `TA9xx` - Internal errors
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "TA001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// TA0xx - Allocation requests
// =============================================================================

/// TA001: No heap could hold the request, even a freshly created one.
pub const TA001: Diagnostic = Diagnostic::warning(
    "TA001",
    "transient heaps exhausted, allocation failed"
).with_note("a new heap was created for this request and it still did not fit")
 .with_help("increase page_size in TransientConfig, or split the resource");

/// TA002: Zero-sized or malformed request.
pub const TA002: Diagnostic = Diagnostic::warning(
    "TA002",
    "transient allocation requested with an invalid size"
).with_help("buffers need a non-zero size; images need non-zero extents, mips and layers");

/// TA003: Upload and readback residency combined.
pub const TA003: Diagnostic = Diagnostic::warning(
    "TA003",
    "memory usage combines upload and readback residency"
).with_note("a resource lives in exactly one memory class")
 .with_help("pick MemoryUsage::UPLOAD or MemoryUsage::READBACK, not both");

/// TA004: Backend refused to place a resource in a claimed block.
pub const TA004: Diagnostic = Diagnostic::warning(
    "TA004",
    "backend failed to place a transient resource"
).with_note("the claimed block was returned to its heap");

// =============================================================================
// TA1xx - Heaps and pages
// =============================================================================

/// TA101: Page creation failed while building a heap.
pub const TA101: Diagnostic = Diagnostic::warning(
    "TA101",
    "failed to create transient heap"
).with_note("pages created before the failure were released")
 .with_help("lower page_size or pages_per_heap, or free device memory");

/// TA102: Request can never fit in a page.
pub const TA102: Diagnostic = Diagnostic::warning(
    "TA102",
    "transient request is larger than a heap page"
).with_help("increase page_size in TransientConfig");

// =============================================================================
// TA2xx - Allocation lifetime
// =============================================================================

/// TA201: Destroy of an allocation the cache does not know as live.
pub const TA201: Diagnostic = Diagnostic::warning(
    "TA201",
    "destroy of unknown or already destroyed transient allocation"
).with_note("the call was ignored")
 .with_help("destroy each allocation once; cache hits share one allocation");

/// TA202: Expired allocation whose heap no longer exists.
pub const TA202: Diagnostic = Diagnostic::warning(
    "TA202",
    "expired transient allocation refers to a heap that no longer exists"
).with_note("the native resource was released directly");

// =============================================================================
// TA3xx - Shutdown
// =============================================================================

/// TA301: Allocation still live at shutdown.
pub const TA301: Diagnostic = Diagnostic::warning(
    "TA301",
    "transient allocation still live at shutdown"
).with_note("the allocation was released with its heap")
 .with_help("destroy transient allocations before dropping the allocator; enable the `debug` feature for creation backtraces");

// =============================================================================
// TA9xx - Internal
// =============================================================================

/// TA901: Internal allocator error.
pub const TA901: Diagnostic = Diagnostic::error(
    "TA901",
    "internal transient allocator error"
).with_note("this indicates a bug in transalloc");
