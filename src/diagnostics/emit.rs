//! Diagnostic emission backend.
//!
//! Writes to stderr in debug builds (or with the `diagnostics` feature), or
//! through the `log` crate when the `log` feature is on.

use std::sync::atomic::{AtomicBool, Ordering};

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::{should_panic, should_panic_on_warning};

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic.
pub fn emit(diag: &Diagnostic) {
    if !is_suppressed() {
        write_out(diag, None);
    }
    check_strict(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    if !is_suppressed() {
        write_out(diag, Some(context));
    }
    check_strict(diag, Some(context));
}

fn check_strict(diag: &Diagnostic, context: Option<&str>) {
    let fatal = match diag.kind {
        DiagnosticKind::Error => should_panic(),
        DiagnosticKind::Warning => should_panic_on_warning(),
        DiagnosticKind::Note | DiagnosticKind::Help => false,
    };

    if fatal {
        panic!(
            "[transalloc][{}] {}\nContext: {}\nStrict mode enabled - diagnostics are fatal.",
            diag.code,
            diag.message,
            context.unwrap_or("none")
        );
    }
}

#[cfg(feature = "log")]
fn write_out(diag: &Diagnostic, context: Option<&str>) {
    emit_to_log(diag, context);
}

#[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
fn write_out(diag: &Diagnostic, context: Option<&str>) {
    emit_to_stderr(diag, context);
}

#[cfg(all(not(feature = "log"), not(any(debug_assertions, feature = "diagnostics"))))]
fn write_out(_diag: &Diagnostic, _context: Option<&str>) {}

/// Internal: emit to stderr.
#[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
fn emit_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    use std::io::Write;

    let mut stderr = std::io::stderr().lock();

    let _ = writeln!(
        stderr,
        "[transalloc][{}] {}: {}",
        diag.code,
        diag.kind.prefix(),
        diag.message
    );

    if let Some(context) = context {
        let _ = writeln!(stderr, "  context: {}", context);
    }
    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }
    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }

    let _ = writeln!(stderr);
}

/// Emit a diagnostic using the log crate.
#[cfg(feature = "log")]
pub fn emit_to_log(diag: &Diagnostic, context: Option<&str>) {
    let context = context.map(|c| format!(" ({})", c)).unwrap_or_default();

    match diag.kind {
        DiagnosticKind::Error => {
            log::error!(target: "transalloc", "[{}] {}{}", diag.code, diag.message, context);
        }
        DiagnosticKind::Warning => {
            log::warn!(target: "transalloc", "[{}] {}{}", diag.code, diag.message, context);
        }
        DiagnosticKind::Note | DiagnosticKind::Help => {
            log::info!(target: "transalloc", "[{}] {}{}", diag.code, diag.message, context);
        }
    }

    if let Some(note) = diag.note {
        log::debug!(target: "transalloc", "  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::debug!(target: "transalloc", "  help: {}", help);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppression() {
        suppress_diagnostics(true);
        assert!(is_suppressed());
        suppress_diagnostics(false);
        assert!(!is_suppressed());
    }

    #[test]
    fn test_warning_is_not_fatal_by_default() {
        emit_with_context(&crate::diagnostics::TA201, "test");
    }
}
