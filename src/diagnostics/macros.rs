//! Diagnostic macros.
//!
//! These macros provide a clean, rustc-like diagnostic experience.

/// Emit a predefined diagnostic by code.
///
/// # Example
///
/// ```rust,ignore
/// ta_emit!(TA201);
/// ```
#[macro_export]
macro_rules! ta_emit {
    ($code:ident) => {{
        $crate::diagnostics::emit::emit(&$crate::diagnostics::$code);
    }};
}

/// Emit a predefined diagnostic with a runtime context string.
///
/// # Example
///
/// ```rust,ignore
/// ta_emit_ctx!(TA001, format!("{} bytes", size));
/// ```
#[macro_export]
macro_rules! ta_emit_ctx {
    ($code:ident, $ctx:expr) => {{
        $crate::diagnostics::emit::emit_with_context(&$crate::diagnostics::$code, &$ctx);
    }};
}

/// Emit a runtime diagnostic that has no predefined code.
///
/// # Example
///
/// ```rust,ignore
/// ta_diagnostic!(
///     Warning,
///     code = "TA150",
///     message = "heap list grew past the expected size",
///     help = "raise page_size"
/// );
/// ```
#[macro_export]
macro_rules! ta_diagnostic {
    (
        $kind:ident,
        code = $code:expr,
        message = $msg:expr
        $(, note = $note:expr)?
        $(, help = $help:expr)?
    ) => {{
        let diag = $crate::diagnostics::Diagnostic {
            kind: $crate::diagnostics::DiagnosticKind::$kind,
            code: $code,
            message: $msg,
            note: None $(.or(Some($note)))?,
            help: None $(.or(Some($help)))?,
        };
        $crate::diagnostics::emit::emit(&diag);
    }};
}

pub use crate::{ta_diagnostic, ta_emit, ta_emit_ctx};

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand() {
        crate::ta_emit!(TA102);
        crate::ta_emit_ctx!(TA202, String::from("heap#3"));
        crate::ta_diagnostic!(
            Note,
            code = "TA999",
            message = "macro expansion check",
            help = "none"
        );
    }
}
