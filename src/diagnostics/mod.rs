//! Diagnostics for the transient allocator.
//!
//! This module provides:
//! - **Runtime diagnostics**: coded messages on stderr or through `log`
//! - **Strict mode**: optional panic-on-diagnostic for CI
//! - **Event log**: lock-free record of what the allocator did
//! - **Profiler integration**: Tracy frame marks, plots and zones
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                   |
//! |-------|---------------------------|
//! | TA0xx | Allocation requests       |
//! | TA1xx | Heaps and pages           |
//! | TA2xx | Allocation lifetime       |
//! | TA3xx | Shutdown and leaks        |
//! | TA9xx | Internal errors           |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use transalloc::ta_emit;
//!
//! ta_emit!(TA201);
//! ```

pub mod emit;
pub mod events;
pub mod kind;
pub mod macros;
pub mod strict;

pub(crate) mod tracy;

pub use emit::{emit, emit_with_context, suppress_diagnostics};
pub use events::AllocatorEvent;
pub use kind::{Diagnostic, DiagnosticKind};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};

pub use kind::{TA001, TA002, TA003, TA004, TA101, TA102, TA201, TA202, TA301, TA901};
