//! Build script for transalloc.
//!
//! Prints build-time notes about feature combinations that are easy to get wrong.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_GPU_VULKAN");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DIAGNOSTICS");

    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let vulkan_enabled = env::var("CARGO_FEATURE_GPU_VULKAN").is_ok();
    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();
    let diagnostics_enabled = env::var("CARGO_FEATURE_DIAGNOSTICS").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    // --- Debug Features ---
    if debug_enabled && is_release {
        emit_warning("'debug' feature enabled in release build!");
        emit_note("Every transient allocation captures a backtrace; expect slower create calls.");
    }

    // --- Diagnostics routing ---
    if log_enabled && diagnostics_enabled {
        emit_note("'log' and 'diagnostics' both enabled: diagnostics go through the log crate only.");
    }

    // --- Backends ---
    if !vulkan_enabled && is_release {
        emit_note("No GPU backend feature enabled; only DummyDevice is available.");
        emit_note("  transalloc = { version = \"0.1\", features = [\"gpu-vulkan\"] }");
    }
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[transalloc]    {}", msg);
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[transalloc] ⚠️  {}", msg);
}
