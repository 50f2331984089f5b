//! Public API for transalloc.
//!
//! This module contains all user-facing types and functions.
//! Most users should only interact with types from this module.

pub mod alloc;
pub mod allocation;
pub mod config;
pub mod error;
pub mod request;
pub mod stats;
