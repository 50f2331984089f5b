//! Allocation backends.
//!
//! Pages and heaps hand out byte ranges; the cache decides when a range may
//! be handed out again.

pub(crate) mod cache;
pub(crate) mod deferred;
pub(crate) mod handles;
pub(crate) mod heap;
pub(crate) mod page;
