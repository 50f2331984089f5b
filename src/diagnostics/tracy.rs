//! Tracy profiler integration.
//!
//! With the `tracy` feature enabled and a Tracy client running, the allocator
//! marks frames, plots heap usage and opens zones around its slow paths.
//! Without the feature every call here compiles to nothing.

/// Mark a frame boundary.
#[inline]
pub(crate) fn frame_mark() {
    #[cfg(feature = "tracy")]
    {
        if let Some(client) = tracy_client::Client::running() {
            client.frame_mark();
        }
    }
}

/// Plot bytes currently handed out from transient heaps.
#[inline]
pub(crate) fn plot_used_bytes(bytes: u64) {
    #[cfg(feature = "tracy")]
    {
        if let Some(client) = tracy_client::Client::running() {
            client.plot(tracy_client::plot_name!("transient used bytes"), bytes as f64);
        }
    }

    #[cfg(not(feature = "tracy"))]
    let _ = bytes;
}

/// RAII guard for a profiler zone.
pub(crate) struct ProfileZone {
    #[cfg(feature = "tracy")]
    _span: Option<tracy_client::Span>,
}

impl ProfileZone {
    /// Open a zone named `name` if a client is running.
    #[cfg(feature = "tracy")]
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            _span: tracy_client::Client::running()
                .map(|client| client.span_alloc(Some(name), name, file!(), line!(), 0)),
        }
    }

    #[cfg(not(feature = "tracy"))]
    #[inline]
    pub fn new(_name: &'static str) -> Self {
        Self {}
    }
}
