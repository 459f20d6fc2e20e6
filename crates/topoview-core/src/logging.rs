//! Logging facilities for Topoview.
//!
//! Topoview uses the `tracing` crate for instrumentation. Every event carries
//! an explicit target naming the subsystem it comes from, so output can be
//! narrowed with ordinary `tracing-subscriber` directives:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("topoview_net::transport=debug,topoview_core::buffer=trace")
//!     .init();
//! ```

/// Span names used throughout Topoview for tracing.
pub mod span_names {
    /// Dispatch of one inbound message.
    pub const DISPATCH: &str = "topoview::dispatch";
    /// Buffer flush.
    pub const FLUSH: &str = "topoview::flush";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "topoview_core";
    /// Message dispatcher target.
    pub const DISPATCHER: &str = "topoview_core::dispatcher";
    /// Update buffer target.
    pub const BUFFER: &str = "topoview_core::buffer";
    /// Entity registry target.
    pub const REGISTRY: &str = "topoview_core::registry";
    /// Timer system target.
    pub const TIMER: &str = "topoview_core::timer";
    /// WebSocket transport target.
    pub const TRANSPORT: &str = "topoview_net::transport";
    /// Session loop target.
    pub const SESSION: &str = "topoview::session";
    /// Dashboard handlers target.
    pub const HANDLERS: &str = "topoview::handlers";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// The session wraps each dispatch and flush in one, so a `topoview::perf=debug`
/// directive with span timing enabled shows where the loop spends its time.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a new span for `operation`.
    pub fn new(operation: &'static str) -> Self {
        let span = tracing::debug_span!(target: "topoview::perf", "perf", operation);
        Self {
            _span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_are_module_paths() {
        for target in [
            targets::DISPATCHER,
            targets::BUFFER,
            targets::REGISTRY,
            targets::TIMER,
        ] {
            assert!(target.starts_with(targets::CORE));
        }
        assert!(targets::TRANSPORT.starts_with("topoview_net"));
    }

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new(span_names::FLUSH);
    }
}
