//! Stream liveness probing for chanmerge
//!
//! This crate answers one question per URL: does it serve a successful
//! response right now, and how long did the response headers take?
//! - `Prober`: a single bounded-time probe that follows at most one redirect
//! - `Coordinator`: semaphore-gated fan-out over a whole URL set

mod coordinator;
mod error;
mod prober;

pub use coordinator::{Coordinator, ProbeReport};
pub use error::ProbeError;
pub use prober::Prober;

use std::collections::HashMap;
use std::time::Duration;

/// Measured round-trip for a URL.
///
/// `Unreachable` orders after every `Reachable` latency, so sorting by
/// `Latency` puts dead URLs last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Latency {
    Reachable(Duration),
    Unreachable,
}

impl Latency {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Latency::Reachable(_))
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Latency::Reachable(d) => Some(*d),
            Latency::Unreachable => None,
        }
    }
}

impl std::fmt::Display for Latency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Latency::Reachable(d) => write!(f, "{:.0}ms", d.as_secs_f64() * 1000.0),
            Latency::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Outcome of probing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub url: String,
    pub latency: Latency,
}

impl ProbeResult {
    pub fn unreachable(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            latency: Latency::Unreachable,
        }
    }
}

/// Settings shared by every probe in a run
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Timeout of the first request
    pub timeout: Duration,
    /// Subtracted from `timeout` for the redirect follow-up request
    pub redirect_margin: Duration,
    /// Headers sent with every request
    pub headers: HashMap<String, String>,
}

impl ProbeOptions {
    /// Timeout used for the single redirect hop.
    ///
    /// Falls back to the full timeout when the margin would leave nothing.
    pub fn follow_up_timeout(&self) -> Duration {
        match self.timeout.checked_sub(self.redirect_margin) {
            Some(d) if !d.is_zero() => d,
            _ => self.timeout,
        }
    }
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            redirect_margin: Duration::from_secs(3),
            headers: HashMap::new(),
        }
    }
}
