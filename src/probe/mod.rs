//! Network reachability probing.
//!
//! One probe is a single ICMP echo request with a bounded timeout. The
//! [`Prober`] trait is the seam the monitor depends on; [`PingProber`] is
//! the production implementation.

mod ping;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

/// Probe error types. Internal to this module: callers of [`Prober::probe`]
/// only ever see a failed [`ProbeOutcome`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("command failed: {0}")]
    Command(String),
}

/// Result of a single reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Round-trip time on success; wall-clock around the attempt on failure.
    pub elapsed: Duration,
}

/// A source of single reachability checks.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Send exactly one probe to `address`. Never fails: transport errors,
    /// malformed replies and timeouts all come back as `success == false`.
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome;
}

/// ICMP echo prober with a `ping` command fallback.
pub struct PingProber;

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        match ping::echo(address, timeout).await {
            Ok(rtt) => ProbeOutcome {
                success: true,
                elapsed: rtt,
            },
            Err(err) => {
                tracing::debug!("probe failed for {}: {}", address, err);
                ProbeOutcome {
                    success: false,
                    elapsed: started.elapsed(),
                }
            }
        }
    }
}
