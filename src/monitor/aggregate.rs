//! Multi-sample quorum aggregation.

use std::time::Duration;

use crate::probe::Prober;

/// Per-cycle, per-store aggregation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub online: bool,
    pub success_count: u32,
    /// Mean round-trip time over successful samples; absent when none
    /// succeeded.
    pub avg_latency: Option<Duration>,
}

impl Verdict {
    /// The verdict for a store that could not be probed at all.
    pub fn offline() -> Self {
        Self {
            online: false,
            success_count: 0,
            avg_latency: None,
        }
    }
}

/// Probe `address` `sample_count` times and reduce the outcomes to one
/// verdict: online iff at least `quorum` samples succeeded. Failed samples
/// never contribute to the latency average.
pub async fn aggregate(
    prober: &dyn Prober,
    address: &str,
    sample_count: u32,
    quorum: u32,
    per_sample_timeout: Duration,
) -> Verdict {
    let mut success_count = 0u32;
    let mut total = Duration::ZERO;

    for _ in 0..sample_count {
        let outcome = prober.probe(address, per_sample_timeout).await;
        if outcome.success {
            success_count += 1;
            total += outcome.elapsed;
        }
    }

    let avg_latency = (success_count > 0).then(|| total / success_count);
    Verdict {
        online: success_count >= quorum,
        success_count,
        avg_latency,
    }
}
