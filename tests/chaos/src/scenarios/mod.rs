//! Chaos run scenarios for db-chaos.
//!
//! - `catalogue` - full runs over the whole experiment catalogue
//! - `attribution` - workload failures land under the right experiment
//! - `failures` - runs that stop early or are interrupted
//! - `live` - real database and cluster (ignored by default)

#[cfg(test)]
mod attribution;
#[cfg(test)]
mod catalogue;
#[cfg(test)]
mod failures;
#[cfg(test)]
mod live;

#[cfg(test)]
pub(crate) mod support {
    use chaos_core::{HarnessConfig, ReadinessConfig, SequencerConfig, WorkloadConfig};
    use std::time::Duration;

    /// Short timings so a paused-clock run covers the catalogue quickly.
    pub fn config() -> HarnessConfig {
        HarnessConfig {
            reseed: false,
            initial_balance: 1_000.0,
            warmup: Duration::from_secs(2),
            workload: WorkloadConfig {
                entity_count: 100,
                cadence: Duration::from_millis(500),
                max_amount: 10.0,
                seed: Some(7),
            },
            sequencer: SequencerConfig {
                target_namespace: "db".into(),
                chaos_namespace: "chaos-testing".into(),
                hold_duration: Duration::from_secs(10),
                readiness: ReadinessConfig {
                    poll_interval: Duration::from_secs(1),
                    timeout: Duration::from_secs(5),
                },
                disk_latency: None,
            },
        }
    }
}
