//! Connectivity gate.
//!
//! Every network-heavy step waits here first. The gate polls a reachability
//! probe at a fixed interval until it succeeds and reports whether an outage
//! was observed on the way.

mod probe;

pub use probe::TcpProbe;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ConnectivityConfig;
use crate::metrics;

/// One reachability check.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns true when the network is reachable.
    async fn probe(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("network still unreachable after {attempts} probes")]
    Unreachable { attempts: u32 },
}

/// Blocks callers until the network is reachable.
#[derive(Clone)]
pub struct ConnectivityGate {
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
    max_attempts: Option<u32>,
}

impl ConnectivityGate {
    pub fn new(probe: Arc<dyn ReachabilityProbe>, interval: Duration) -> Self {
        Self {
            probe,
            interval,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` failed probes instead of waiting forever.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn from_config(config: &ConnectivityConfig) -> Self {
        Self::new(Arc::new(TcpProbe::from_config(config)), config.poll_interval())
            .with_max_attempts(config.max_attempts)
    }

    /// Wait until the probe succeeds.
    ///
    /// Returns `Ok(true)` if at least one probe failed before success.
    pub async fn wait_until_reachable(&self) -> Result<bool, ConnectivityError> {
        let mut failures: u32 = 0;

        loop {
            if self.probe.probe().await {
                if failures > 0 {
                    metrics::CONNECTIVITY_OUTAGES.inc();
                    info!(failed_probes = failures, "Connectivity restored");
                }
                return Ok(failures > 0);
            }

            failures += 1;
            metrics::PROBE_FAILURES.inc();
            if failures == 1 {
                warn!("Network unreachable, waiting for connectivity");
            }

            if let Some(max) = self.max_attempts {
                if failures >= max {
                    return Err(ConnectivityError::Unreachable { attempts: failures });
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

impl std::fmt::Debug for ConnectivityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityGate")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProbe;

    fn gate(probe: &Arc<MockProbe>) -> ConnectivityGate {
        ConnectivityGate::new(
            Arc::clone(probe) as Arc<dyn ReachabilityProbe>,
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_reachable_immediately() {
        let probe = Arc::new(MockProbe::reachable());
        let had_outage = gate(&probe).wait_until_reachable().await.unwrap();
        assert!(!had_outage);
        assert_eq!(probe.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_outage_then_recovery() {
        let probe = Arc::new(MockProbe::with_sequence(vec![false, false, true]));
        let had_outage = gate(&probe).wait_until_reachable().await.unwrap();
        assert!(had_outage);
        assert_eq!(probe.probe_count(), 3);
    }

    #[tokio::test]
    async fn test_attempt_guard() {
        let probe = Arc::new(MockProbe::unreachable());
        let err = gate(&probe)
            .with_max_attempts(Some(4))
            .wait_until_reachable()
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectivityError::Unreachable { attempts: 4 }));
        assert_eq!(probe.probe_count(), 4);
    }
}
