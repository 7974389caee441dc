//! Mock reachability probe for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::connectivity::ReachabilityProbe;

/// Probe answering from a scripted sequence, then a fixed value.
#[derive(Debug)]
pub struct MockProbe {
    sequence: Mutex<VecDeque<bool>>,
    fallback: bool,
    probes: AtomicUsize,
}

impl MockProbe {
    /// Always reachable.
    pub fn reachable() -> Self {
        Self::with_sequence(Vec::new())
    }

    /// Never reachable.
    pub fn unreachable() -> Self {
        Self {
            sequence: Mutex::new(VecDeque::new()),
            fallback: false,
            probes: AtomicUsize::new(0),
        }
    }

    /// Answer with `sequence` first, then reachable forever.
    pub fn with_sequence(sequence: Vec<bool>) -> Self {
        Self {
            sequence: Mutex::new(sequence.into()),
            fallback: true,
            probes: AtomicUsize::new(0),
        }
    }

    /// Number of probes made so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for MockProbe {
    async fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let scripted = match self.sequence.lock() {
            Ok(mut sequence) => sequence.pop_front(),
            Err(_) => None,
        };
        scripted.unwrap_or(self.fallback)
    }
}
