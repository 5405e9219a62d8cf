//! Structured fan-out: spawn keyed branches, collect what finishes before the
//! deadline, abort the rest, and join every branch before returning.

use crate::metrics_defs::{FANOUT_BRANCH_FAILURES, FANOUT_DURATION};
use shared::{counter, histogram};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchFailure {
    /// Still running at the deadline and aborted.
    TimedOut,
    Panicked(String),
    Cancelled,
}

impl BranchFailure {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BranchFailure::TimedOut => "timed_out",
            BranchFailure::Panicked(_) => "panicked",
            BranchFailure::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
pub struct FanOutResults<K, T> {
    pub completed: HashMap<K, T>,
    pub failed: Vec<(K, BranchFailure)>,
}

impl<K: Eq + Hash, T> FanOutResults<K, T> {
    pub fn take(&mut self, key: &K) -> Option<T> {
        self.completed.remove(key)
    }
}

pub struct FanOut<K, T> {
    name: &'static str,
    deadline: Duration,
    tasks: JoinSet<T>,
    keys: HashMap<Id, K>,
}

impl<K, T> FanOut<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Send + 'static,
{
    pub fn new(name: &'static str, deadline: Duration) -> Self {
        FanOut {
            name,
            deadline,
            tasks: JoinSet::new(),
            keys: HashMap::new(),
        }
    }

    pub fn spawn<F>(&mut self, key: K, branch: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = self.tasks.spawn(branch);
        self.keys.insert(handle.id(), key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Waits for every branch or the deadline, whichever comes first. Branches
    /// still running at the deadline are aborted and reported as timed out.
    pub async fn join(self) -> FanOutResults<K, T> {
        let FanOut {
            name,
            deadline,
            mut tasks,
            mut keys,
        } = self;
        let started = Instant::now();
        let mut results = FanOutResults {
            completed: HashMap::with_capacity(keys.len()),
            failed: Vec::new(),
        };

        let timeout = tokio::time::sleep(deadline);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                joined = tasks.join_next_with_id() => match joined {
                    Some(joined) => record(&mut results, &mut keys, joined, false),
                    None => break,
                },
                _ = &mut timeout => {
                    tracing::warn!(
                        fanout = name,
                        remaining = tasks.len(),
                        "fan-out deadline reached, aborting branches"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            record(&mut results, &mut keys, joined, true);
        }

        for (_, failure) in &results.failed {
            counter!(FANOUT_BRANCH_FAILURES, "fanout" => name, "reason" => failure.as_str())
                .increment(1);
        }
        histogram!(FANOUT_DURATION, "fanout" => name).record(started.elapsed().as_secs_f64());
        results
    }
}

fn record<K: Eq + Hash, T>(
    results: &mut FanOutResults<K, T>,
    keys: &mut HashMap<Id, K>,
    joined: Result<(Id, T), tokio::task::JoinError>,
    aborted: bool,
) {
    match joined {
        Ok((id, value)) => {
            if let Some(key) = keys.remove(&id) {
                results.completed.insert(key, value);
            }
        }
        Err(e) => {
            let failure = if e.is_panic() {
                BranchFailure::Panicked(e.to_string())
            } else if aborted {
                BranchFailure::TimedOut
            } else {
                BranchFailure::Cancelled
            };
            if let Some(key) = keys.remove(&e.id()) {
                results.failed.push((key, failure));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_results_are_keyed() {
        let mut fanout = FanOut::new("test", Duration::from_secs(5));
        for i in 0..10u64 {
            fanout.spawn(i, async move {
                tokio::time::sleep(Duration::from_millis(10 - i)).await;
                i * 2
            });
        }
        let results = fanout.join().await;
        assert!(results.failed.is_empty());
        assert_eq!(results.completed.len(), 10);
        assert_eq!(results.completed[&7], 14);
    }

    #[tokio::test]
    async fn test_empty_fanout_returns_immediately() {
        let fanout: FanOut<u32, ()> = FanOut::new("empty", Duration::from_secs(60));
        let started = Instant::now();
        let results = fanout.join().await;
        assert!(results.completed.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_deadline_aborts_slow_branches() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut fanout = FanOut::new("slow", Duration::from_millis(50));
        fanout.spawn("fast", async { 1 });
        let flag = finished.clone();
        fanout.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
            2
        });

        let results = fanout.join().await;
        assert_eq!(results.completed.get("fast"), Some(&1));
        assert_eq!(results.failed, vec![("slow", BranchFailure::TimedOut)]);
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_branch_does_not_affect_siblings() {
        let mut fanout = FanOut::new("panic", Duration::from_secs(5));
        fanout.spawn("ok", async { "fine" });
        fanout.spawn("boom", async { panic!("branch failed") });

        let results = fanout.join().await;
        assert_eq!(results.completed.get("ok"), Some(&"fine"));
        assert_eq!(results.failed.len(), 1);
        assert!(matches!(results.failed[0], ("boom", BranchFailure::Panicked(_))));
    }
}
