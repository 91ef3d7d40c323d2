//! Background re-reading of live values.
//!
//! A [`Poller`] owns one thread that reads a fixed list of addresses every
//! period. Results land in a [`LiveCache`], replaced whole per address, and
//! the address is published on a channel whenever its value changed.
//! A cache miss means the first read has not completed (or failed); callers
//! show it as "fetching", not as an error.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::ControlLayer;
use crate::error::{Result, SquirrelError};
use crate::model::EpicsValue;

/// Shared view of the latest value per address.
#[derive(Debug, Clone, Default)]
pub struct LiveCache {
    values: Arc<RwLock<HashMap<String, EpicsValue>>>,
}

impl LiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<EpicsValue> {
        let values = self.values.read().ok()?;
        values.get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value`, returning whether it differs from the previous one.
    /// Timestamps alone do not count as a change.
    fn replace(&self, address: &str, value: EpicsValue) -> bool {
        let Ok(mut values) = self.values.write() else {
            return false;
        };
        let changed = values.get(address).map_or(true, |old| {
            old.data != value.data || old.status != value.status || old.severity != value.severity
        });
        values.insert(address.to_string(), value);
        changed
    }
}

pub struct Poller {
    cache: LiveCache,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `addresses` every `period`. The receiver yields each
    /// address whose value changed.
    pub fn spawn<C>(
        control: C,
        addresses: Vec<String>,
        period: Duration,
    ) -> (Self, Receiver<String>)
    where
        C: ControlLayer + Send + 'static,
    {
        let cache = LiveCache::new();
        let (change_tx, change_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = cache.clone();

        let handle = thread::spawn(move || loop {
            for address in &addresses {
                match control.get(address) {
                    Ok(value) => {
                        // A dropped receiver just means nobody listens.
                        if shared.replace(address, value) {
                            let _ = change_tx.send(address.clone());
                        }
                    }
                    Err(err) => debug!(address = %address, error = %err, "poll read failed"),
                }
            }
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        let poller = Self {
            cache,
            stop_tx,
            handle: Some(handle),
        };
        (poller, change_rx)
    }

    pub fn cache(&self) -> LiveCache {
        self.cache.clone()
    }

    /// Stop the thread and wait for it to finish its current pass.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SquirrelError::Communication("poller thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{PutRequest, TaskStatus};
    use crate::model::Scalar;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Counts reads; every read of "COUNTER" returns the next integer.
    struct Counter {
        next: Arc<AtomicI64>,
    }

    impl ControlLayer for Counter {
        fn get(&self, address: &str) -> Result<EpicsValue> {
            match address {
                "COUNTER" => Ok(EpicsValue::new(self.next.fetch_add(1, Ordering::SeqCst))),
                "CONST" => Ok(EpicsValue::new(7i64)),
                other => Err(SquirrelError::Communication(format!("{} offline", other))),
            }
        }

        fn put(&mut self, address: &str, _value: &Scalar) -> TaskStatus {
            TaskStatus::success(vec![address.to_string()])
        }

        fn put_many(&mut self, requests: &[PutRequest]) -> TaskStatus {
            TaskStatus::success(requests.iter().map(|r| r.address.clone()).collect())
        }
    }

    #[test]
    fn test_cache_replace_reports_changes() {
        let cache = LiveCache::new();
        assert!(cache.get("A").is_none());
        assert!(cache.replace("A", EpicsValue::new(1.0)));
        assert!(!cache.replace("A", EpicsValue::new(1.0)));
        assert!(cache.replace("A", EpicsValue::new(2.0)));
        assert_eq!(cache.get("A").unwrap().data, Some(Scalar::Float(2.0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_poller_publishes_changes() {
        let next = Arc::new(AtomicI64::new(0));
        let control = Counter { next: next.clone() };
        let (poller, changes) = Poller::spawn(
            control,
            vec!["COUNTER".into(), "CONST".into(), "OFFLINE".into()],
            Duration::from_millis(5),
        );

        let mut seen = Vec::new();
        while seen.iter().filter(|a: &&String| a.as_str() == "COUNTER").count() < 3 {
            seen.push(changes.recv_timeout(Duration::from_secs(5)).unwrap());
        }

        let cache = poller.cache();
        assert!(cache.get("COUNTER").is_some());
        assert_eq!(cache.get("CONST").unwrap().data, Some(Scalar::Int(7)));
        assert!(cache.get("OFFLINE").is_none());
        // Unchanged values are published once.
        assert_eq!(seen.iter().filter(|a| a.as_str() == "CONST").count(), 1);

        poller.stop().unwrap();
        let reads = next.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(next.load(Ordering::SeqCst), reads);
    }
}
