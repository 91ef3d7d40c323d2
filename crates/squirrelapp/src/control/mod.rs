//! # Live-Value Provider
//!
//! [`ControlLayer`] is the seam between squirrel and the running control
//! system. `snap` reads through it and `apply` writes through it. The protocol
//! shims that speak to real IOCs live outside this crate; [`Disconnected`] is
//! the provider used when none is enabled.
//!
//! Reads fail per address with [`SquirrelError::Communication`]. Writes never
//! fail the call itself: the outcome is reported in a [`TaskStatus`].

use std::fmt;

use crate::error::{Result, SquirrelError};
use crate::model::{EpicsValue, Scalar};

pub mod poll;

/// One write of `value` to `address`.
#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    pub address: String,
    pub value: Scalar,
}

impl PutRequest {
    pub fn new(address: impl Into<String>, value: Scalar) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }
}

/// Outcome of a write request.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub addresses: Vec<String>,
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn success(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            error: None,
        }
    }

    pub fn failure(addresses: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            addresses,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "ok: {}", self.addresses.join(", ")),
            Some(err) => write!(f, "failed: {} ({})", self.addresses.join(", "), err),
        }
    }
}

pub trait ControlLayer {
    /// Read the current value at `address`.
    fn get(&self, address: &str) -> Result<EpicsValue>;

    fn put(&mut self, address: &str, value: &Scalar) -> TaskStatus;

    /// All writes as one bulk request.
    fn put_many(&mut self, requests: &[PutRequest]) -> TaskStatus;
}

/// Provider with no connection: reads fail, writes report failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl ControlLayer for Disconnected {
    fn get(&self, address: &str) -> Result<EpicsValue> {
        Err(SquirrelError::Communication(format!(
            "no control layer enabled to read {}",
            address
        )))
    }

    fn put(&mut self, address: &str, _value: &Scalar) -> TaskStatus {
        TaskStatus::failure(vec![address.to_string()], "no control layer enabled")
    }

    fn put_many(&mut self, requests: &[PutRequest]) -> TaskStatus {
        let addresses = requests.iter().map(|r| r.address.clone()).collect();
        TaskStatus::failure(addresses, "no control layer enabled")
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    /// Scripted provider: serves fixed values, fails chosen addresses and
    /// records every read and write.
    #[derive(Debug, Default)]
    pub struct FakeControl {
        values: HashMap<String, EpicsValue>,
        failing_reads: HashSet<String>,
        failing_writes: HashSet<String>,
        reads: RefCell<Vec<String>>,
        pub writes: Vec<PutRequest>,
        pub bulk_requests: usize,
    }

    impl FakeControl {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_value(mut self, address: &str, value: EpicsValue) -> Self {
            self.values.insert(address.to_string(), value);
            self
        }

        pub fn failing_read(mut self, address: &str) -> Self {
            self.failing_reads.insert(address.to_string());
            self
        }

        pub fn failing_write(mut self, address: &str) -> Self {
            self.failing_writes.insert(address.to_string());
            self
        }

        /// Addresses read so far, in call order.
        pub fn reads(&self) -> Vec<String> {
            self.reads.borrow().clone()
        }
    }

    impl ControlLayer for FakeControl {
        fn get(&self, address: &str) -> Result<EpicsValue> {
            self.reads.borrow_mut().push(address.to_string());
            if self.failing_reads.contains(address) {
                return Err(SquirrelError::Communication(format!(
                    "timeout reading {}",
                    address
                )));
            }
            self.values
                .get(address)
                .cloned()
                .ok_or_else(|| SquirrelError::Communication(format!("{} not found", address)))
        }

        fn put(&mut self, address: &str, value: &Scalar) -> TaskStatus {
            self.writes.push(PutRequest::new(address, value.clone()));
            if self.failing_writes.contains(address) {
                TaskStatus::failure(vec![address.to_string()], "write rejected")
            } else {
                TaskStatus::success(vec![address.to_string()])
            }
        }

        fn put_many(&mut self, requests: &[PutRequest]) -> TaskStatus {
            self.bulk_requests += 1;
            self.writes.extend(requests.iter().cloned());
            let addresses: Vec<String> = requests.iter().map(|r| r.address.clone()).collect();
            let failed: Vec<&str> = addresses
                .iter()
                .filter(|a| self.failing_writes.contains(a.as_str()))
                .map(String::as_str)
                .collect();
            if failed.is_empty() {
                TaskStatus::success(addresses)
            } else {
                let message = format!("write rejected for {}", failed.join(", "));
                TaskStatus::failure(addresses, message)
            }
        }
    }
}
