//! Where recoverable faults go.
//!
//! A dropped mention is not an error the caller sees, but it should not
//! vanish either. Every such fault is handed to a [`FaultSink`]; the sink
//! cannot influence the build.

use std::fmt;
use std::sync::{Arc, Mutex};

use smol_str::SmolStr;

use crate::error::Stage;

/// One recovered fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Pipeline stage that recovered
    pub stage: Stage,
    /// Short description of the input that failed, e.g. the handle
    pub input: SmolStr,
    /// Rendered cause
    pub cause: String,
}

impl Fault {
    /// Record a fault from any displayable cause.
    pub fn new(stage: Stage, input: impl Into<SmolStr>, cause: impl fmt::Display) -> Self {
        Self {
            stage,
            input: input.into(),
            cause: cause.to_string(),
        }
    }
}

/// Receives recovered faults.
pub trait FaultSink: fmt::Debug + Send + Sync {
    /// Called once per fault, from whichever task hit it.
    fn report(&self, fault: &Fault);
}

impl<T: FaultSink + ?Sized> FaultSink for Arc<T> {
    fn report(&self, fault: &Fault) {
        (**self).report(fault)
    }
}

/// Logs each fault as a `tracing` warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FaultSink for TracingSink {
    fn report(&self, fault: &Fault) {
        tracing::warn!(
            stage = %fault.stage,
            input = %fault.input,
            cause = %fault.cause,
            "recovered fault"
        );
    }
}

/// Keeps every fault in memory, in report order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    faults: Mutex<Vec<Fault>>,
}

impl CollectingSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far
    pub fn faults(&self) -> Vec<Fault> {
        self.faults
            .lock()
            .map(|f| f.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl FaultSink for CollectingSink {
    fn report(&self, fault: &Fault) {
        let mut faults = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        faults.push(fault.clone());
    }
}
