use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::error::FlowError;
use crate::types::{PortData, PortType};

#[derive(Debug, Clone, PartialEq)]
pub struct PortDefinition {
    pub name: String,
    pub port_type: PortType,
    pub required: bool,
    pub default_value: Option<serde_json::Value>,
}

/// Write-only progress counter owned by the host.
///
/// A runner pre-sizes it with [`begin`](ProgressSink::begin) and increments
/// it by exactly one per synthesized frame; the host polls [`value`](ProgressSink::value)
/// or [`fraction`](ProgressSink::fraction) to render progress.
#[derive(Debug, Default)]
pub struct ProgressSink {
    total: AtomicU64,
    done: AtomicU64,
}

impl ProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the counter and declare the expected total.
    pub fn begin(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    pub fn update(&self, n: u64) {
        self.done.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn fraction(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        (self.value() as f32 / total as f32).clamp(0.0, 1.0)
    }
}

/// Host-wide cooperative cancellation flag, polled between frame yields.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct ExecutionContext {
    pub progress: Option<Arc<ProgressSink>>,
    pub interrupt: InterruptFlag,
}

impl ExecutionContext {
    /// Fails with [`FlowError::Cancelled`] once the host interrupt is raised.
    pub fn check_interrupted(&self) -> Result<(), FlowError> {
        if self.interrupt.is_raised() {
            return Err(FlowError::Cancelled);
        }

        Ok(())
    }

    pub fn report_progress(&self, n: u64) {
        if let Some(progress) = &self.progress {
            progress.update(n);
        }
    }
}

/// Core node trait that all nodes implement.
pub trait Node: Send + Sync {
    fn node_type(&self) -> &str;
    fn input_ports(&self) -> Vec<PortDefinition>;
    fn output_ports(&self) -> Vec<PortDefinition>;
    fn execute(
        &mut self,
        inputs: &HashMap<String, PortData>,
        ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>>;
}
