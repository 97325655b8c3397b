//! Process-wide startup/shutdown sequencing
//!
//! Handles start in registration order. If one fails, the handles that
//! already started are stopped in reverse and the failure is returned.
//! Shutdown stops every handle in reverse order.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::Result;

/// Something with a start/stop lifetime tied to the process
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Bring the handle up
    async fn start(&self) -> Result<()>;

    /// Tear the handle down
    async fn stop(&self) -> Result<()>;

    /// Whether the handle is currently serving
    fn is_running(&self) -> bool;
}

/// Ordered list of lifecycle handles
#[derive(Default)]
pub struct LifecycleChain {
    handles: Vec<Arc<dyn Lifecycle>>,
    started: Mutex<usize>,
}

impl std::fmt::Debug for LifecycleChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handles.iter().map(|h| h.name()).collect();
        f.debug_struct("LifecycleChain")
            .field("handles", &names)
            .field("started", &*self.started.lock())
            .finish()
    }
}

impl LifecycleChain {
    /// Empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle; it starts after every handle pushed before it
    pub fn push(&mut self, handle: Arc<dyn Lifecycle>) {
        self.handles.push(handle);
    }

    /// Number of registered handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handles are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Start every handle in order.
    ///
    /// # Errors
    ///
    /// Returns the first start failure, after stopping the handles that had
    /// already started.
    pub async fn start_all(&self) -> Result<()> {
        for (index, handle) in self.handles.iter().enumerate() {
            if let Err(e) = handle.start().await {
                error!(handle = %handle.name(), error = %e, "Start failed, unwinding");
                self.unwind(index).await;
                return Err(e);
            }
            *self.started.lock() = index + 1;
            info!(handle = %handle.name(), "Started");
        }
        Ok(())
    }

    /// Stop every started handle in reverse order.
    ///
    /// Stop failures are logged and do not prevent the remaining handles
    /// from stopping.
    pub async fn stop_all(&self) {
        let started = std::mem::take(&mut *self.started.lock());
        self.unwind(started).await;
    }

    /// Whether every handle is running
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.handles.iter().all(|h| h.is_running())
    }

    async fn unwind(&self, count: usize) {
        for handle in self.handles[..count].iter().rev() {
            match handle.stop().await {
                Ok(()) => info!(handle = %handle.name(), "Stopped"),
                Err(e) => warn!(handle = %handle.name(), error = %e, "Stop failed"),
            }
        }
        *self.started.lock() = 0;
    }
}
