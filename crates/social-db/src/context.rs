use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{StoreError, StoreResult};

/// Per-call deadline and cancellation, threaded through every store method.
///
/// A context with no deadline still gets the database's query timeout; a
/// caller deadline only ever shortens the budget.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    /// Tightens the deadline to `timeout` from now, never loosens it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub(crate) fn effective_deadline(&self, budget: Duration) -> Instant {
        let ceiling = Instant::now() + budget;
        match self.deadline {
            Some(deadline) => deadline.min(ceiling),
            None => ceiling,
        }
    }

    /// Fails fast when the call is already dead on arrival.
    pub(crate) fn check(&self, op: &'static str) -> StoreResult<()> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled { op });
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(StoreError::DeadlineExceeded { op });
        }
        Ok(())
    }
}
