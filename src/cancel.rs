use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, time::{Duration, Instant}};

use anyhow::{bail, Result};

use crate::error::InterpError;

/// Cooperative cancellation for a single interpolation call.
/// Clones share the same flag, so any clone can cancel the call.
/// Checked once per target, the unit of work of every estimator.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self { Self::default() }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { flag: Arc::default(), deadline: Some(Instant::now() + timeout) }
    }

    /// Request cancellation; in-flight workers stop at their next target.
    pub fn cancel(&self) { self.flag.store(true, Ordering::Relaxed) }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fail with [`InterpError::Cancelled`] once cancelled or past the deadline.
    #[inline]
    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() { bail!(InterpError::Cancelled) }
        Ok(())
    }
}
