//! Guards against responses that arrive after their context moved on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter owned by one page.
///
/// Each fetch captures a [`Ticket`]; bumping the generation (on navigation or
/// a selection change) makes every outstanding ticket stale, so late results
/// can be discarded.
#[derive(Debug, Clone, Default)]
pub struct FetchGeneration {
    current: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl FetchGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.current.load(Ordering::SeqCst))
    }

    /// Invalidate all outstanding tickets and return a fresh one.
    pub fn advance(&self) -> Ticket {
        Ticket(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current.load(Ordering::SeqCst) == ticket.0
    }
}
