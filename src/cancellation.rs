//! A session's cancellation flag: checked between phases and at each
//! batch boundary, never mid-write (every write is already temp-file +
//! atomic rename, so a cancellation can never leave a path partially
//! written).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct SessionCancellation(Arc<AtomicBool>);

impl SessionCancellation {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
