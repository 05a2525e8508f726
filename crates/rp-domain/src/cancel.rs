//! The cancellation primitive shared by every crate that can suspend on an
//! Invoker or DB call.
//!
//! A cheaply-cloneable, lock-free flag. The registry that maps session keys
//! to tokens (`CancelMap`) lives in `rp-sessions`, which is the crate that
//! actually owns turn lifecycles; this type is kept here, in the shared
//! leaf crate, purely so `rp-invoker`/`rp-graph`/`rp-search` can accept it
//! without depending back on `rp-sessions`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
