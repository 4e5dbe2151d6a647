//! SIGINT forwarding to in-flight blocking calls
//!
//! While a blocking call is parked on the loop, its cancellation token is
//! armed here. When a termination signal arrives (or [`InterruptHub::fire`]
//! is called programmatically), every armed token is cancelled, which drops
//! the in-flight futures on the loop and releases the blocked threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

struct Slot {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

/// Registry of cancellation tokens for in-flight blocking calls
#[derive(Clone, Default)]
pub struct InterruptHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    slots: Mutex<HashMap<u64, Slot>>,
    next_id: AtomicU64,
}

impl InterruptHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a token for the duration of a blocking wait
    ///
    /// The returned guard disarms the token when dropped and remembers
    /// whether an interrupt fired while it was armed, so the waiter can
    /// distinguish signal-originating cancellation from a plain one.
    pub fn arm(&self, token: CancellationToken) -> InterruptGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let fired = Arc::new(AtomicBool::new(false));
        self.inner.slots.lock().insert(
            id,
            Slot {
                token,
                fired: fired.clone(),
            },
        );
        InterruptGuard {
            hub: self.clone(),
            id,
            fired,
        }
    }

    /// Cancel every armed token, returning how many were hit
    pub fn fire(&self) -> usize {
        let slots = self.inner.slots.lock();
        for slot in slots.values() {
            slot.fired.store(true, Ordering::SeqCst);
            slot.token.cancel();
        }
        slots.len()
    }

    /// Number of currently armed blocking calls
    pub fn armed(&self) -> usize {
        self.inner.slots.lock().len()
    }
}

/// Disarms an interrupt slot on drop
pub struct InterruptGuard {
    hub: InterruptHub,
    id: u64,
    fired: Arc<AtomicBool>,
}

impl InterruptGuard {
    /// True if an interrupt fired while this slot was armed
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.hub.inner.slots.lock().remove(&self.id);
    }
}
