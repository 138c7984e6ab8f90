//! The shared signal word behind every endpoint.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::signals::Signals;
use crate::waitset::WaitSetShared;

/// One endpoint's observable signal state plus the wait-sets watching it.
///
/// Lock order: `bits` is never held while a wait-set lock is taken, so
/// wait-set scans (which read `bits` under their own lock) cannot
/// deadlock against updates.
pub(crate) struct SignalCell {
    bits: Mutex<Signals>,
    watchers: Mutex<Vec<Weak<WaitSetShared>>>,
}

impl SignalCell {
    pub(crate) fn new(initial: Signals) -> Arc<Self> {
        Arc::new(SignalCell {
            bits: Mutex::new(initial),
            watchers: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn load(&self) -> Signals {
        *self.bits.lock()
    }

    /// Clear then set bits; wake observing wait-sets if anything changed.
    pub(crate) fn update(&self, clear: Signals, set: Signals) {
        let changed = {
            let mut bits = self.bits.lock();
            let next = bits.difference(clear).union(set);
            if next == *bits {
                false
            } else {
                *bits = next;
                true
            }
        };
        if !changed {
            return;
        }
        let live: Vec<Arc<WaitSetShared>> = {
            let mut watchers = self.watchers.lock();
            watchers.retain(|w| w.strong_count() > 0);
            watchers.iter().filter_map(Weak::upgrade).collect()
        };
        for ws in live {
            ws.notify();
        }
    }

    /// Register a wait-set as an observer of this cell.
    pub(crate) fn attach(&self, ws: &Arc<WaitSetShared>) {
        let mut watchers = self.watchers.lock();
        if !watchers
            .iter()
            .any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(ws)))
        {
            watchers.push(Arc::downgrade(ws));
        }
    }
}

impl std::fmt::Debug for SignalCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalCell").field("bits", &self.load()).finish()
    }
}
