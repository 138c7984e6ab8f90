//! Wait-sets: block one thread on many endpoints with per-entry cookies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cell::SignalCell;
use crate::signals::Signals;

/// An opaque reference to an endpoint's signal word, suitable for
/// registration in a [`WaitSet`].
#[derive(Clone, Debug)]
pub struct SignalSource {
    cell: Arc<SignalCell>,
}

impl SignalSource {
    pub(crate) fn new(cell: Arc<SignalCell>) -> Self {
        SignalSource { cell }
    }

    /// The currently asserted signals.
    pub fn load(&self) -> Signals {
        self.cell.load()
    }

    /// Block until any bit in `mask` is asserted, or the timeout
    /// elapses. Returns the signals observed at wakeup (which may not
    /// intersect `mask` on timeout).
    pub fn wait(&self, mask: Signals, timeout: Option<Duration>) -> Signals {
        let ws = WaitSet::new();
        ws.add(0, self, mask);
        match ws.wait(timeout).first() {
            Some(item) => item.observed,
            None => self.cell.load(),
        }
    }

    pub(crate) fn cell(&self) -> &Arc<SignalCell> {
        &self.cell
    }
}

/// One fired wait-set entry.
#[derive(Debug, Clone, Copy)]
pub struct WaitItem {
    pub cookie: u64,
    pub observed: Signals,
}

struct Entry {
    cell: Arc<SignalCell>,
    mask: Signals,
}

pub(crate) struct WaitSetShared {
    inner: Mutex<HashMap<u64, Entry>>,
    cond: Condvar,
}

impl WaitSetShared {
    /// Wake a blocked `wait`. Taking the entry lock first serializes
    /// with the scan-then-sleep sequence so wakeups cannot be lost.
    pub(crate) fn notify(&self) {
        let _guard = self.inner.lock();
        self.cond.notify_all();
    }
}

/// A set of `(cookie, endpoint, mask)` entries a single thread can
/// block on. Cloning yields another reference to the same set.
#[derive(Clone)]
pub struct WaitSet {
    shared: Arc<WaitSetShared>,
}

impl WaitSet {
    pub fn new() -> Self {
        WaitSet {
            shared: Arc::new(WaitSetShared {
                inner: Mutex::new(HashMap::new()),
                cond: Condvar::new(),
            }),
        }
    }

    /// Add or replace the entry for `cookie`.
    pub fn add(&self, cookie: u64, source: &SignalSource, mask: Signals) {
        source.cell().attach(&self.shared);
        let mut inner = self.shared.inner.lock();
        inner.insert(
            cookie,
            Entry {
                cell: source.cell().clone(),
                mask,
            },
        );
        // The new entry may already be satisfied.
        self.shared.cond.notify_all();
    }

    /// Remove the entry for `cookie`. Returns whether one existed.
    pub fn remove(&self, cookie: u64) -> bool {
        self.shared.inner.lock().remove(&cookie).is_some()
    }

    pub fn contains(&self, cookie: u64) -> bool {
        self.shared.inner.lock().contains_key(&cookie)
    }

    pub fn len(&self) -> usize {
        self.shared.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until at least one entry observes a masked signal, or the
    /// timeout elapses (empty result). `Some(Duration::ZERO)` performs
    /// a non-blocking probe.
    pub fn wait(&self, timeout: Option<Duration>) -> Vec<WaitItem> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.shared.inner.lock();
        loop {
            let ready: Vec<WaitItem> = inner
                .iter()
                .filter_map(|(cookie, entry)| {
                    let observed = entry.cell.load();
                    if observed.intersects(entry.mask) {
                        Some(WaitItem {
                            cookie: *cookie,
                            observed,
                        })
                    } else {
                        None
                    }
                })
                .collect();
            if !ready.is_empty() {
                return ready;
            }
            match deadline {
                None => self.shared.cond.wait(&mut inner),
                Some(d) => {
                    if self.shared.cond.wait_until(&mut inner, d).timed_out() {
                        return Vec::new();
                    }
                }
            }
        }
    }
}

impl Default for WaitSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel;
    use crate::ChannelMessage;

    #[test]
    fn wait_returns_cookie_and_observed() {
        let (a, b) = channel();
        let ws = WaitSet::new();
        ws.add(7, &a.source(), Signals::READABLE);

        b.write(ChannelMessage::data(b"x".to_vec())).unwrap();
        let items = ws.wait(Some(Duration::from_secs(1)));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].cookie, 7);
        assert!(items[0].observed.contains(Signals::READABLE));
    }

    #[test]
    fn zero_timeout_probe_is_nonblocking() {
        let (a, _b) = channel();
        let ws = WaitSet::new();
        ws.add(1, &a.source(), Signals::READABLE);
        assert!(ws.wait(Some(Duration::ZERO)).is_empty());
    }

    #[test]
    fn removed_entry_does_not_fire() {
        let (a, b) = channel();
        let ws = WaitSet::new();
        ws.add(3, &a.source(), Signals::READABLE);
        assert!(ws.remove(3));
        assert!(!ws.contains(3));
        b.write(ChannelMessage::data(b"x".to_vec())).unwrap();
        assert!(ws.wait(Some(Duration::from_millis(10))).is_empty());
    }

    #[test]
    fn cross_thread_wakeup() {
        let (a, b) = channel();
        let ws = WaitSet::new();
        ws.add(1, &a.source(), Signals::READABLE);

        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            b.write(ChannelMessage::data(b"ping".to_vec())).unwrap();
            b
        });

        let items = ws.wait(Some(Duration::from_secs(5)));
        assert_eq!(items.len(), 1);
        let _b = t.join().unwrap();
    }

    #[test]
    fn peer_close_observed() {
        let (a, b) = channel();
        let ws = WaitSet::new();
        ws.add(9, &a.source(), Signals::PEER_CLOSED);
        drop(b);
        let items = ws.wait(Some(Duration::from_secs(1)));
        assert_eq!(items.len(), 1);
        assert!(items[0].observed.contains(Signals::PEER_CLOSED));
    }
}
