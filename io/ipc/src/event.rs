//! Bare signalable objects.

use std::sync::Arc;

use crate::cell::SignalCell;
use crate::signals::Signals;
use crate::waitset::SignalSource;

/// A standalone signal word with no data path. Used as a doorbell:
/// one side asserts [`Signals::SIGNALED`], a wait-set observes it.
///
/// Cloning yields another reference to the same underlying object.
#[derive(Clone)]
pub struct Event {
    cell: Arc<SignalCell>,
}

impl Event {
    pub fn new() -> Self {
        Event {
            cell: SignalCell::new(Signals::empty()),
        }
    }

    /// Clear then set bits. Only SIGNALED and the user bits may be
    /// touched; anything else is masked out.
    pub fn signal(&self, clear: Signals, set: Signals) {
        let allowed = Signals::SIGNALED | Signals::USER_ALL;
        self.cell.update(clear & allowed, set & allowed);
    }

    pub fn signals(&self) -> Signals {
        self.cell.load()
    }

    pub fn source(&self) -> SignalSource {
        SignalSource::new(self.cell.clone())
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("signals", &self.signals())
            .finish()
    }
}
