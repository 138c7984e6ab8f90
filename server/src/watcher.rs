//! The handle watcher: client-endpoint readiness.
//!
//! A dedicated thread blocks in a wait-set over every watched data
//! endpoint plus a control channel. The net multiplexer brackets each
//! of its polls with [`SignalWatcher::start`] / [`SignalWatcher::stop`]:
//! START sends the thread into the wait, ABORT (sent when the poll woke
//! for other reasons) pulls it back out, and the single result byte
//! says whether any non-control entry fired. On a hit the watcher also
//! pokes the multiplexer's interrupter so the poll returns promptly.
//!
//! The controller then collects the fired entries with a zero-timeout
//! probe and either synthesizes CLOSE/HALFCLOSE or hands the parked
//! client-wait requests back to the request runner.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use io_ipc::{channel, Channel, ChannelMessage, InterruptHandle, RecvError, Signals, WaitSet};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::iostate::{IoState, SIGNAL_HALFCLOSED};
use crate::multiplexer::FdEvents;
use crate::queue::WaitKind;
use crate::request::Request;
use crate::router::Core;
use protocol_rio::Op;

const START: u8 = 1;
const ABORT: u8 = 2;

/// Wait-set cookie of the control channel entry.
const CTRL_COOKIE: u64 = u64::MAX;

/// Controller half of the handle watcher. Owns the wait-set edits; the
/// watcher thread only ever waits on it.
pub struct SignalWatcher {
    waitset: WaitSet,
    /// Control channel to the watcher thread; `None` once closed at
    /// shutdown, which ends the thread.
    ctrl: Mutex<Option<Channel>>,
    /// Serializes watched-signal edits across the runner and the
    /// multiplexer's dispatch pass.
    edit: Mutex<()>,
}

impl SignalWatcher {
    /// Create the wait-set and control channel and spawn the watcher
    /// thread.
    pub fn spawn(interrupt: InterruptHandle) -> std::io::Result<(SignalWatcher, JoinHandle<()>)> {
        let (watcher_ctrl, controller_ctrl) = channel();
        let waitset = WaitSet::new();
        waitset.add(CTRL_COOKIE, &watcher_ctrl.source(), Signals::READABLE);

        let loop_waitset = waitset.clone();
        let handle = std::thread::Builder::new()
            .name("handle-watcher".to_string())
            .spawn(move || watcher_loop(watcher_ctrl, loop_waitset, interrupt))?;

        Ok((
            SignalWatcher {
                waitset,
                ctrl: Mutex::new(Some(controller_ctrl)),
                edit: Mutex::new(()),
            },
            handle,
        ))
    }

    /// Send the watcher into its wait. Returns false if the watcher
    /// thread is gone.
    pub fn start(&self) -> bool {
        match self.ctrl.lock().as_ref() {
            Some(ctrl) => ctrl.write(ChannelMessage::data(vec![START])).is_ok(),
            None => false,
        }
    }

    /// Collect the round's result byte, aborting the wait first if the
    /// watcher has not answered yet. Returns whether any non-control
    /// entry fired.
    pub fn stop(&self) -> bool {
        let guard = self.ctrl.lock();
        let Some(ctrl) = guard.as_ref() else {
            return false;
        };
        // Zero-timeout probe: is the result already queued?
        let observed =
            ctrl.wait_signals(Signals::READABLE | Signals::PEER_CLOSED, Some(Duration::ZERO));
        if !observed.contains(Signals::READABLE) {
            if observed.contains(Signals::PEER_CLOSED) {
                return false;
            }
            if ctrl.write(ChannelMessage::data(vec![ABORT])).is_err() {
                return false;
            }
        }
        let observed = ctrl.wait_signals(Signals::READABLE | Signals::PEER_CLOSED, None);
        if !observed.contains(Signals::READABLE) {
            return false;
        }
        match ctrl.try_read() {
            Ok(msg) => msg.bytes.first().copied().unwrap_or(0) != 0,
            Err(_) => false,
        }
    }

    /// Close the control channel, ending the watcher thread after its
    /// current round.
    pub fn close(&self) {
        self.ctrl.lock().take();
    }

    /// Add signals to the watched set for this connection's data
    /// endpoint, editing the wait-set entry to match.
    pub fn set(&self, ios: &Arc<IoState>, signals: Signals) {
        let _guard = self.edit.lock();
        let old = ios.watching();
        if old.contains(signals) {
            return;
        }
        self.change(ios, old, old | signals);
    }

    /// Remove signals from the watched set.
    pub fn clear(&self, ios: &Arc<IoState>, signals: Signals) {
        let _guard = self.edit.lock();
        let old = ios.watching();
        if (old & signals).is_empty() {
            return;
        }
        self.change(ios, old, old - signals);
    }

    /// Drop the connection's wait-set entry entirely.
    pub fn clear_all(&self, ios: &Arc<IoState>) {
        let _guard = self.edit.lock();
        if !ios.watching().is_empty() {
            self.waitset.remove(ios.id);
            ios.store_watching(Signals::empty());
        }
    }

    fn change(&self, ios: &Arc<IoState>, old: Signals, new: Signals) {
        trace!(ios = ios.id, ?old, ?new, "watching signals change");
        if !old.is_empty() {
            self.waitset.remove(ios.id);
        }
        if !new.is_empty() {
            if let Some(source) = ios.data_source() {
                self.waitset.add(ios.id, &source, new);
            } else {
                debug!(ios = ios.id, "no data endpoint to watch");
                ios.store_watching(Signals::empty());
                return;
            }
        }
        ios.store_watching(new);
    }

    /// Whether the wait-set currently holds an entry for this
    /// connection. The entry exists exactly while the watched-signal
    /// set is non-empty.
    pub fn has_entry(&self, id: u64) -> bool {
        self.waitset.contains(id)
    }

    /// Zero-timeout sweep over the wait-set: synthesize CLOSE or
    /// HALFCLOSE for dead or half-closed clients, and repost parked
    /// client-wait requests whose watched signals fired.
    pub fn dispatch(&self, core: &Core) {
        for item in self.waitset.wait(Some(Duration::ZERO)) {
            if item.cookie == CTRL_COOKIE {
                continue;
            }
            let Some(ios) = core.lookup_any(item.cookie) else {
                let _guard = self.edit.lock();
                self.waitset.remove(item.cookie);
                continue;
            };
            let watching = ios.watching();
            self.clear(&ios, item.observed);
            let observed = item.observed;
            trace!(ios = ios.id, ?observed, "watcher dispatch");

            if observed.contains(Signals::PEER_CLOSED) && !observed.contains(Signals::READABLE) {
                // Peer gone with nothing left to drain.
                core.post(
                    Request::internal(Op::Close, ios.clone()),
                    FdEvents::empty(),
                    observed,
                );
            } else if observed.contains(SIGNAL_HALFCLOSED)
                && !observed.contains(Signals::READABLE)
            {
                core.post(
                    Request::internal(Op::HalfClose, ios.clone()),
                    FdEvents::empty(),
                    observed,
                );
            } else if observed.intersects(watching) {
                for rq in core.queues.take(WaitKind::Client, ios.sockfd()) {
                    core.post(rq, FdEvents::empty(), observed);
                }
            }
        }
    }
}

fn watcher_loop(ctrl: Channel, waitset: WaitSet, interrupt: InterruptHandle) {
    loop {
        // Wait for a command; a dropped controller ends the thread.
        let observed = ctrl.wait_signals(Signals::READABLE | Signals::PEER_CLOSED, None);
        if !observed.contains(Signals::READABLE) {
            return;
        }
        let cmd = match ctrl.try_read() {
            Ok(msg) => msg.bytes.first().copied().unwrap_or(0),
            Err(RecvError::Empty) => continue,
            Err(RecvError::PeerClosed) => return,
        };
        if cmd == ABORT {
            // Stale abort from the previous round.
            continue;
        }

        let results = waitset.wait(None);
        let found = results
            .iter()
            .any(|item| item.cookie != CTRL_COOKIE && !item.observed.is_empty());
        if found {
            // Kick the net multiplexer out of its poll so the
            // controller runs a dispatch pass.
            interrupt.interrupt();
        }
        if ctrl
            .write(ChannelMessage::data(vec![found as u8]))
            .is_err()
        {
            return;
        }
    }
}
