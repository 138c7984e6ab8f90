//! The net multiplexer: readiness over all armed socket fds.
//!
//! The multiplexer thread owns a `mio::Poll`. Which fds it watches, and
//! for what, is driven by the shared [`EventTable`]: handlers arm
//! events from the runner thread and then poke the interrupter so the
//! loop re-evaluates its registrations. Each poll is bracketed by a
//! watcher start/stop so client-endpoint readiness can interrupt the
//! poll the same way.
//!
//! When an armed fd fires, its fired bits are disarmed, the net-wait
//! requests for that fd are detached, and everything is posted to the
//! request runner. Handlers re-arm before suspending again, so a fired
//! event never spins.

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use io_ipc::{InterruptReader, Signals};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::backend::RawSocket;
use crate::queue::WaitKind;
use crate::router::Core;

bitflags! {
    /// Armed readiness events for one socket fd.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FdEvents: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXCEPT = 1 << 2;
    }
}

/// The process-wide per-fd event mask, shared between the runner
/// (which arms and clears) and the multiplexer (which polls).
pub struct EventTable {
    inner: Mutex<HashMap<RawSocket, FdEvents>>,
}

impl EventTable {
    pub fn new() -> EventTable {
        EventTable {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, fd: RawSocket, events: FdEvents) {
        let mut table = self.inner.lock();
        *table.entry(fd).or_default() |= events;
    }

    pub fn clear(&self, fd: RawSocket, events: FdEvents) {
        let mut table = self.inner.lock();
        if let Some(mask) = table.get_mut(&fd) {
            *mask -= events;
            if mask.is_empty() {
                table.remove(&fd);
            }
        }
    }

    /// Drop the fd entirely (socket closed).
    pub fn remove(&self, fd: RawSocket) {
        self.inner.lock().remove(&fd);
    }

    pub fn get(&self, fd: RawSocket) -> FdEvents {
        self.inner.lock().get(&fd).copied().unwrap_or_default()
    }

    fn snapshot(&self) -> Vec<(RawSocket, FdEvents)> {
        self.inner.lock().iter().map(|(fd, ev)| (*fd, *ev)).collect()
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

const INTERRUPT_TOKEN: Token = Token(usize::MAX);

fn interest_for(events: FdEvents) -> Option<Interest> {
    // mio cannot express error-only interest; EXCEPT-only fds are left
    // unregistered and surface errors on their next armed operation.
    let mut interest = None;
    if events.contains(FdEvents::READ) {
        interest = Some(Interest::READABLE);
    }
    if events.contains(FdEvents::WRITE) {
        interest = Some(match interest {
            Some(i) => i | Interest::WRITABLE,
            None => Interest::WRITABLE,
        });
    }
    interest
}

/// The multiplexer thread body.
pub fn run(core: Arc<Core>, interrupt_rx: InterruptReader) {
    let mut poll = match Poll::new() {
        Ok(poll) => poll,
        Err(e) => {
            error!("net-mux: failed to create poll: {e}");
            return;
        }
    };
    if let Err(e) = poll.registry().register(
        &mut SourceFd(&interrupt_rx.raw_fd()),
        INTERRUPT_TOKEN,
        Interest::READABLE,
    ) {
        error!("net-mux: failed to register interrupter: {e}");
        return;
    }

    let mut events = Events::with_capacity(256);
    let mut registered: HashMap<RawSocket, Interest> = HashMap::new();

    loop {
        if core.is_shutdown() {
            return;
        }

        sync_registrations(&mut poll, &mut registered, &core);

        if !core.watcher.start() {
            error!("net-mux: handle watcher is gone");
            return;
        }

        match poll.poll(&mut events, None) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                error!("net-mux: poll failed: {e}");
                let _ = core.watcher.stop();
                return;
            }
        }

        if core.watcher.stop() {
            // Some client endpoint fired while we were polling.
            core.watcher.dispatch(&core);
        }

        for event in events.iter() {
            if event.token() == INTERRUPT_TOKEN {
                interrupt_rx.drain();
                continue;
            }
            let fd = event.token().0 as RawSocket;
            let armed = core.events.get(fd);
            let mut observed = FdEvents::empty();
            if (event.is_readable() || event.is_read_closed()) && armed.contains(FdEvents::READ)
            {
                observed |= FdEvents::READ;
            }
            if (event.is_writable() || event.is_write_closed())
                && armed.contains(FdEvents::WRITE)
            {
                observed |= FdEvents::WRITE;
            }
            if event.is_error() {
                // Errors wake whatever the fd was armed for.
                observed |= armed - FdEvents::EXCEPT;
                if armed.contains(FdEvents::EXCEPT) {
                    observed |= FdEvents::EXCEPT;
                }
            }
            if observed.is_empty() {
                continue;
            }
            trace!(fd, ?observed, "net-mux: fd ready");
            core.events.clear(fd, observed);
            for rq in core.queues.take(WaitKind::Net, fd) {
                core.post(rq, observed, Signals::empty());
            }
        }
    }
}

fn sync_registrations(
    poll: &mut Poll,
    registered: &mut HashMap<RawSocket, Interest>,
    core: &Core,
) {
    let mut desired: HashMap<RawSocket, Interest> = HashMap::new();
    for (fd, events) in core.events.snapshot() {
        if let Some(interest) = interest_for(events) {
            desired.insert(fd, interest);
        }
    }

    registered.retain(|fd, _| {
        if desired.contains_key(fd) {
            true
        } else {
            // The fd may already be closed; epoll drops it for us then.
            let _ = poll.registry().deregister(&mut SourceFd(fd));
            false
        }
    });

    for (fd, interest) in desired {
        match registered.get(&fd) {
            Some(current) if *current == interest => {}
            Some(_) => {
                if poll
                    .registry()
                    .reregister(&mut SourceFd(&fd), Token(fd as usize), interest)
                    .is_ok()
                {
                    registered.insert(fd, interest);
                } else {
                    debug!(fd, "net-mux: reregister failed");
                    registered.remove(&fd);
                }
            }
            None => {
                if poll
                    .registry()
                    .register(&mut SourceFd(&fd), Token(fd as usize), interest)
                    .is_ok()
                {
                    registered.insert(fd, interest);
                } else {
                    debug!(fd, "net-mux: register failed");
                }
            }
        }
    }
}
