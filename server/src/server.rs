//! Server lifecycle: build the core, spawn the threads, tear down.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use io_ipc::{interrupter, Channel};
use tracing::info;

use crate::backend::NetBackend;
use crate::buffer::BufferPool;
use crate::config::Config;
use crate::dispatcher;
use crate::iostate::HandleType;
use crate::multiplexer;
use crate::router::Core;
use crate::watcher::SignalWatcher;

/// A running socket-proxy server.
///
/// Three named threads: `rio-runner` (all operation handlers),
/// `net-mux` (socket readiness), `handle-watcher` (client-endpoint
/// readiness).
pub struct Server {
    core: Arc<Core>,
    runner: JoinHandle<()>,
    mux: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl Server {
    pub fn start(config: &Config, backend: Arc<dyn NetBackend>) -> io::Result<Server> {
        let (interrupt_tx, interrupt_rx) = interrupter()?;
        let (watcher, watcher_handle) = SignalWatcher::spawn(interrupt_tx.clone())?;
        let (posted_tx, posted_rx) = crossbeam_channel::unbounded();
        let pool = Arc::new(BufferPool::with_reserve(config.limits.buffer_reserve));

        let core = Arc::new(Core::new(
            backend,
            pool,
            watcher,
            interrupt_tx,
            posted_tx,
            config.limits.pipe_capacity,
        ));

        let runner = {
            let core = core.clone();
            std::thread::Builder::new()
                .name("rio-runner".to_string())
                .spawn(move || dispatcher::run(core, posted_rx))?
        };
        let mux = {
            let core = core.clone();
            std::thread::Builder::new()
                .name("net-mux".to_string())
                .spawn(move || multiplexer::run(core, interrupt_rx))?
        };

        info!("socket proxy started");
        Ok(Server {
            core,
            runner,
            mux,
            watcher: watcher_handle,
        })
    }

    /// Open the server root: a fresh control channel with no socket
    /// behind it. Clients issue OPEN on it to create sockets.
    pub fn connect(&self) -> Channel {
        self.core
            .create_iostate(HandleType::None, -1)
            .peer_rio
    }

    /// The shared core; exposed for embedding and invariant tests.
    pub fn core(&self) -> &Arc<Core> {
        &self.core
    }

    /// Stop the threads and release everything. Connections still open
    /// are torn down by the core dropping their records.
    pub fn shutdown(self) {
        let Server {
            core,
            runner,
            mux,
            watcher,
        } = self;
        core.begin_shutdown();
        let _ = runner.join();
        let _ = mux.join();
        core.watcher.close();
        let _ = watcher.join();
        drop(core);
        info!("socket proxy stopped");
    }

    /// Block until the server threads exit (normally only at
    /// shutdown).
    pub fn join(self) {
        let Server {
            core,
            runner,
            mux,
            watcher,
        } = self;
        let _ = runner.join();
        let _ = mux.join();
        core.watcher.close();
        let _ = watcher.join();
        drop(core);
    }
}
