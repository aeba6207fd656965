//! Starting, stopping, and joining the dispatch loop.
//!
//! `Broker::start` consumes the bound broker, spawns the dispatch loop,
//! and returns a [`BrokerHandle`]. Signal capture is scoped to the run:
//! handlers are installed when the loop starts and torn down on every exit
//! path, so no process-global mutable state outlives the broker.

use crate::proto::Response;
use crate::server::config::SignalHandling;
use crate::server::core::Broker;
use crate::server::ports::ServerPorts;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long departing workers get to act on the shutdown notice.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Control handle for a running broker.
pub struct BrokerHandle {
    ports: ServerPorts,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl BrokerHandle {
    /// The addresses the broker bound to.
    pub fn ports(&self) -> &ServerPorts {
        &self.ports
    }

    /// Whether the dispatch loop is still running.
    pub fn is_brokering(&self) -> bool {
        !self.task.is_finished()
    }

    /// Requests an orderly shutdown. Idempotent; returns immediately.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Waits for the dispatch loop to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "broker task ended abnormally");
        }
    }

    /// `stop` followed by `join`.
    pub async fn stop_and_join(self) {
        self.stop();
        self.join().await;
    }
}

impl Broker {
    /// Spawns the dispatch loop and returns its control handle.
    ///
    /// With [`SignalHandling::Capture`], interrupt and terminate signals
    /// trigger the same orderly shutdown as [`BrokerHandle::stop`]; with
    /// [`SignalHandling::None`] they take their default action.
    pub fn start(self, signal_handling: SignalHandling) -> BrokerHandle {
        let ports = self.server_port_info().clone();
        let shutdown = CancellationToken::new();
        let loop_token = shutdown.clone();

        let task = tokio::spawn(async move {
            let signal_task = match signal_handling {
                SignalHandling::Capture => Some(spawn_signal_listener(loop_token.clone())),
                SignalHandling::None => None,
            };

            self.run(loop_token).await;

            // Scoped teardown: the handlers never outlive the run.
            if let Some(task) = signal_task {
                task.abort();
            }
        });

        BrokerHandle {
            ports,
            shutdown,
            task,
        }
    }

    /// Tells every known worker the broker is going away, gives them a
    /// bounded grace period, then kills factory children.
    pub(crate) async fn terminate_all_workers(&mut self) {
        let mut identities: BTreeSet<_> = self.worker_pool.identities().into_iter().collect();
        identities.extend(self.active_jobs.workers());

        info!(workers = identities.len(), "notifying workers of shutdown");
        for identity in &identities {
            self.send_to_worker(identity, Response::Shutdown);
        }
        if !identities.is_empty() {
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        }
        self.factory.terminate_all();
    }
}

fn spawn_signal_listener(shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interrupted = wait_for_signal().await;
        debug!(signal = interrupted, "caught termination signal");
        shutdown.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return "interrupt";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "interrupt",
        _ = terminate.recv() => "terminate",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
