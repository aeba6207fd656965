//! The broker: two endpoints, the coupled job/worker containers, and the
//! dispatch loop that drives them.
//!
//! The loop is single-threaded: every mutation of [`JobQueue`],
//! [`WorkerPool`], [`ActiveJobs`], and [`SocketMonitor`] happens here, so
//! none of the containers need locks. Handler methods live in sibling
//! modules (`client_requests`, `worker_requests`, `matching`,
//! `lifecycle`); this module owns the state and the loop itself.

use crate::proto::Response;
use crate::server::active_jobs::ActiveJobs;
use crate::server::config::{BrokerSettings, ConfigError};
use crate::server::factory::WorkerFactory;
use crate::server::job_queue::JobQueue;
use crate::server::monitor::SocketMonitor;
use crate::server::ports::ServerPorts;
use crate::server::worker_pool::WorkerPool;
use crate::transport::{RouterEndpoint, SocketIdentity, TransportError};
use bytes::Bytes;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Unrecoverable broker setup failures.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind endpoint: {0}")]
    Bind(#[from] TransportError),
}

/// The central brokering process.
pub struct Broker {
    pub(crate) ports: ServerPorts,
    pub(crate) client_endpoint: RouterEndpoint,
    pub(crate) worker_endpoint: RouterEndpoint,
    pub(crate) queued_jobs: JobQueue,
    pub(crate) worker_pool: WorkerPool,
    pub(crate) active_jobs: ActiveJobs,
    pub(crate) monitor: SocketMonitor,
    pub(crate) factory: Box<dyn WorkerFactory>,
}

enum LoopEvent {
    Shutdown,
    Client(SocketIdentity, Vec<Bytes>),
    Worker(SocketIdentity, Vec<Bytes>),
    Tick,
}

impl Broker {
    /// Binds both endpoints and wires the factory to the worker endpoint.
    ///
    /// The preferred ports fall back to ephemeral ones on conflict; read
    /// the result from [`Broker::server_port_info`].
    pub async fn bind(
        settings: BrokerSettings,
        mut factory: Box<dyn WorkerFactory>,
    ) -> Result<Self, BrokerError> {
        let client_endpoint =
            RouterEndpoint::bind(&settings.client_host, settings.client_port).await?;
        let worker_endpoint =
            RouterEndpoint::bind(&settings.worker_host, settings.worker_port).await?;

        let ports = ServerPorts {
            client_host: settings.client_host.clone(),
            client_port: client_endpoint.local_addr().port(),
            worker_host: settings.worker_host.clone(),
            worker_port: worker_endpoint.local_addr().port(),
        };

        // Spawned workers need the external name, not the bind address.
        factory.set_worker_endpoint(format!(
            "{}:{}",
            settings.external_worker_host, ports.worker_port
        ));

        Ok(Self {
            ports,
            client_endpoint,
            worker_endpoint,
            queued_jobs: JobQueue::new(),
            worker_pool: WorkerPool::new(),
            active_jobs: ActiveJobs::new(),
            monitor: SocketMonitor::new(settings.polling),
            factory,
        })
    }

    /// The addresses this broker actually bound to.
    pub fn server_port_info(&self) -> &ServerPorts {
        &self.ports
    }

    /// Runs the dispatch loop until `shutdown` fires, then notifies every
    /// known worker and returns.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(ports = %self.ports, "broker started");

        loop {
            let interval = self.monitor.current_interval();

            // Split borrows: the endpoints are polled here, everything else
            // is handled after the select with full access to self.
            let event = {
                let client = &mut self.client_endpoint;
                let worker = &mut self.worker_endpoint;
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => LoopEvent::Shutdown,

                    inbound = worker.recv() => match inbound {
                        Some((identity, frames)) => LoopEvent::Worker(identity, frames),
                        None => LoopEvent::Tick,
                    },

                    inbound = client.recv() => match inbound {
                        Some((identity, frames)) => LoopEvent::Client(identity, frames),
                        None => LoopEvent::Tick,
                    },

                    _ = tokio::time::sleep(interval) => LoopEvent::Tick,
                }
            };

            // At most one message per endpoint per iteration: whichever
            // endpoint won the poll, the other gets one non-blocking take,
            // so a flood on one side cannot starve the other.
            let now = Instant::now();
            let traffic = match event {
                LoopEvent::Shutdown => break,
                LoopEvent::Client(identity, frames) => {
                    self.handle_client_frames(&identity, &frames);
                    if let Some((identity, frames)) = self.worker_endpoint.try_recv() {
                        self.service_worker_message(&identity, &frames, now);
                    }
                    true
                }
                LoopEvent::Worker(identity, frames) => {
                    self.service_worker_message(&identity, &frames, now);
                    if let Some((identity, frames)) = self.client_endpoint.try_recv() {
                        self.handle_client_frames(&identity, &frames);
                    }
                    true
                }
                LoopEvent::Tick => false,
            };

            self.expire_silent_workers(now);
            self.find_worker_for_queued_job(now);

            if traffic {
                self.monitor.record_traffic();
            } else {
                self.monitor.record_idle();
            }
        }

        if !self.queued_jobs.is_empty() || !self.active_jobs.is_empty() {
            debug!("dropping unfinished jobs at shutdown");
        }
        self.terminate_all_workers().await;
        info!("broker stopped");
    }

    /// Handles one worker message and refreshes its heartbeats: any worker
    /// traffic is a liveness signal.
    fn service_worker_message(&mut self, identity: &SocketIdentity, frames: &[Bytes], now: Instant) {
        self.handle_worker_frames(identity, frames);
        self.active_jobs.refresh_jobs(identity, now);
        self.worker_pool.refresh_worker(identity, now);
        self.monitor.heartbeat(identity, now);
    }

    /// Expires jobs whose worker went silent and purges dead pool members.
    fn expire_silent_workers(&mut self, now: Instant) {
        let threshold = self.monitor.expiry_threshold();
        self.active_jobs.mark_failed_jobs(now, threshold);
        for identity in self.worker_pool.purge_dead_workers(now, &self.monitor) {
            self.monitor.forget(&identity);
        }
        self.monitor.sweep_expired(now);
    }

    /// Sends one reply to a client identity. Losing the peer is fine: the
    /// client retries.
    pub(crate) fn reply_to_client(&self, identity: &SocketIdentity, response: Response) {
        if !self.client_endpoint.send(identity, response.into_frames()) {
            debug!(peer = %identity, "client reply dropped");
        }
    }

    /// Sends one frame set to a worker identity.
    pub(crate) fn send_to_worker(&self, identity: &SocketIdentity, response: Response) {
        if !self.worker_endpoint.send(identity, response.into_frames()) {
            debug!(peer = %identity, "worker send dropped");
        }
    }
}
