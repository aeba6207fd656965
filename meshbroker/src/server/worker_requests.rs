//! Worker-endpoint request handling.
//!
//! Workers mostly talk *at* the broker: registrations, readiness signals,
//! progress, and results carry no reply. The assignment frame a waiting
//! worker eventually receives comes out of the matching pass, not from
//! here. Heartbeat refresh has already happened in the dispatch loop by
//! the time these handlers run.

use crate::proto::{Message, Response, ServiceTag};
use crate::server::core::Broker;
use crate::transport::SocketIdentity;
use bytes::Bytes;
use std::time::Instant;
use tracing::{debug, info};

impl Broker {
    pub(crate) fn handle_worker_frames(&mut self, identity: &SocketIdentity, frames: &[Bytes]) {
        let message = match Message::parse(frames) {
            Ok(message) => message,
            Err(e) => {
                debug!(peer = %identity, error = %e, "malformed worker message");
                self.send_to_worker(identity, Response::InvalidMessage);
                return;
            }
        };

        match message.service {
            // Registration: the worker advertises a capability. No reply.
            ServiceTag::CanMesh => self.register_worker(identity, &message),
            // Ready-for-work: the worker blocks until a job is assigned.
            ServiceTag::MakeMesh => self.worker_ready(identity, &message),
            ServiceTag::MeshStatus => self.store_mesh_status(&message),
            ServiceTag::RetrieveMesh => self.store_mesh(&message),
            // Liveness only; the loop already refreshed the heartbeats.
            ServiceTag::Heartbeat => {}
            ServiceTag::Shutdown => self.worker_departed(identity),
            // Client-only services are ignored on this endpoint.
            ServiceTag::CanMeshRequirements
            | ServiceTag::MeshRequirements
            | ServiceTag::TerminateJob => {
                debug!(peer = %identity, service = %message.service, "client service on worker endpoint ignored");
            }
        }
    }

    fn register_worker(&mut self, identity: &SocketIdentity, message: &Message) {
        let requirements = message.requirements().unwrap_or_default();
        info!(worker = %identity, io_type = %message.io_type, "worker registered");
        self.worker_pool
            .add_worker(identity.clone(), message.io_type, requirements, Instant::now());
    }

    fn worker_ready(&mut self, identity: &SocketIdentity, message: &Message) {
        if !self.worker_pool.have_worker(identity) {
            self.worker_pool.add_worker(
                identity.clone(),
                message.io_type,
                message.requirements().unwrap_or_default(),
                Instant::now(),
            );
        }
        self.worker_pool.ready_for_work(identity);
    }

    fn store_mesh_status(&mut self, message: &Message) {
        match message.job_status() {
            Ok(status) => self.active_jobs.update_status(&status),
            Err(e) => debug!(error = %e, "bad status payload from worker"),
        }
    }

    fn store_mesh(&mut self, message: &Message) {
        match message.job_result() {
            Ok(result) => {
                info!(job = %result.id, bytes = result.payload.len(), "result stored");
                self.active_jobs.update_result(result);
            }
            Err(e) => debug!(error = %e, "bad result payload from worker"),
        }
    }

    /// A worker announced it is going away: treat exactly like heartbeat
    /// expiry, immediately.
    fn worker_departed(&mut self, identity: &SocketIdentity) {
        info!(worker = %identity, "worker announced shutdown");
        self.worker_pool.remove(identity);
        self.monitor.forget(identity);
        self.active_jobs.expire_worker(identity);
    }
}
