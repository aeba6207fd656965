//! Client-endpoint request handling.
//!
//! Every inbound client message gets exactly one reply. Malformed messages
//! and unsupported mesh-io-types answer with the `INVALID_MSG` sentinel and
//! never mutate state; unknown job ids answer with `INVALID_STATUS`.

use crate::proto::{
    Job, JobId, JobRequirementsSet, JobState, JobStatus, Message, MeshIOType, Response, ServiceTag,
};
use crate::server::core::Broker;
use crate::transport::SocketIdentity;
use bytes::Bytes;
use tracing::{debug, info};

impl Broker {
    pub(crate) fn handle_client_frames(&mut self, identity: &SocketIdentity, frames: &[Bytes]) {
        let message = match Message::parse(frames) {
            Ok(message) => message,
            Err(e) => {
                debug!(peer = %identity, error = %e, "malformed client message");
                self.reply_to_client(identity, Response::InvalidMessage);
                return;
            }
        };

        let response = match message.service {
            ServiceTag::CanMesh => Response::Bool(self.can_mesh(message.io_type)),
            ServiceTag::CanMeshRequirements => self.can_mesh_requirements(&message),
            ServiceTag::MeshRequirements => {
                Response::Requirements(self.mesh_requirements(message.io_type))
            }
            ServiceTag::MakeMesh => self.queue_job(&message),
            ServiceTag::MeshStatus => self.mesh_status(&message),
            ServiceTag::RetrieveMesh => self.retrieve_mesh(&message),
            ServiceTag::TerminateJob => self.terminate_job(&message),
            // Worker-only services have no meaning here.
            ServiceTag::Heartbeat | ServiceTag::Shutdown => Response::InvalidMessage,
        };
        self.reply_to_client(identity, response);
    }

    /// A type is meshable if the factory can spawn for it or a live worker
    /// of that type is registered.
    fn can_mesh(&self, io_type: MeshIOType) -> bool {
        self.factory.have_support(io_type) || self.worker_pool.has_any_of_type(io_type)
    }

    /// Whether a specific requirements descriptor is available for the type.
    fn can_mesh_requirements(&self, message: &Message) -> Response {
        match message.requirements() {
            Ok(Some(wanted)) => {
                let available = self.mesh_requirements(message.io_type);
                Response::Bool(available.contains(&wanted))
            }
            Ok(None) | Err(_) => Response::InvalidMessage,
        }
    }

    /// Factory-advertised descriptors plus those registered by connected
    /// workers, deduplicated.
    fn mesh_requirements(&self, io_type: MeshIOType) -> JobRequirementsSet {
        let mut set = self.factory.requirements(io_type);
        set.extend(self.worker_pool.registered_requirements(io_type));
        set
    }

    /// `MAKE_MESH`: validate, assign a fresh id, enqueue, reply with the id.
    fn queue_job(&mut self, message: &Message) -> Response {
        if !self.can_mesh(message.io_type) {
            debug!(io_type = %message.io_type, "submission for unsupported type rejected");
            return Response::InvalidMessage;
        }
        let submission = match message.submission() {
            Ok(submission) => submission,
            Err(e) => {
                debug!(error = %e, "bad submission payload");
                return Response::InvalidMessage;
            }
        };

        let id = JobId::generate();
        info!(job = %id, io_type = %message.io_type, "job queued");
        self.queued_jobs.add_job(Job::new(id.clone(), submission));
        Response::JobId(id)
    }

    /// `MESH_STATUS`: queued, active, or unknown.
    fn mesh_status(&self, message: &Message) -> Response {
        let Ok(id) = message.job_id() else {
            return Response::InvalidMessage;
        };
        if self.queued_jobs.contains(&id) {
            return Response::Status(JobStatus::new(id, JobState::Queued));
        }
        match self.active_jobs.status(&id) {
            Some(status) => Response::Status(status),
            None => Response::InvalidStatus,
        }
    }

    /// `RETRIEVE_MESH`: one-shot result delivery. The active record is
    /// removed even when no result was stored; a later query for this id
    /// reports unknown.
    fn retrieve_mesh(&mut self, message: &Message) -> Response {
        let Ok(id) = message.job_id() else {
            return Response::InvalidMessage;
        };
        let result = if self.active_jobs.contains(&id) && self.active_jobs.have_result(&id) {
            self.active_jobs
                .result(&id)
                .unwrap_or_else(|| crate::proto::JobResult::invalid(id.clone()))
        } else {
            crate::proto::JobResult::invalid(id.clone())
        };
        self.active_jobs.remove(&id);
        Response::Result(result)
    }

    /// `TERMINATE_JOB`: drop a queued job, or tell the assigned worker to
    /// stop and mark the record failed.
    fn terminate_job(&mut self, message: &Message) -> Response {
        let Ok(id) = message.job_id() else {
            return Response::InvalidMessage;
        };

        if self.queued_jobs.remove(&id).is_some() {
            info!(job = %id, "queued job terminated");
            return Response::Status(JobStatus::new(id, JobState::Failed));
        }

        let Some(status) = self.active_jobs.status(&id) else {
            return Response::InvalidStatus;
        };
        if status.is_terminal() {
            // Nothing left to stop; report the state the job ended in.
            return Response::Status(status);
        }

        if let Some(worker) = self.active_jobs.worker_for(&id) {
            self.send_to_worker(&worker, Response::Terminate(id.clone()));
        }
        self.active_jobs.mark_failed(&id);
        info!(job = %id, "active job terminated");
        Response::Status(JobStatus::new(id, JobState::Failed))
    }
}
