//! Client SDK: submit jobs and poll for results.
//!
//! One `Client` owns one connection to the broker's client endpoint and
//! speaks strict request/reply: every call sends one message and waits for
//! its single reply, bounded by the reply timeout.

use crate::proto::{
    JobId, JobRequirements, JobRequirementsSet, JobResult, JobStatus, JobSubmission, Message,
    MeshIOType, ProtoError, Response, ServiceTag,
};
use crate::server::{ServerPorts, DEFAULT_CLIENT_PORT};
use crate::transport::{Connection, TransportError};
use bytes::Bytes;
use std::time::Duration;

/// Default bound on waiting for a broker reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to find a broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConnection {
    pub host: String,
    pub port: u16,
}

impl ServerConnection {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The client endpoint of a broker's reported ports.
    pub fn for_clients(ports: &ServerPorts) -> Self {
        Self::new(ports.client_host.clone(), ports.client_port)
    }

    /// The worker endpoint of a broker's reported ports.
    pub fn for_workers(ports: &ServerPorts) -> Self {
        Self::new(ports.worker_host.clone(), ports.worker_port)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConnection {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_CLIENT_PORT)
    }
}

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("broker rejected the request")]
    Rejected,
    #[error("broker sent an unexpected reply")]
    UnexpectedReply,
}

/// A client-side handle to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub id: JobId,
    pub io_type: MeshIOType,
}

/// A connection to a broker's client endpoint.
pub struct Client {
    connection: Connection,
    reply_timeout: Duration,
}

impl Client {
    pub async fn connect(server: &ServerConnection) -> Result<Self, ClientError> {
        let connection = Connection::connect(server.endpoint()).await?;
        Ok(Self {
            connection,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        })
    }

    pub fn set_reply_timeout(&mut self, timeout: Duration) {
        self.reply_timeout = timeout;
    }

    /// Whether the broker can currently mesh `io_type`.
    pub async fn can_mesh(&mut self, io_type: MeshIOType) -> Result<bool, ClientError> {
        match self.request(ServiceTag::CanMesh, io_type, vec![]).await? {
            Response::Bool(answer) => Ok(answer),
            Response::InvalidMessage => Err(ClientError::Rejected),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Whether a specific requirements descriptor is available for the type.
    pub async fn can_mesh_requirements(
        &mut self,
        io_type: MeshIOType,
        requirements: &JobRequirements,
    ) -> Result<bool, ClientError> {
        let payload = vec![json_frame(requirements)?];
        match self
            .request(ServiceTag::CanMeshRequirements, io_type, payload)
            .await?
        {
            Response::Bool(answer) => Ok(answer),
            Response::InvalidMessage => Err(ClientError::Rejected),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// The requirement descriptors the broker advertises for `io_type`.
    pub async fn retrieve_requirements(
        &mut self,
        io_type: MeshIOType,
    ) -> Result<JobRequirementsSet, ClientError> {
        match self
            .request(ServiceTag::MeshRequirements, io_type, vec![])
            .await?
        {
            Response::Requirements(set) => Ok(set),
            Response::InvalidMessage => Err(ClientError::Rejected),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Submits a job; the returned ticket carries the broker-assigned id.
    pub async fn submit_job(&mut self, submission: &JobSubmission) -> Result<JobTicket, ClientError> {
        let mut payload = vec![json_frame(&submission.requirements)?];
        crate::proto::encode_content(&submission.content, &mut payload);

        match self
            .request(ServiceTag::MakeMesh, submission.io_type, payload)
            .await?
        {
            Response::JobId(id) => Ok(JobTicket {
                id,
                io_type: submission.io_type,
            }),
            Response::InvalidMessage => Err(ClientError::Rejected),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// The broker's current view of a job. Unknown ids report
    /// [`crate::proto::JobState::Invalid`].
    pub async fn job_status(&mut self, ticket: &JobTicket) -> Result<JobStatus, ClientError> {
        let payload = vec![Bytes::from(ticket.id.to_string())];
        match self
            .request(ServiceTag::MeshStatus, ticket.io_type, payload)
            .await?
        {
            Response::Status(status) => Ok(status),
            Response::InvalidStatus => Ok(JobStatus::invalid(ticket.id.clone())),
            Response::InvalidMessage => Err(ClientError::Rejected),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Retrieves the result. One-shot: the broker forgets the job
    /// afterwards, whether or not a result was stored.
    pub async fn retrieve_results(&mut self, ticket: &JobTicket) -> Result<JobResult, ClientError> {
        let payload = vec![Bytes::from(ticket.id.to_string())];
        match self
            .request(ServiceTag::RetrieveMesh, ticket.io_type, payload)
            .await?
        {
            Response::Result(result) => Ok(result),
            Response::InvalidMessage => Err(ClientError::Rejected),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Asks the broker to stop a job, queued or running.
    pub async fn terminate_job(&mut self, ticket: &JobTicket) -> Result<JobStatus, ClientError> {
        let payload = vec![Bytes::from(ticket.id.to_string())];
        match self
            .request(ServiceTag::TerminateJob, ticket.io_type, payload)
            .await?
        {
            Response::Status(status) => Ok(status),
            Response::InvalidStatus => Ok(JobStatus::invalid(ticket.id.clone())),
            Response::InvalidMessage => Err(ClientError::Rejected),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    async fn request(
        &mut self,
        service: ServiceTag,
        io_type: MeshIOType,
        payload: Vec<Bytes>,
    ) -> Result<Response, ClientError> {
        let frames = Message::compose(service, io_type, payload);
        let reply = self.connection.request(frames, self.reply_timeout).await?;
        Ok(Response::parse(&reply)?)
    }
}

fn json_frame<T: serde::Serialize>(value: &T) -> Result<Bytes, ClientError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| ClientError::Proto(ProtoError::BadPayload(e.to_string())))
}
