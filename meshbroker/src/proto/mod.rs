//! The message taxonomy shared by broker, clients, and workers.
//!
//! Every exchange is a multipart message: an optional routing identity
//! (owned by the transport), a fixed protocol header, a service or
//! reply-kind tag, a mesh-io-type, and service-specific payload frames.
//! This module defines the typed view of those frames; the framing itself
//! lives in [`crate::transport`].

mod job;
mod mesh_types;
mod message;
mod response;
mod result;
mod service;
mod status;

pub use job::{
    Job, JobHeader, JobId, JobRequirements, JobRequirementsSet, JobSubmission, SubmissionContent,
};
pub use mesh_types::{MeshIOType, MeshKind, UnknownMeshKind};
pub use message::{Message, ProtoError};
pub use response::Response;
pub use result::JobResult;
pub use service::{ReplyKind, ServiceTag, INVALID_MSG, INVALID_STATUS, PROTOCOL_HEADER};
pub use status::{JobProgress, JobState, JobStatus};

pub(crate) use message::encode_content;
