//! Service tags and protocol markers.
//!
//! Frame 1 of every message carries [`PROTOCOL_HEADER`]; frame 2 carries a
//! service tag. Replies carry a reply-kind tag instead of a service tag so a
//! peer can decode the payload without knowing which request it answers.

use std::fmt;
use std::str::FromStr;

/// Fixed marker required on both directions of every exchange.
///
/// Distinguishes protocol frames from routing frames and rejects peers
/// speaking an incompatible revision.
pub const PROTOCOL_HEADER: &[u8] = b"MSHB01";

/// Sentinel payload for malformed or unsupported requests.
pub const INVALID_MSG: &str = "INVALID_MSG";

/// Sentinel payload for status queries about unknown jobs.
pub const INVALID_STATUS: &str = "INVALID_STATUS";

/// The request services recognized on the two endpoints.
///
/// Client endpoint: `CanMesh`, `CanMeshRequirements`, `MeshRequirements`,
/// `MakeMesh`, `MeshStatus`, `RetrieveMesh`, `TerminateJob`.
/// Worker endpoint: `CanMesh` (register), `MakeMesh` (ready-for-work),
/// `MeshStatus` (progress), `RetrieveMesh` (result), `Heartbeat`, `Shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceTag {
    CanMesh,
    CanMeshRequirements,
    MeshRequirements,
    MakeMesh,
    MeshStatus,
    RetrieveMesh,
    TerminateJob,
    Heartbeat,
    Shutdown,
}

impl ServiceTag {
    pub fn tag(&self) -> &'static str {
        match self {
            ServiceTag::CanMesh => "CAN_MESH",
            ServiceTag::CanMeshRequirements => "CAN_MESH_REQUIREMENTS",
            ServiceTag::MeshRequirements => "MESH_REQUIREMENTS",
            ServiceTag::MakeMesh => "MAKE_MESH",
            ServiceTag::MeshStatus => "MESH_STATUS",
            ServiceTag::RetrieveMesh => "RETRIEVE_MESH",
            ServiceTag::TerminateJob => "TERMINATE_JOB",
            ServiceTag::Heartbeat => "HEARTBEAT",
            ServiceTag::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ServiceTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CAN_MESH" => Ok(ServiceTag::CanMesh),
            "CAN_MESH_REQUIREMENTS" => Ok(ServiceTag::CanMeshRequirements),
            "MESH_REQUIREMENTS" => Ok(ServiceTag::MeshRequirements),
            "MAKE_MESH" => Ok(ServiceTag::MakeMesh),
            "MESH_STATUS" => Ok(ServiceTag::MeshStatus),
            "RETRIEVE_MESH" => Ok(ServiceTag::RetrieveMesh),
            "TERMINATE_JOB" => Ok(ServiceTag::TerminateJob),
            "HEARTBEAT" => Ok(ServiceTag::Heartbeat),
            "SHUTDOWN" => Ok(ServiceTag::Shutdown),
            _ => Err(()),
        }
    }
}

/// Reply-kind tags, one per shape of [`super::response::Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    JobId,
    Status,
    Result,
    Requirements,
    Bool,
    Job,
    Terminate,
    Shutdown,
    InvalidMessage,
    InvalidStatus,
}

impl ReplyKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ReplyKind::JobId => "JOB_ID",
            ReplyKind::Status => "STATUS",
            ReplyKind::Result => "RESULT",
            ReplyKind::Requirements => "REQUIREMENTS",
            ReplyKind::Bool => "BOOL",
            ReplyKind::Job => "JOB",
            ReplyKind::Terminate => "TERMINATE",
            ReplyKind::Shutdown => "SHUTDOWN",
            ReplyKind::InvalidMessage => INVALID_MSG,
            ReplyKind::InvalidStatus => INVALID_STATUS,
        }
    }
}

impl FromStr for ReplyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JOB_ID" => Ok(ReplyKind::JobId),
            "STATUS" => Ok(ReplyKind::Status),
            "RESULT" => Ok(ReplyKind::Result),
            "REQUIREMENTS" => Ok(ReplyKind::Requirements),
            "BOOL" => Ok(ReplyKind::Bool),
            "JOB" => Ok(ReplyKind::Job),
            "TERMINATE" => Ok(ReplyKind::Terminate),
            "SHUTDOWN" => Ok(ReplyKind::Shutdown),
            INVALID_MSG => Ok(ReplyKind::InvalidMessage),
            INVALID_STATUS => Ok(ReplyKind::InvalidStatus),
            _ => Err(()),
        }
    }
}
