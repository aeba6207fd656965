//! Inbound message parsing.
//!
//! The transport hands the broker a routing identity plus the remaining
//! frames of a multipart message. [`Message::parse`] turns those frames into
//! a typed `{service, mesh-io-type, payload}` triple; the payload accessors
//! decode the service-specific frames. Parsing failures are values, never
//! panics: the broker answers them with `INVALID_MSG` and keeps running.

use crate::proto::job::{JobId, JobRequirements, JobSubmission, SubmissionContent};
use crate::proto::mesh_types::MeshIOType;
use crate::proto::result::JobResult;
use crate::proto::service::{ServiceTag, PROTOCOL_HEADER};
use crate::proto::status::JobStatus;
use bytes::Bytes;

/// Errors produced while decoding protocol frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("message is missing frame {0}")]
    MissingFrame(usize),
    #[error("bad protocol header")]
    BadHeader,
    #[error("unknown service tag")]
    UnknownService,
    #[error("unknown mesh-io-type tag")]
    UnknownMeshType,
    #[error("frame is not valid UTF-8")]
    BadUtf8,
    #[error("bad payload: {0}")]
    BadPayload(String),
}

fn frame(frames: &[Bytes], index: usize) -> Result<&Bytes, ProtoError> {
    frames.get(index).ok_or(ProtoError::MissingFrame(index))
}

fn frame_str(frames: &[Bytes], index: usize) -> Result<&str, ProtoError> {
    std::str::from_utf8(frame(frames, index)?).map_err(|_| ProtoError::BadUtf8)
}

/// A parsed inbound request: `[header] [service] [mesh-io-type] [payload…]`.
#[derive(Debug, Clone)]
pub struct Message {
    pub service: ServiceTag,
    pub io_type: MeshIOType,
    pub payload: Vec<Bytes>,
}

impl Message {
    /// Parses the frames of an inbound request (identity already stripped).
    pub fn parse(frames: &[Bytes]) -> Result<Self, ProtoError> {
        if frame(frames, 0)? != PROTOCOL_HEADER {
            return Err(ProtoError::BadHeader);
        }
        let service = frame_str(frames, 1)?
            .parse::<ServiceTag>()
            .map_err(|_| ProtoError::UnknownService)?;
        let io_type = frame_str(frames, 2)?
            .parse::<MeshIOType>()
            .map_err(|_| ProtoError::UnknownMeshType)?;
        Ok(Self {
            service,
            io_type,
            payload: frames[3..].to_vec(),
        })
    }

    /// Builds the frames for an outbound request (SDK send side).
    pub fn compose(service: ServiceTag, io_type: MeshIOType, payload: Vec<Bytes>) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(3 + payload.len());
        frames.push(Bytes::from_static(PROTOCOL_HEADER));
        frames.push(Bytes::from(service.tag()));
        frames.push(Bytes::from(io_type.tag()));
        frames.extend(payload);
        frames
    }

    /// Payload frame 0 as a job id (status / retrieve / terminate queries).
    pub fn job_id(&self) -> Result<JobId, ProtoError> {
        let text = frame_str(&self.payload, 0)?;
        JobId::parse(text).ok_or_else(|| ProtoError::BadPayload(format!("bad job id '{text}'")))
    }

    /// Decodes a `MAKE_MESH` submission: requirements JSON plus alternating
    /// key/value content frames.
    pub fn submission(&self) -> Result<JobSubmission, ProtoError> {
        let requirements: JobRequirements = serde_json::from_slice(frame(&self.payload, 0)?)
            .map_err(|e| ProtoError::BadPayload(e.to_string()))?;
        let content = decode_content(&self.payload[1..])?;
        Ok(JobSubmission {
            io_type: self.io_type,
            requirements,
            content,
        })
    }

    /// Decodes an embedded `JobStatus` (worker progress updates).
    pub fn job_status(&self) -> Result<JobStatus, ProtoError> {
        serde_json::from_slice(frame(&self.payload, 0)?)
            .map_err(|e| ProtoError::BadPayload(e.to_string()))
    }

    /// Decodes an embedded `JobResult` (worker result delivery).
    pub fn job_result(&self) -> Result<JobResult, ProtoError> {
        let id = self.job_id()?;
        let payload = frame(&self.payload, 1)?.clone();
        Ok(JobResult::new(id, payload))
    }

    /// Decodes a `CAN_MESH_REQUIREMENTS` query or the optional descriptor a
    /// worker attaches to its registration.
    pub fn requirements(&self) -> Result<Option<JobRequirements>, ProtoError> {
        match self.payload.first() {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => serde_json::from_slice(raw)
                .map(Some)
                .map_err(|e| ProtoError::BadPayload(e.to_string())),
        }
    }
}

/// Decodes alternating key/value frames into submission content.
pub(crate) fn decode_content(frames: &[Bytes]) -> Result<SubmissionContent, ProtoError> {
    if frames.len() % 2 != 0 {
        return Err(ProtoError::BadPayload(
            "content frames are not key/value pairs".to_string(),
        ));
    }
    let mut content = SubmissionContent::new();
    for pair in frames.chunks_exact(2) {
        let key = std::str::from_utf8(&pair[0]).map_err(|_| ProtoError::BadUtf8)?;
        content.insert(key, pair[1].clone());
    }
    Ok(content)
}

/// Encodes submission content as alternating key/value frames.
pub(crate) fn encode_content(content: &SubmissionContent, frames: &mut Vec<Bytes>) {
    for (key, value) in content.iter() {
        frames.push(Bytes::from(key.clone()));
        frames.push(value.clone());
    }
}
