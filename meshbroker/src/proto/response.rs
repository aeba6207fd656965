//! Outbound reply composition and SDK-side reply parsing.
//!
//! Replies are a closed set of shapes, one `Response` variant per shape,
//! each with explicit frame serialization. The recipient identity is not
//! part of the reply; the transport addresses frames separately.

use crate::proto::job::{Job, JobHeader, JobId, JobRequirementsSet};
use crate::proto::message::{decode_content, encode_content, ProtoError};
use crate::proto::result::JobResult;
use crate::proto::service::{ReplyKind, PROTOCOL_HEADER};
use crate::proto::status::JobStatus;
use bytes::Bytes;

/// Every reply the broker can send: `[header] [kind] [payload…]`.
#[derive(Debug, Clone)]
pub enum Response {
    /// A freshly assigned job id (reply to `MAKE_MESH`).
    JobId(JobId),
    /// A status report (reply to `MESH_STATUS` / `TERMINATE_JOB`).
    Status(JobStatus),
    /// A stored (or empty) result (reply to `RETRIEVE_MESH`).
    Result(JobResult),
    /// Requirement descriptors for one mesh-io-type.
    Requirements(JobRequirementsSet),
    /// A yes/no answer (reply to `CAN_MESH` / `CAN_MESH_REQUIREMENTS`).
    Bool(bool),
    /// A job assignment delivered to a worker.
    JobAssignment(Job),
    /// Out-of-band job termination sent to the assigned worker.
    Terminate(JobId),
    /// Broker shutdown notification sent to every known worker.
    Shutdown,
    /// Sentinel for malformed or unsupported requests.
    InvalidMessage,
    /// Sentinel for queries about unknown jobs.
    InvalidStatus,
}

impl Response {
    pub fn kind(&self) -> ReplyKind {
        match self {
            Response::JobId(_) => ReplyKind::JobId,
            Response::Status(_) => ReplyKind::Status,
            Response::Result(_) => ReplyKind::Result,
            Response::Requirements(_) => ReplyKind::Requirements,
            Response::Bool(_) => ReplyKind::Bool,
            Response::JobAssignment(_) => ReplyKind::Job,
            Response::Terminate(_) => ReplyKind::Terminate,
            Response::Shutdown => ReplyKind::Shutdown,
            Response::InvalidMessage => ReplyKind::InvalidMessage,
            Response::InvalidStatus => ReplyKind::InvalidStatus,
        }
    }

    /// Serializes this reply into wire frames.
    pub fn into_frames(self) -> Vec<Bytes> {
        let mut frames = vec![
            Bytes::from_static(PROTOCOL_HEADER),
            Bytes::from(self.kind().tag()),
        ];
        match self {
            Response::JobId(id) => frames.push(Bytes::from(id.to_string())),
            Response::Status(status) => frames.push(json_frame(&status)),
            Response::Result(result) => {
                frames.push(Bytes::from(result.id.to_string()));
                frames.push(Bytes::from(if result.valid() { "1" } else { "0" }));
                frames.push(result.payload);
            }
            Response::Requirements(set) => frames.push(json_frame(&set)),
            Response::Bool(value) => {
                frames.push(Bytes::from(if value { "true" } else { "false" }))
            }
            Response::JobAssignment(job) => {
                frames.push(json_frame(&JobHeader::from(&job)));
                encode_content(&job.content, &mut frames);
            }
            Response::Terminate(id) => frames.push(Bytes::from(id.to_string())),
            Response::Shutdown | Response::InvalidMessage | Response::InvalidStatus => {}
        }
        frames
    }

    /// Parses reply frames on the SDK side.
    pub fn parse(frames: &[Bytes]) -> Result<Self, ProtoError> {
        if frames.first().map(|f| f.as_ref()) != Some(PROTOCOL_HEADER) {
            return Err(ProtoError::BadHeader);
        }
        let kind_frame = frames.get(1).ok_or(ProtoError::MissingFrame(1))?;
        let kind = std::str::from_utf8(kind_frame)
            .map_err(|_| ProtoError::BadUtf8)?
            .parse::<ReplyKind>()
            .map_err(|_| ProtoError::BadPayload("unknown reply kind".to_string()))?;
        let payload = &frames[2..];

        match kind {
            ReplyKind::JobId => Ok(Response::JobId(parse_id(payload, 0)?)),
            ReplyKind::Status => {
                let status: JobStatus = json_parse(payload, 0)?;
                Ok(Response::Status(status))
            }
            ReplyKind::Result => {
                let id = parse_id(payload, 0)?;
                let valid = payload.get(1).ok_or(ProtoError::MissingFrame(3))?;
                let data = payload.get(2).ok_or(ProtoError::MissingFrame(4))?.clone();
                if valid.as_ref() == b"1" {
                    Ok(Response::Result(JobResult::new(id, data)))
                } else {
                    Ok(Response::Result(JobResult::invalid(id)))
                }
            }
            ReplyKind::Requirements => {
                let set: JobRequirementsSet = json_parse(payload, 0)?;
                Ok(Response::Requirements(set))
            }
            ReplyKind::Bool => {
                let raw = payload.first().ok_or(ProtoError::MissingFrame(2))?;
                if raw.as_ref() == b"true" {
                    Ok(Response::Bool(true))
                } else if raw.as_ref() == b"false" {
                    Ok(Response::Bool(false))
                } else {
                    Err(ProtoError::BadPayload("bad bool frame".to_string()))
                }
            }
            ReplyKind::Job => {
                let header: JobHeader = json_parse(payload, 0)?;
                let content = decode_content(&payload[1..])?;
                Ok(Response::JobAssignment(Job {
                    id: header.id,
                    io_type: header.io_type,
                    requirements: header.requirements,
                    content,
                }))
            }
            ReplyKind::Terminate => Ok(Response::Terminate(parse_id(payload, 0)?)),
            ReplyKind::Shutdown => Ok(Response::Shutdown),
            ReplyKind::InvalidMessage => Ok(Response::InvalidMessage),
            ReplyKind::InvalidStatus => Ok(Response::InvalidStatus),
        }
    }
}

fn json_frame<T: serde::Serialize>(value: &T) -> Bytes {
    // The payload types above serialize infallibly (no maps with non-string
    // keys, no non-finite floats).
    Bytes::from(serde_json::to_vec(value).expect("reply serialization"))
}

fn json_parse<T: serde::de::DeserializeOwned>(
    frames: &[Bytes],
    index: usize,
) -> Result<T, ProtoError> {
    let raw = frames.get(index).ok_or(ProtoError::MissingFrame(index + 2))?;
    serde_json::from_slice(raw).map_err(|e| ProtoError::BadPayload(e.to_string()))
}

fn parse_id(frames: &[Bytes], index: usize) -> Result<JobId, ProtoError> {
    let raw = frames.get(index).ok_or(ProtoError::MissingFrame(index + 2))?;
    let text = std::str::from_utf8(raw).map_err(|_| ProtoError::BadUtf8)?;
    JobId::parse(text).ok_or_else(|| ProtoError::BadPayload(format!("bad job id '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::job::{JobRequirements, JobSubmission};
    use crate::proto::mesh_types::{MeshIOType, MeshKind};
    use crate::proto::status::{JobProgress, JobState};

    fn round_trip(response: Response) -> Response {
        let frames = response.into_frames();
        Response::parse(&frames).unwrap()
    }

    #[test]
    fn test_job_id_reply() {
        let id = JobId::generate();
        match round_trip(Response::JobId(id.clone())) {
            Response::JobId(parsed) => assert_eq!(parsed, id),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_status_reply_keeps_progress() {
        let status = JobStatus::in_progress(JobId::generate(), JobProgress::new(50));
        match round_trip(Response::Status(status.clone())) {
            Response::Status(parsed) => assert_eq!(parsed, status),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_result_reply_carries_exact_bytes() {
        let id = JobId::generate();
        let payload = vec![0x4du8; 4096];
        match round_trip(Response::Result(JobResult::new(id.clone(), payload.clone()))) {
            Response::Result(parsed) => {
                assert!(parsed.valid());
                assert_eq!(parsed.id, id);
                assert_eq!(parsed.payload.as_ref(), payload.as_slice());
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_invalid_result_reply() {
        let id = JobId::generate();
        match round_trip(Response::Result(JobResult::invalid(id))) {
            Response::Result(parsed) => {
                assert!(!parsed.valid());
                assert!(parsed.payload.is_empty());
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_assignment_reply_round_trip() {
        let io = MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D);
        let mut sub = JobSubmission::new(io, JobRequirements::new("BasicWorker"));
        sub.insert("extra_stuff", &b"random data"[..]);
        let job = Job::new(JobId::generate(), sub);

        match round_trip(Response::JobAssignment(job.clone())) {
            Response::JobAssignment(parsed) => {
                assert_eq!(parsed.id, job.id);
                assert_eq!(parsed.content, job.content);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_sentinels_have_no_payload() {
        assert_eq!(Response::InvalidMessage.into_frames().len(), 2);
        assert_eq!(Response::Shutdown.into_frames().len(), 2);
        assert!(matches!(
            round_trip(Response::InvalidStatus),
            Response::InvalidStatus
        ));
    }

    #[test]
    fn test_status_state_wire_names() {
        let status = JobStatus::new(JobId::generate(), JobState::Queued);
        let frames = Response::Status(status).into_frames();
        let json = std::str::from_utf8(&frames[2]).unwrap();
        assert!(json.contains("Queued"));
    }
}
