//! Jobs, submissions, and worker requirements.

use crate::proto::mesh_types::MeshIOType;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Globally unique job identifier, assigned by the broker at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(uuid::Uuid);

impl JobId {
    /// A fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parses the hyphenated form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// What a worker needs in order to accept a job: the worker's name plus an
/// opaque requirements blob the broker never interprets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobRequirements {
    pub worker_name: String,
    #[serde(default)]
    pub requirements: String,
}

impl JobRequirements {
    pub fn new(worker_name: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
            requirements: String::new(),
        }
    }

    pub fn with_blob(worker_name: impl Into<String>, requirements: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
            requirements: requirements.into(),
        }
    }
}

/// The requirement descriptors advertised for one mesh-io-type.
///
/// Deduplicated by worker name; iteration order is stable (sorted) so reply
/// payloads are deterministic.
pub type JobRequirementsSet = std::collections::BTreeSet<JobRequirements>;

/// The payload a client attaches to a submission: string keys mapped to
/// opaque byte blobs. An empty submission is valid.
///
/// A `BTreeMap` keeps wire encoding deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionContent(BTreeMap<String, Bytes>);

impl SubmissionContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bytes)> {
        self.0.iter()
    }
}

/// A client's request to have a mesh generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub io_type: MeshIOType,
    pub requirements: JobRequirements,
    pub content: SubmissionContent,
}

impl JobSubmission {
    pub fn new(io_type: MeshIOType, requirements: JobRequirements) -> Self {
        Self {
            io_type,
            requirements,
            content: SubmissionContent::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bytes>) -> &mut Self {
        self.content.insert(key, value);
        self
    }
}

/// A submitted job as held by the broker and delivered to a worker.
/// Immutable after creation.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub io_type: MeshIOType,
    pub requirements: JobRequirements,
    pub content: SubmissionContent,
}

impl Job {
    pub fn new(id: JobId, submission: JobSubmission) -> Self {
        Self {
            id,
            io_type: submission.io_type,
            requirements: submission.requirements,
            content: submission.content,
        }
    }
}

/// The serde view of a job assignment's header frame. Content travels as
/// raw key/value frames, not JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHeader {
    pub id: JobId,
    pub io_type: MeshIOType,
    pub requirements: JobRequirements,
}

impl From<&Job> for JobHeader {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            io_type: job.io_type,
            requirements: job.requirements.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::mesh_types::MeshKind;

    #[test]
    fn test_job_id_unique_and_parsable() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(JobId::parse(&a.to_string()), Some(a));
        assert_eq!(JobId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_requirements_set_dedupes_by_value() {
        let mut set = JobRequirementsSet::new();
        set.insert(JobRequirements::new("BasicWorker"));
        set.insert(JobRequirements::new("BasicWorker"));
        set.insert(JobRequirements::new("OtherWorker"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_submission_is_valid() {
        let io = MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D);
        let sub = JobSubmission::new(io, JobRequirements::new("BasicWorker"));
        assert!(sub.content.is_empty());
    }

    #[test]
    fn test_job_header_json_round_trip() {
        let io = MeshIOType::new(MeshKind::Edges, MeshKind::Mesh2D);
        let mut sub = JobSubmission::new(io, JobRequirements::new("EdgeWorker"));
        sub.insert("data", &b"payload"[..]);
        let job = Job::new(JobId::generate(), sub);

        let header = JobHeader::from(&job);
        let json = serde_json::to_vec(&header).unwrap();
        let parsed: JobHeader = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed.id, job.id);
        assert_eq!(parsed.io_type, job.io_type);
        assert_eq!(parsed.requirements, job.requirements);
    }
}
