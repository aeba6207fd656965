//! Final job results.

use crate::proto::job::JobId;
use bytes::Bytes;

/// The bytes a worker produced for a finished job.
///
/// An empty payload with `valid() == false` is what a client receives when
/// it retrieves a job that never stored a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub id: JobId,
    pub payload: Bytes,
    valid: bool,
}

impl JobResult {
    pub fn new(id: JobId, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
            valid: true,
        }
    }

    /// The empty result returned for jobs without a stored payload.
    pub fn invalid(id: JobId) -> Self {
        Self {
            id,
            payload: Bytes::new(),
            valid: false,
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_validity() {
        let id = JobId::generate();
        assert!(JobResult::new(id.clone(), &b"mesh"[..]).valid());
        let empty = JobResult::invalid(id);
        assert!(!empty.valid());
        assert!(empty.payload.is_empty());
    }
}
