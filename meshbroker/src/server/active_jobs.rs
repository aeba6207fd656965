//! Jobs currently assigned to a worker.

use crate::proto::{JobId, JobProgress, JobResult, JobState, JobStatus, MeshIOType};
use crate::transport::SocketIdentity;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runtime state for one assigned job.
#[derive(Debug, Clone)]
pub struct ActiveJobRecord {
    pub assigned_worker: SocketIdentity,
    pub io_type: MeshIOType,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    /// Latest heartbeat observed from the assigned worker.
    pub last_heartbeat: Instant,
}

/// `JobId → ActiveJobRecord`, with a worker-keyed secondary index.
#[derive(Default)]
pub struct ActiveJobs {
    jobs: HashMap<JobId, ActiveJobRecord>,
    by_worker: HashMap<SocketIdentity, HashSet<JobId>>,
}

impl ActiveJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record in `InProgress` with empty progress.
    pub fn add(
        &mut self,
        worker: SocketIdentity,
        id: JobId,
        io_type: MeshIOType,
        now: Instant,
    ) {
        let status = JobStatus::in_progress(id.clone(), JobProgress::default());
        self.by_worker
            .entry(worker.clone())
            .or_default()
            .insert(id.clone());
        self.jobs.insert(
            id,
            ActiveJobRecord {
                assigned_worker: worker,
                io_type,
                status,
                result: None,
                last_heartbeat: now,
            },
        );
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    /// Merges a worker-reported status. Monotone: the chain
    /// `QUEUED → IN_PROGRESS → terminal` never regresses. Updates for
    /// unknown jobs are silently discarded.
    pub fn update_status(&mut self, update: &JobStatus) {
        match self.jobs.get_mut(&update.id) {
            Some(record) => record.status.merge(update),
            None => debug!(job = %update.id, "status update for unknown job discarded"),
        }
    }

    /// Attaches a result and drives the status to `Finished`.
    ///
    /// A result is only accepted while the job is `InProgress` or already
    /// `Finished`; results for failed or expired jobs are dropped.
    pub fn update_result(&mut self, result: JobResult) {
        let Some(record) = self.jobs.get_mut(&result.id) else {
            debug!(job = %result.id, "result for unknown job discarded");
            return;
        };
        match record.status.state {
            JobState::InProgress | JobState::Finished => {
                record.status.state = JobState::Finished;
                record.result = Some(result);
            }
            state => {
                warn!(job = %record.status.id, %state, "result for terminal job dropped");
            }
        }
    }

    pub fn have_result(&self, id: &JobId) -> bool {
        self.jobs
            .get(id)
            .is_some_and(|record| record.result.is_some())
    }

    pub fn result(&self, id: &JobId) -> Option<JobResult> {
        self.jobs.get(id)?.result.clone()
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        Some(self.jobs.get(id)?.status.clone())
    }

    pub fn worker_for(&self, id: &JobId) -> Option<SocketIdentity> {
        Some(self.jobs.get(id)?.assigned_worker.clone())
    }

    /// Bumps `last_heartbeat` on every record assigned to `worker`.
    pub fn refresh_jobs(&mut self, worker: &SocketIdentity, now: Instant) {
        let Some(ids) = self.by_worker.get(worker) else {
            return;
        };
        for id in ids {
            if let Some(record) = self.jobs.get_mut(id) {
                record.last_heartbeat = now;
            }
        }
    }

    /// Transitions every record whose heartbeat is older than `threshold`
    /// to the terminal `Expired` state. Returns the affected job ids.
    pub fn mark_failed_jobs(&mut self, now: Instant, threshold: Duration) -> Vec<JobId> {
        let mut expired = Vec::new();
        for (id, record) in &mut self.jobs {
            if record.status.state.is_terminal() {
                continue;
            }
            if now.saturating_duration_since(record.last_heartbeat) > threshold {
                record.status.state = JobState::Expired;
                expired.push(id.clone());
            }
        }
        for id in &expired {
            warn!(job = %id, "job expired: assigned worker stopped heartbeating");
        }
        expired
    }

    /// Expires every non-terminal job assigned to `worker` immediately
    /// (worker-announced shutdown or factory-reported abnormal exit).
    pub fn expire_worker(&mut self, worker: &SocketIdentity) {
        let Some(ids) = self.by_worker.get(worker) else {
            return;
        };
        for id in ids {
            if let Some(record) = self.jobs.get_mut(id) {
                if !record.status.state.is_terminal() {
                    record.status.state = JobState::Expired;
                    warn!(job = %id, worker = %worker, "job expired: worker departed");
                }
            }
        }
    }

    /// Marks one job `Failed` (client termination).
    pub fn mark_failed(&mut self, id: &JobId) {
        if let Some(record) = self.jobs.get_mut(id) {
            if !record.status.state.is_terminal() {
                record.status.state = JobState::Failed;
            }
        }
    }

    /// Drops a record after retrieval or termination.
    pub fn remove(&mut self, id: &JobId) -> Option<ActiveJobRecord> {
        let record = self.jobs.remove(id)?;
        debug!(job = %id, io_type = %record.io_type, "active job removed");
        if let Some(ids) = self.by_worker.get_mut(&record.assigned_worker) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_worker.remove(&record.assigned_worker);
            }
        }
        Some(record)
    }

    /// Every worker identity with at least one assigned job.
    pub fn workers(&self) -> Vec<SocketIdentity> {
        self.by_worker.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::MeshKind;

    fn io() -> MeshIOType {
        MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D)
    }

    fn identity(sequence: u64) -> SocketIdentity {
        SocketIdentity::from_sequence(sequence)
    }

    fn add_job(jobs: &mut ActiveJobs, worker: u64) -> JobId {
        let id = JobId::generate();
        jobs.add(identity(worker), id.clone(), io(), Instant::now());
        id
    }

    #[test]
    fn test_add_starts_in_progress() {
        let mut jobs = ActiveJobs::new();
        let id = add_job(&mut jobs, 1);
        let status = jobs.status(&id).unwrap();
        assert_eq!(status.state, JobState::InProgress);
        assert_eq!(status.progress.unwrap().value(), -1);
    }

    #[test]
    fn test_status_update_merges_progress() {
        let mut jobs = ActiveJobs::new();
        let id = add_job(&mut jobs, 1);
        jobs.update_status(&JobStatus::in_progress(id.clone(), JobProgress::new(50)));
        assert_eq!(jobs.status(&id).unwrap().progress.unwrap().value(), 50);
    }

    #[test]
    fn test_unknown_status_update_discarded() {
        let mut jobs = ActiveJobs::new();
        jobs.update_status(&JobStatus::new(JobId::generate(), JobState::InProgress));
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_result_drives_status_to_finished() {
        let mut jobs = ActiveJobs::new();
        let id = add_job(&mut jobs, 1);
        jobs.update_result(JobResult::new(id.clone(), &b"mesh bytes"[..]));

        assert_eq!(jobs.status(&id).unwrap().state, JobState::Finished);
        assert!(jobs.have_result(&id));
        assert_eq!(jobs.result(&id).unwrap().payload.as_ref(), b"mesh bytes");
    }

    #[test]
    fn test_result_for_expired_job_dropped() {
        let mut jobs = ActiveJobs::new();
        let id = add_job(&mut jobs, 1);
        jobs.mark_failed_jobs(Instant::now() + Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(jobs.status(&id).unwrap().state, JobState::Expired);

        jobs.update_result(JobResult::new(id.clone(), &b"too late"[..]));
        assert!(!jobs.have_result(&id));
        assert_eq!(jobs.status(&id).unwrap().state, JobState::Expired);
    }

    #[test]
    fn test_refresh_keeps_jobs_alive() {
        let mut jobs = ActiveJobs::new();
        let worker = identity(1);
        let id = add_job(&mut jobs, 1);

        let later = Instant::now() + Duration::from_secs(30);
        jobs.refresh_jobs(&worker, later);
        let expired = jobs.mark_failed_jobs(later + Duration::from_millis(100), Duration::from_secs(1));
        assert!(expired.is_empty());
        assert_eq!(jobs.status(&id).unwrap().state, JobState::InProgress);
    }

    #[test]
    fn test_expiry_hits_all_of_a_workers_jobs() {
        let mut jobs = ActiveJobs::new();
        let first = add_job(&mut jobs, 1);
        let second = add_job(&mut jobs, 1);
        let other = add_job(&mut jobs, 2);
        jobs.refresh_jobs(&identity(2), Instant::now() + Duration::from_secs(60));

        let expired =
            jobs.mark_failed_jobs(Instant::now() + Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(expired.len(), 2);
        assert!(expired.contains(&first) && expired.contains(&second));
        assert_eq!(jobs.status(&other).unwrap().state, JobState::InProgress);
    }

    #[test]
    fn test_remove_clears_secondary_index() {
        let mut jobs = ActiveJobs::new();
        let id = add_job(&mut jobs, 1);
        assert_eq!(jobs.workers(), vec![identity(1)]);

        let record = jobs.remove(&id).unwrap();
        assert_eq!(record.assigned_worker, identity(1));
        assert!(jobs.workers().is_empty());
        assert!(jobs.remove(&id).is_none());
    }
}
