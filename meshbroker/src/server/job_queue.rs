//! Submitted-but-unassigned jobs.
//!
//! Jobs sit in one of two per-type FIFOs. `awaiting_dispatch` holds jobs
//! that have never been offered to the factory; `awaiting_worker` holds
//! jobs for which a worker has been requested but not yet assigned. FIFO
//! order is preserved within a mesh-io-type; ordering across types follows
//! the type ordering and carries no guarantee.

use crate::proto::{Job, JobId, MeshIOType};
use std::collections::{BTreeMap, VecDeque};

#[derive(Default)]
pub struct JobQueue {
    awaiting_dispatch: BTreeMap<MeshIOType, VecDeque<Job>>,
    awaiting_worker: BTreeMap<MeshIOType, VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job to the dispatch FIFO for its type.
    ///
    /// Support validation happens at submission time in the client handler;
    /// the queue itself accepts any job.
    pub fn add_job(&mut self, job: Job) {
        self.awaiting_dispatch
            .entry(job.io_type)
            .or_default()
            .push_back(job);
    }

    /// Types with jobs that have never been offered to the factory.
    /// Stable (sorted) iteration order.
    pub fn queued_job_types(&self) -> Vec<MeshIOType> {
        self.awaiting_dispatch
            .iter()
            .filter(|(_, fifo)| !fifo.is_empty())
            .map(|(io_type, _)| *io_type)
            .collect()
    }

    /// Types with jobs waiting for a requested worker to materialize.
    pub fn waiting_for_worker_types(&self) -> Vec<MeshIOType> {
        self.awaiting_worker
            .iter()
            .filter(|(_, fifo)| !fifo.is_empty())
            .map(|(io_type, _)| *io_type)
            .collect()
    }

    /// Moves the FIFO-head job of `io_type` from awaiting-dispatch to
    /// awaiting-worker.
    pub fn worker_dispatched(&mut self, io_type: MeshIOType) {
        let Some(fifo) = self.awaiting_dispatch.get_mut(&io_type) else {
            return;
        };
        if let Some(job) = fifo.pop_front() {
            self.awaiting_worker
                .entry(io_type)
                .or_default()
                .push_back(job);
        }
    }

    /// Pops the FIFO-head job of `io_type` from awaiting-worker.
    pub fn take_job(&mut self, io_type: MeshIOType) -> Option<Job> {
        self.awaiting_worker.get_mut(&io_type)?.pop_front()
    }

    /// Membership in either bucket.
    pub fn contains(&self, id: &JobId) -> bool {
        self.bucket_of(id).is_some()
    }

    /// Removes a job from whichever bucket holds it (client termination).
    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        for buckets in [&mut self.awaiting_dispatch, &mut self.awaiting_worker] {
            for fifo in buckets.values_mut() {
                if let Some(index) = fifo.iter().position(|job| job.id == *id) {
                    return fifo.remove(index);
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.awaiting_dispatch.values().all(VecDeque::is_empty)
            && self.awaiting_worker.values().all(VecDeque::is_empty)
    }

    fn bucket_of(&self, id: &JobId) -> Option<&Job> {
        self.awaiting_dispatch
            .values()
            .chain(self.awaiting_worker.values())
            .flatten()
            .find(|job| job.id == *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{JobRequirements, JobSubmission, MeshKind};

    fn io() -> MeshIOType {
        MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D)
    }

    fn other_io() -> MeshIOType {
        MeshIOType::new(MeshKind::Edges, MeshKind::Mesh2D)
    }

    fn job(io_type: MeshIOType) -> Job {
        Job::new(
            JobId::generate(),
            JobSubmission::new(io_type, JobRequirements::new("TestWorker")),
        )
    }

    #[test]
    fn test_add_and_contains() {
        let mut queue = JobQueue::new();
        let j = job(io());
        let id = j.id.clone();
        queue.add_job(j);
        assert!(queue.contains(&id));
        assert!(!queue.contains(&JobId::generate()));
        assert_eq!(queue.queued_job_types(), vec![io()]);
        assert!(queue.waiting_for_worker_types().is_empty());
    }

    #[test]
    fn test_dispatch_moves_between_buckets() {
        let mut queue = JobQueue::new();
        let j = job(io());
        let id = j.id.clone();
        queue.add_job(j);

        queue.worker_dispatched(io());
        assert!(queue.queued_job_types().is_empty());
        assert_eq!(queue.waiting_for_worker_types(), vec![io()]);
        assert!(queue.contains(&id)); // still resident, different bucket

        let taken = queue.take_job(io()).unwrap();
        assert_eq!(taken.id, id);
        assert!(!queue.contains(&id));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order_per_type() {
        let mut queue = JobQueue::new();
        let first = job(io());
        let second = job(io());
        let ids = (first.id.clone(), second.id.clone());
        queue.add_job(first);
        queue.add_job(second);

        queue.worker_dispatched(io());
        queue.worker_dispatched(io());
        assert_eq!(queue.take_job(io()).unwrap().id, ids.0);
        assert_eq!(queue.take_job(io()).unwrap().id, ids.1);
    }

    #[test]
    fn test_types_tracked_independently() {
        let mut queue = JobQueue::new();
        queue.add_job(job(io()));
        queue.add_job(job(other_io()));

        queue.worker_dispatched(io());
        assert_eq!(queue.queued_job_types(), vec![other_io()]);
        assert_eq!(queue.waiting_for_worker_types(), vec![io()]);
    }

    #[test]
    fn test_take_from_empty_type() {
        let mut queue = JobQueue::new();
        assert!(queue.take_job(io()).is_none());
        queue.worker_dispatched(io()); // no-op
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_from_either_bucket() {
        let mut queue = JobQueue::new();
        let queued = job(io());
        let waiting = job(io());
        let (queued_id, waiting_id) = (queued.id.clone(), waiting.id.clone());
        queue.add_job(waiting);
        queue.add_job(queued);
        queue.worker_dispatched(io()); // moves `waiting`

        assert!(queue.remove(&waiting_id).is_some());
        assert!(queue.remove(&queued_id).is_some());
        assert!(queue.remove(&queued_id).is_none());
        assert!(queue.is_empty());
    }
}
