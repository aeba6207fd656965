//! Registered workers that are not currently running a job.

use crate::proto::{JobRequirements, JobRequirementsSet, MeshIOType};
use crate::server::monitor::SocketMonitor;
use crate::transport::SocketIdentity;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// One registered worker.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub io_type: MeshIOType,
    /// Descriptor the worker advertised at registration, if any.
    pub requirements: Option<JobRequirements>,
    /// Set when the worker asks for work; required before assignment.
    pub ready_for_work: bool,
    pub last_heartbeat: Instant,
}

/// `SocketIdentity → WorkerRecord`.
///
/// A worker leaves the pool when it is assigned a job (`take_worker`) and
/// re-enters only through a fresh registration.
#[derive(Default)]
pub struct WorkerPool {
    workers: HashMap<SocketIdentity, WorkerRecord>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a registration. Resets `ready_for_work`.
    pub fn add_worker(
        &mut self,
        identity: SocketIdentity,
        io_type: MeshIOType,
        requirements: Option<JobRequirements>,
        now: Instant,
    ) {
        self.workers.insert(
            identity,
            WorkerRecord {
                io_type,
                requirements,
                ready_for_work: false,
                last_heartbeat: now,
            },
        );
    }

    pub fn have_worker(&self, identity: &SocketIdentity) -> bool {
        self.workers.contains_key(identity)
    }

    /// Marks a registered worker as ready for assignment.
    pub fn ready_for_work(&mut self, identity: &SocketIdentity) {
        if let Some(record) = self.workers.get_mut(identity) {
            record.ready_for_work = true;
        }
    }

    /// True iff some worker of `io_type` has signalled ready.
    pub fn have_waiting_worker(&self, io_type: MeshIOType) -> bool {
        self.workers
            .values()
            .any(|record| record.io_type == io_type && record.ready_for_work)
    }

    /// True iff any worker of `io_type` is registered, ready or not.
    pub fn has_any_of_type(&self, io_type: MeshIOType) -> bool {
        self.workers.values().any(|record| record.io_type == io_type)
    }

    /// Removes and returns one ready worker of `io_type`.
    ///
    /// Ties break on the oldest heartbeat, so the longest-idle worker goes
    /// first and newly arrived workers are not starved.
    pub fn take_worker(&mut self, io_type: MeshIOType) -> Option<SocketIdentity> {
        let identity = self
            .workers
            .iter()
            .filter(|(_, record)| record.io_type == io_type && record.ready_for_work)
            .min_by_key(|(_, record)| record.last_heartbeat)
            .map(|(identity, _)| identity.clone())?;
        self.workers.remove(&identity);
        Some(identity)
    }

    /// Updates `last_heartbeat` if the identity is pooled; no-op otherwise.
    pub fn refresh_worker(&mut self, identity: &SocketIdentity, now: Instant) {
        if let Some(record) = self.workers.get_mut(identity) {
            record.last_heartbeat = now;
        }
    }

    /// Removes workers the monitor considers expired; returns their
    /// identities so the caller can drop related bookkeeping.
    pub fn purge_dead_workers(
        &mut self,
        now: Instant,
        monitor: &SocketMonitor,
    ) -> Vec<SocketIdentity> {
        let dead: Vec<SocketIdentity> = self
            .workers
            .keys()
            .filter(|identity| monitor.is_expired(identity, now))
            .cloned()
            .collect();
        for identity in &dead {
            debug!(worker = %identity, "purging dead worker");
            self.workers.remove(identity);
        }
        dead
    }

    /// Removes a single worker (worker-announced shutdown).
    pub fn remove(&mut self, identity: &SocketIdentity) -> Option<WorkerRecord> {
        self.workers.remove(identity)
    }

    /// Descriptors advertised by registered workers of `io_type`.
    pub fn registered_requirements(&self, io_type: MeshIOType) -> JobRequirementsSet {
        self.workers
            .values()
            .filter(|record| record.io_type == io_type)
            .filter_map(|record| record.requirements.clone())
            .collect()
    }

    /// Every pooled identity (shutdown notification fan-out).
    pub fn identities(&self) -> Vec<SocketIdentity> {
        self.workers.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::MeshKind;
    use crate::server::config::PollingRates;
    use std::time::Duration;

    fn io() -> MeshIOType {
        MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D)
    }

    fn identity(sequence: u64) -> SocketIdentity {
        SocketIdentity::from_sequence(sequence)
    }

    #[test]
    fn test_registration_is_not_readiness() {
        let mut pool = WorkerPool::new();
        pool.add_worker(identity(1), io(), None, Instant::now());

        assert!(pool.has_any_of_type(io()));
        assert!(!pool.have_waiting_worker(io()));
        assert!(pool.take_worker(io()).is_none());

        pool.ready_for_work(&identity(1));
        assert!(pool.have_waiting_worker(io()));
    }

    #[test]
    fn test_reregistration_resets_readiness() {
        let mut pool = WorkerPool::new();
        let now = Instant::now();
        pool.add_worker(identity(1), io(), None, now);
        pool.ready_for_work(&identity(1));
        pool.add_worker(identity(1), io(), None, now);
        assert!(!pool.have_waiting_worker(io()));
    }

    #[test]
    fn test_take_worker_removes_from_pool() {
        let mut pool = WorkerPool::new();
        pool.add_worker(identity(1), io(), None, Instant::now());
        pool.ready_for_work(&identity(1));

        assert_eq!(pool.take_worker(io()), Some(identity(1)));
        assert!(pool.is_empty());
        assert!(pool.take_worker(io()).is_none());
    }

    #[test]
    fn test_take_worker_prefers_oldest_heartbeat() {
        let mut pool = WorkerPool::new();
        let old = Instant::now();
        let new = old + Duration::from_secs(5);
        pool.add_worker(identity(1), io(), None, new);
        pool.add_worker(identity(2), io(), None, old);
        pool.ready_for_work(&identity(1));
        pool.ready_for_work(&identity(2));

        assert_eq!(pool.take_worker(io()), Some(identity(2)));
        assert_eq!(pool.take_worker(io()), Some(identity(1)));
    }

    #[test]
    fn test_take_worker_respects_type() {
        let mut pool = WorkerPool::new();
        pool.add_worker(identity(1), io(), None, Instant::now());
        pool.ready_for_work(&identity(1));

        let other = MeshIOType::new(MeshKind::Edges, MeshKind::Mesh2D);
        assert!(pool.take_worker(other).is_none());
        assert_eq!(pool.take_worker(io()), Some(identity(1)));
    }

    #[test]
    fn test_purge_dead_workers() {
        let mut pool = WorkerPool::new();
        let mut monitor = SocketMonitor::new(PollingRates::new(10, 20).unwrap());
        let start = Instant::now();

        pool.add_worker(identity(1), io(), None, start);
        pool.add_worker(identity(2), io(), None, start);
        monitor.heartbeat(&identity(1), start);
        monitor.heartbeat(&identity(2), start + Duration::from_millis(100));

        let later = start + Duration::from_millis(90); // threshold is 40ms
        let dead = pool.purge_dead_workers(later, &monitor);
        assert_eq!(dead, vec![identity(1)]);
        assert!(pool.have_worker(&identity(2)));
    }

    #[test]
    fn test_registered_requirements_by_type() {
        let mut pool = WorkerPool::new();
        let now = Instant::now();
        pool.add_worker(
            identity(1),
            io(),
            Some(JobRequirements::new("SimpleWorker")),
            now,
        );
        pool.add_worker(identity(2), io(), None, now);

        let set = pool.registered_requirements(io());
        assert_eq!(set.len(), 1);
        assert!(set.iter().any(|r| r.worker_name == "SimpleWorker"));
    }
}
