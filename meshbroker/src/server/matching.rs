//! Pairing queued jobs with ready workers.
//!
//! Matching is two-phased. Phase one requests capacity: for each type with
//! never-offered jobs, check for a ready pool worker or ask the factory to
//! spawn one; either way the head job moves to the awaiting-worker bucket,
//! so the factory is asked at most once per queued job. Phase two performs
//! assignments: for each type with awaiting-worker jobs, hand the head job
//! to a ready worker if one exists. A worker that registered but has not
//! signalled ready is never assigned.

use crate::proto::Response;
use crate::server::core::Broker;
use std::time::Instant;
use tracing::info;

impl Broker {
    pub(crate) fn find_worker_for_queued_job(&mut self, now: Instant) {
        self.factory.update_worker_count();

        for io_type in self.queued_jobs.queued_job_types() {
            let worker_ready = self.worker_pool.have_waiting_worker(io_type)
                || self.factory.create_worker(io_type);
            if worker_ready {
                self.queued_jobs.worker_dispatched(io_type);
            }
            // Factory at cap or unsupported: the job stays queued and the
            // next iteration retries.
        }

        for io_type in self.queued_jobs.waiting_for_worker_types() {
            if !self.worker_pool.have_waiting_worker(io_type) {
                continue;
            }
            let Some(worker) = self.worker_pool.take_worker(io_type) else {
                continue;
            };
            let Some(job) = self.queued_jobs.take_job(io_type) else {
                // No job left for this type after all; the worker must
                // re-signal readiness, which it does by re-asking.
                continue;
            };

            info!(job = %job.id, worker = %worker, %io_type, "assigning job to worker");
            self.active_jobs
                .add(worker.clone(), job.id.clone(), io_type, now);
            self.send_to_worker(&worker, Response::JobAssignment(job));
        }
    }
}
