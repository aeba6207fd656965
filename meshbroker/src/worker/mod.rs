//! Worker SDK: advertise a capability, take jobs, report back.
//!
//! A `Worker` registers its mesh-io-type on connect and then drives a
//! background I/O task that owns the connection. The task multiplexes
//! outbound traffic (readiness signals, status, results, heartbeats) with
//! inbound broker frames (assignments, terminations, shutdown). Pending
//! assignments accumulate in a queue the caller drains with
//! [`Worker::take_pending_job`].

use crate::client::ServerConnection;
use crate::proto::{
    Job, JobId, JobRequirements, JobResult, JobStatus, Message, MeshIOType, ProtoError, Response,
    ServiceTag,
};
use crate::transport::{Connection, TransportError};
use bytes::Bytes;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

/// Period of the automatic heartbeat.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

/// Worker-side failures.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("connection to broker lost")]
    Disconnected,
}

/// Shared state between the caller and the I/O task.
#[derive(Default)]
struct Inbox {
    pending: Mutex<VecDeque<Job>>,
    terminated: Mutex<HashSet<JobId>>,
    shutdown: AtomicBool,
}

/// A connection to a broker's worker endpoint.
pub struct Worker {
    io_type: MeshIOType,
    outbound: mpsc::UnboundedSender<Vec<Bytes>>,
    inbox: Arc<Inbox>,
    wakeup: Arc<Notify>,
    io_task: tokio::task::JoinHandle<()>,
}

impl Worker {
    /// Connects, registers the capability, and starts heartbeating at the
    /// default period.
    pub async fn connect(
        server: &ServerConnection,
        io_type: MeshIOType,
        requirements: JobRequirements,
    ) -> Result<Self, WorkerError> {
        Self::connect_with_heartbeat(server, io_type, requirements, HEARTBEAT_PERIOD).await
    }

    /// Connects with an explicit heartbeat period. Short-lived brokers with
    /// tight polling ceilings need faster heartbeats than the default.
    pub async fn connect_with_heartbeat(
        server: &ServerConnection,
        io_type: MeshIOType,
        requirements: JobRequirements,
        heartbeat_period: Duration,
    ) -> Result<Self, WorkerError> {
        let mut connection = Connection::connect(server.endpoint()).await?;

        let registration = Message::compose(
            ServiceTag::CanMesh,
            io_type,
            vec![json_frame(&requirements)?],
        );
        connection.send(registration).await?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let inbox = Arc::new(Inbox::default());
        let wakeup = Arc::new(Notify::new());
        let io_task = tokio::spawn(io_loop(
            connection,
            io_type,
            heartbeat_period,
            outbound_rx,
            Arc::clone(&inbox),
            Arc::clone(&wakeup),
        ));

        Ok(Self {
            io_type,
            outbound: outbound_tx,
            inbox,
            wakeup,
            io_task,
        })
    }

    pub fn io_type(&self) -> MeshIOType {
        self.io_type
    }

    /// Signals readiness for `count` jobs. Each signal lets the broker
    /// assign one job to this worker.
    pub fn ask_for_jobs(&self, count: usize) -> Result<(), WorkerError> {
        for _ in 0..count {
            self.send(Message::compose(ServiceTag::MakeMesh, self.io_type, vec![]))?;
        }
        Ok(())
    }

    /// Number of assignments waiting to be taken.
    pub fn pending_job_count(&self) -> usize {
        self.inbox.pending.lock().expect("pending lock").len()
    }

    /// Takes the next assignment without waiting.
    pub fn try_take_pending_job(&self) -> Option<Job> {
        let mut pending = self.inbox.pending.lock().expect("pending lock");
        let terminated = self.inbox.terminated.lock().expect("terminated lock");
        while let Some(job) = pending.pop_front() {
            if terminated.contains(&job.id) {
                debug!(job = %job.id, "skipping terminated assignment");
                continue;
            }
            return Some(job);
        }
        None
    }

    /// Waits for the next assignment. Returns `None` once the broker has
    /// shut down and the queue is drained.
    pub async fn take_pending_job(&self) -> Option<Job> {
        loop {
            // Arm the waiter before checking the queue so a notification
            // arriving in between is not lost.
            let notified = self.wakeup.notified();
            if let Some(job) = self.try_take_pending_job() {
                return Some(job);
            }
            if self.inbox.shutdown.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Whether the broker has terminated `id` since it was assigned.
    pub fn is_terminated(&self, id: &JobId) -> bool {
        self.inbox
            .terminated
            .lock()
            .expect("terminated lock")
            .contains(id)
    }

    /// Whether the broker has announced shutdown.
    pub fn broker_is_gone(&self) -> bool {
        self.inbox.shutdown.load(Ordering::Acquire)
    }

    /// Reports progress for an assigned job.
    pub fn update_status(&self, status: &JobStatus) -> Result<(), WorkerError> {
        let payload = vec![json_frame(status)?];
        self.send(Message::compose(ServiceTag::MeshStatus, self.io_type, payload))
    }

    /// Delivers the final result for an assigned job.
    pub fn return_result(&self, result: &JobResult) -> Result<(), WorkerError> {
        let payload = vec![
            Bytes::from(result.id.to_string()),
            result.payload.clone(),
        ];
        self.send(Message::compose(ServiceTag::RetrieveMesh, self.io_type, payload))
    }

    /// Sends an explicit heartbeat. Rarely needed: the I/O task already
    /// heartbeats on a timer, and every other message counts too.
    pub fn send_heartbeat(&self) -> Result<(), WorkerError> {
        self.send(Message::compose(ServiceTag::Heartbeat, self.io_type, vec![]))
    }

    /// Tells the broker this worker is going away for good.
    pub fn announce_shutdown(&self) -> Result<(), WorkerError> {
        self.send(Message::compose(ServiceTag::Shutdown, self.io_type, vec![]))
    }

    fn send(&self, frames: Vec<Bytes>) -> Result<(), WorkerError> {
        self.outbound
            .send(frames)
            .map_err(|_| WorkerError::Disconnected)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.io_task.abort();
    }
}

async fn io_loop(
    mut connection: Connection,
    io_type: MeshIOType,
    heartbeat_period: Duration,
    mut outbound: mpsc::UnboundedReceiver<Vec<Bytes>>,
    inbox: Arc<Inbox>,
    wakeup: Arc<Notify>,
) {
    let mut heartbeat = tokio::time::interval(heartbeat_period);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(frames) = queued else { break };
                if let Err(e) = connection.send(frames).await {
                    warn!(error = %e, "worker send failed");
                    break;
                }
            }

            inbound = connection.recv() => {
                match inbound {
                    Ok(frames) => handle_broker_frames(&frames, &inbox, &wakeup),
                    Err(e) => {
                        debug!(error = %e, "broker connection closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                let frames = Message::compose(ServiceTag::Heartbeat, io_type, vec![]);
                if let Err(e) = connection.send(frames).await {
                    warn!(error = %e, "heartbeat failed");
                    break;
                }
            }
        }

        if inbox.shutdown.load(Ordering::Acquire) {
            break;
        }
    }

    inbox.shutdown.store(true, Ordering::Release);
    wakeup.notify_waiters();
}

fn handle_broker_frames(frames: &[Bytes], inbox: &Inbox, wakeup: &Notify) {
    match Response::parse(frames) {
        Ok(Response::JobAssignment(job)) => {
            debug!(job = %job.id, "assignment received");
            inbox.pending.lock().expect("pending lock").push_back(job);
            wakeup.notify_waiters();
        }
        Ok(Response::Terminate(id)) => {
            debug!(job = %id, "termination received");
            inbox
                .terminated
                .lock()
                .expect("terminated lock")
                .insert(id);
            wakeup.notify_waiters();
        }
        Ok(Response::Shutdown) => {
            debug!("broker announced shutdown");
            inbox.shutdown.store(true, Ordering::Release);
            wakeup.notify_waiters();
        }
        Ok(Response::InvalidMessage) => {
            warn!("broker rejected a message from this worker");
        }
        Ok(other) => {
            debug!(kind = ?other.kind(), "ignoring unexpected broker frame");
        }
        Err(e) => {
            warn!(error = %e, "unparsable broker frame dropped");
        }
    }
}

fn json_frame<T: serde::Serialize>(value: &T) -> Result<Bytes, WorkerError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| WorkerError::Proto(ProtoError::BadPayload(e.to_string())))
}
