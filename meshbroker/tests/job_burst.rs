//! A burst of same-type jobs against a single slow worker.
//!
//! Eighteen jobs go in back to back; every one must come back with a
//! distinct id, be assigned in submission order, and return its own
//! payload byte-exact.

use meshbroker::client::{Client, ServerConnection};
use meshbroker::proto::{
    JobId, JobRequirements, JobResult, JobState, JobSubmission, MeshIOType, MeshKind,
};
use meshbroker::server::{
    Broker, BrokerSettings, NullWorkerFactory, PollingRates, SignalHandling,
};
use meshbroker::worker::Worker;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const JOB_COUNT: usize = 18;

#[tokio::test]
async fn test_eighteen_job_burst() {
    let settings = BrokerSettings {
        polling: PollingRates::new(20, 2000).unwrap(),
        ..BrokerSettings::ephemeral()
    };
    let broker = Broker::bind(settings, Box::new(NullWorkerFactory))
        .await
        .unwrap();
    let handle = broker.start(SignalHandling::None);
    let io_type = MeshIOType::new(MeshKind::Edges, MeshKind::Mesh2D);

    // One slow worker: takes jobs one at a time, echoes the payload back
    // after a short delay, and records the order it saw the jobs in.
    let worker = Worker::connect(
        &ServerConnection::for_workers(handle.ports()),
        io_type,
        JobRequirements::new("BasicWorker"),
    )
    .await
    .unwrap();
    let seen_order: Arc<Mutex<Vec<JobId>>> = Arc::new(Mutex::new(Vec::new()));
    let worker_order = Arc::clone(&seen_order);
    let worker_task = tokio::spawn(async move {
        loop {
            worker.ask_for_jobs(1).unwrap();
            let Some(job) = worker.take_pending_job().await else {
                return;
            };
            worker_order.lock().unwrap().push(job.id.clone());
            tokio::time::sleep(Duration::from_millis(20)).await;

            let mut payload = Vec::new();
            for (_, value) in job.content.iter() {
                payload.extend_from_slice(value);
            }
            worker.return_result(&JobResult::new(job.id, payload)).unwrap();
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut client = Client::connect(&ServerConnection::for_clients(handle.ports()))
        .await
        .unwrap();

    // Submit the burst.
    let mut tickets = Vec::with_capacity(JOB_COUNT);
    for index in 0..JOB_COUNT {
        let mut submission = JobSubmission::new(io_type, JobRequirements::new("BasicWorker"));
        submission.insert("data", format!("payload for job number {index}").into_bytes());
        tickets.push(client.submit_job(&submission).await.unwrap());
    }

    // All ids are distinct.
    let ids: HashSet<_> = tickets.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids.len(), JOB_COUNT);

    // Wait for every job to finish, then retrieve in submission order.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    for ticket in &tickets {
        loop {
            let status = client.job_status(ticket).await.unwrap();
            match status.state {
                JobState::Finished => break,
                JobState::Queued | JobState::InProgress => {
                    assert!(
                        tokio::time::Instant::now() < deadline,
                        "burst did not finish in time"
                    );
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                other => panic!("job {} ended in {other:?}", ticket.id),
            }
        }
    }

    for (index, ticket) in tickets.iter().enumerate() {
        let result = client.retrieve_results(ticket).await.unwrap();
        assert!(result.valid());
        assert_eq!(
            result.payload.as_ref(),
            format!("payload for job number {index}").as_bytes(),
            "result payload mismatch for job {index}"
        );
    }

    // FIFO per type: the worker saw the jobs in submission order.
    let observed = seen_order.lock().unwrap().clone();
    let submitted: Vec<JobId> = tickets.iter().map(|t| t.id.clone()).collect();
    assert_eq!(observed, submitted);

    handle.stop_and_join().await;
    worker_task.abort();
}
