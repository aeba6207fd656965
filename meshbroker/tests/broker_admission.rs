//! Admission control, termination, and port fallback at the broker level.

use meshbroker::client::{Client, ClientError, ServerConnection};
use meshbroker::proto::{
    JobProgress, JobRequirements, JobState, JobStatus, JobSubmission, MeshIOType, MeshKind,
};
use meshbroker::server::{
    Broker, BrokerSettings, NullWorkerFactory, PollingRates, SignalHandling,
};
use meshbroker::worker::Worker;
use std::time::Duration;

fn settings() -> BrokerSettings {
    BrokerSettings {
        polling: PollingRates::new(50, 2000).unwrap(),
        ..BrokerSettings::ephemeral()
    }
}

#[tokio::test]
async fn test_unsupported_type_is_rejected() {
    let broker = Broker::bind(settings(), Box::new(NullWorkerFactory))
        .await
        .unwrap();
    let handle = broker.start(SignalHandling::None);
    let io_type = MeshIOType::new(MeshKind::Edges, MeshKind::Mesh2D);

    let mut client = Client::connect(&ServerConnection::for_clients(handle.ports()))
        .await
        .unwrap();

    // No factory support and no registered worker.
    assert!(!client.can_mesh(io_type).await.unwrap());
    assert!(client
        .retrieve_requirements(io_type)
        .await
        .unwrap()
        .is_empty());

    let submission = JobSubmission::new(io_type, JobRequirements::new("NoSuchWorker"));
    match client.submit_job(&submission).await {
        Err(ClientError::Rejected) => {}
        other => panic!("submission should be rejected, got {other:?}"),
    }

    handle.stop_and_join().await;
}

#[tokio::test]
async fn test_status_query_for_unknown_job() {
    let broker = Broker::bind(settings(), Box::new(NullWorkerFactory))
        .await
        .unwrap();
    let handle = broker.start(SignalHandling::None);

    let mut client = Client::connect(&ServerConnection::for_clients(handle.ports()))
        .await
        .unwrap();
    let ticket = meshbroker::client::JobTicket {
        id: meshbroker::proto::JobId::generate(),
        io_type: MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D),
    };

    let status = client.job_status(&ticket).await.unwrap();
    assert_eq!(status.state, JobState::Invalid);

    let result = client.retrieve_results(&ticket).await.unwrap();
    assert!(!result.valid());
    assert!(result.payload.is_empty());

    handle.stop_and_join().await;
}

#[tokio::test]
async fn test_terminate_queued_and_active_jobs() {
    let broker = Broker::bind(settings(), Box::new(NullWorkerFactory))
        .await
        .unwrap();
    let handle = broker.start(SignalHandling::None);
    let io_type = MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D);

    let worker = Worker::connect(
        &ServerConnection::for_workers(handle.ports()),
        io_type,
        JobRequirements::new("Terminable"),
    )
    .await
    .unwrap();
    // Registered but NOT ready: submitted jobs stay queued.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let mut client = Client::connect(&ServerConnection::for_clients(handle.ports()))
        .await
        .unwrap();
    let queued = client
        .submit_job(&JobSubmission::new(io_type, JobRequirements::new("Terminable")))
        .await
        .unwrap();

    // Terminating a queued job removes it outright.
    let status = client.terminate_job(&queued).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    let status = client.job_status(&queued).await.unwrap();
    assert_eq!(status.state, JobState::Invalid);

    // Now let the worker take a job and terminate it mid-flight.
    worker.ask_for_jobs(1).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let active = client
        .submit_job(&JobSubmission::new(io_type, JobRequirements::new("Terminable")))
        .await
        .unwrap();
    let job = tokio::time::timeout(Duration::from_secs(2), worker.take_pending_job())
        .await
        .expect("assignment never arrived")
        .unwrap();
    worker
        .update_status(&JobStatus::in_progress(job.id.clone(), JobProgress::new(10)))
        .unwrap();

    let status = client.terminate_job(&active).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    let status = client.job_status(&active).await.unwrap();
    assert_eq!(status.state, JobState::Failed);

    // The worker hears about the termination out of band.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !worker.is_terminated(&job.id) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker never notified of termination"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    handle.stop_and_join().await;
}

#[tokio::test]
async fn test_port_conflict_falls_back_to_ephemeral() {
    let first = Broker::bind(settings(), Box::new(NullWorkerFactory))
        .await
        .unwrap();
    let first_ports = first.server_port_info().clone();
    let first_handle = first.start(SignalHandling::None);

    // Same preferred ports: the second broker must bind elsewhere.
    let conflicting = BrokerSettings {
        client_port: first_ports.client_port,
        worker_port: first_ports.worker_port,
        ..settings()
    };
    let second = Broker::bind(conflicting, Box::new(NullWorkerFactory))
        .await
        .unwrap();
    let second_ports = second.server_port_info().clone();
    assert_ne!(second_ports.client_port, first_ports.client_port);
    assert_ne!(second_ports.worker_port, first_ports.worker_port);
    let second_handle = second.start(SignalHandling::None);

    // Both brokers answer independently.
    let io_type = MeshIOType::new(MeshKind::Mesh2D, MeshKind::Mesh3D);
    let mut first_client = Client::connect(&ServerConnection::for_clients(&first_ports))
        .await
        .unwrap();
    let mut second_client = Client::connect(&ServerConnection::for_clients(&second_ports))
        .await
        .unwrap();

    let worker = Worker::connect(
        &ServerConnection::for_workers(&first_ports),
        io_type,
        JobRequirements::new("OnlyOnFirst"),
    )
    .await
    .unwrap();
    worker.ask_for_jobs(1).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(first_client.can_mesh(io_type).await.unwrap());
    assert!(!second_client.can_mesh(io_type).await.unwrap());

    first_handle.stop_and_join().await;
    second_handle.stop_and_join().await;
}

#[tokio::test]
async fn test_worker_shutdown_notification() {
    let broker = Broker::bind(settings(), Box::new(NullWorkerFactory))
        .await
        .unwrap();
    let handle = broker.start(SignalHandling::None);
    let io_type = MeshIOType::new(MeshKind::Model, MeshKind::Mesh3DSurface);

    let worker = Worker::connect(
        &ServerConnection::for_workers(handle.ports()),
        io_type,
        JobRequirements::new("Waiting"),
    )
    .await
    .unwrap();
    worker.ask_for_jobs(1).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    handle.stop_and_join().await;

    // The pooled worker was told the broker is going away.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !worker.broker_is_gone() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker never saw the shutdown notice"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(tokio::time::timeout(Duration::from_secs(1), worker.take_pending_job())
        .await
        .unwrap()
        .is_none());
}
