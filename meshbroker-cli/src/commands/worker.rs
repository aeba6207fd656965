//! The `worker` command: a simple echo worker.
//!
//! Registers one mesh-io-type, then loops: ask for a job, report a little
//! progress, and return the submission content as the result. Useful as a
//! factory spawn target and for exercising a broker end to end.

use crate::error::CliError;
use clap::Args;
use meshbroker::client::ServerConnection;
use meshbroker::proto::{
    JobProgress, JobRequirements, JobResult, JobStatus, MeshIOType,
};
use meshbroker::worker::Worker;
use tracing::info;

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Broker worker endpoint, `host:port`
    endpoint: String,

    /// Capability to advertise, e.g. `Mesh2D:Mesh3D`
    #[arg(long, default_value = "Mesh2D:Mesh3D")]
    io_type: String,

    /// Worker name reported in requirement descriptors
    #[arg(long, default_value = "BasicWorker")]
    name: String,

    /// Exit after this many jobs (runs forever when omitted)
    #[arg(long)]
    job_limit: Option<usize>,
}

pub async fn run(args: WorkerArgs) -> Result<(), CliError> {
    let io_type: MeshIOType = args
        .io_type
        .parse()
        .map_err(|e| CliError::Config(format!("bad --io-type: {e}")))?;
    let (host, port) = args
        .endpoint
        .rsplit_once(':')
        .and_then(|(host, port)| Some((host, port.parse::<u16>().ok()?)))
        .ok_or_else(|| CliError::Config(format!("bad endpoint '{}'", args.endpoint)))?;

    let server = ServerConnection::new(host, port);
    let worker = Worker::connect(&server, io_type, JobRequirements::new(&args.name)).await?;
    info!(name = %args.name, %io_type, endpoint = %args.endpoint, "worker connected");

    let mut completed = 0usize;
    loop {
        worker.ask_for_jobs(1)?;
        let Some(job) = worker.take_pending_job().await else {
            info!("broker shut down, exiting");
            return Ok(());
        };

        info!(job = %job.id, "job taken");
        worker.update_status(&JobStatus::in_progress(
            job.id.clone(),
            JobProgress::new(50),
        ))?;

        // Echo the submission content back, values concatenated in key order.
        let mut payload = Vec::new();
        for (_, value) in job.content.iter() {
            payload.extend_from_slice(value);
        }
        if worker.is_terminated(&job.id) {
            info!(job = %job.id, "job terminated before completion");
            continue;
        }
        worker.return_result(&JobResult::new(job.id.clone(), payload))?;
        info!(job = %job.id, "result returned");

        completed += 1;
        if args.job_limit.is_some_and(|limit| completed >= limit) {
            worker.announce_shutdown()?;
            return Ok(());
        }
    }
}
