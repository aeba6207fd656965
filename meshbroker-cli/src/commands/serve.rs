//! The `serve` command: run a broker until interrupted.

use crate::error::CliError;
use clap::Args;
use meshbroker::server::{
    Broker, BrokerSettings, NullWorkerFactory, PollingRates, ProcessWorkerFactory, SignalHandling,
    WorkerFactory, DEFAULT_CLIENT_PORT, DEFAULT_MAX_RATE_MS, DEFAULT_MIN_RATE_MS,
    DEFAULT_WORKER_PORT,
};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host to bind both endpoints to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Preferred client port (falls back to an ephemeral port on conflict)
    #[arg(long, default_value_t = DEFAULT_CLIENT_PORT)]
    client_port: u16,

    /// Preferred worker port (falls back to an ephemeral port on conflict)
    #[arg(long, default_value_t = DEFAULT_WORKER_PORT)]
    worker_port: u16,

    /// Host name handed to factory-spawned workers
    #[arg(long, default_value = "127.0.0.1")]
    external_host: String,

    /// Floor of the polling interval, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MIN_RATE_MS)]
    min_rate: u64,

    /// Ceiling of the polling interval, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_RATE_MS)]
    max_rate: u64,

    /// Directory of worker descriptor (*.mbw) files; omit to disable the factory
    #[arg(long)]
    worker_dir: Option<PathBuf>,

    /// Cap on concurrently spawned worker processes
    #[arg(long, default_value_t = meshbroker::server::DEFAULT_MAX_WORKER_COUNT)]
    max_workers: usize,
}

pub async fn run(args: ServeArgs) -> Result<(), CliError> {
    let polling = PollingRates::new(args.min_rate, args.max_rate)
        .map_err(|e| CliError::Config(e.to_string()))?;

    let factory: Box<dyn WorkerFactory> = match &args.worker_dir {
        Some(dir) => {
            let mut factory = ProcessWorkerFactory::from_directory(dir)?;
            factory.set_max_worker_count(args.max_workers);
            Box::new(factory)
        }
        None => Box::new(NullWorkerFactory),
    };

    let settings = BrokerSettings {
        client_host: args.host.clone(),
        client_port: args.client_port,
        worker_host: args.host,
        worker_port: args.worker_port,
        external_worker_host: args.external_host,
        polling,
    };

    let broker = Broker::bind(settings, factory).await?;
    let handle = broker.start(SignalHandling::Capture);
    println!("meshbroker {}: {}", meshbroker::VERSION, handle.ports());

    handle.join().await;
    Ok(())
}
