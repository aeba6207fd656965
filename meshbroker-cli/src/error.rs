//! CLI error handling with user-friendly messages.

use meshbroker::server::{BrokerError, FactoryError};
use meshbroker::worker::WorkerError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Bad command-line configuration
    Config(String),
    /// Broker setup failed (bind, polling rates)
    Broker(BrokerError),
    /// Worker descriptor directory could not be read
    Factory(FactoryError),
    /// Worker could not reach or talk to the broker
    Worker(WorkerError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {self}");

        if let CliError::Broker(BrokerError::Bind(_)) = self {
            eprintln!();
            eprintln!("Both endpoints must be bindable. Check that the hosts");
            eprintln!("resolve locally and that you may listen on the ports.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {msg}"),
            CliError::Config(msg) => write!(f, "Configuration error: {msg}"),
            CliError::Broker(e) => write!(f, "Failed to start broker: {e}"),
            CliError::Factory(e) => write!(f, "Failed to load worker descriptors: {e}"),
            CliError::Worker(e) => write!(f, "Worker error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Broker(e) => Some(e),
            CliError::Factory(e) => Some(e),
            CliError::Worker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BrokerError> for CliError {
    fn from(e: BrokerError) -> Self {
        CliError::Broker(e)
    }
}

impl From<FactoryError> for CliError {
    fn from(e: FactoryError) -> Self {
        CliError::Factory(e)
    }
}

impl From<WorkerError> for CliError {
    fn from(e: WorkerError) -> Self {
        CliError::Worker(e)
    }
}
