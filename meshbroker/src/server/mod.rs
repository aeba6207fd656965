//! The broker core.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Dispatch Loop                       │
//! │  poll endpoints → route message → heartbeats →           │
//! │  expire silent workers → match queued jobs to workers    │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ┌────────────┐  ┌────────────┐  ┌──────┐  │
//! │  │ JobQueue │  │ WorkerPool │  │ ActiveJobs │  │ Mon. │  │
//! │  └──────────┘  └────────────┘  └────────────┘  └──────┘  │
//! ├──────────────────────────────────────────────────────────┤
//! │     client endpoint              worker endpoint         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A job lives in exactly one of `JobQueue`, `ActiveJobs`, or nowhere.
//! Workers move from `WorkerPool` to an `ActiveJobs` assignment at
//! dispatch and return only through a fresh registration.

mod active_jobs;
mod client_requests;
mod config;
mod core;
mod factory;
mod job_queue;
mod lifecycle;
mod matching;
mod monitor;
mod ports;
mod worker_pool;
mod worker_requests;

pub use config::{
    BrokerSettings, ConfigError, PollingRates, SignalHandling, DEFAULT_CLIENT_PORT,
    DEFAULT_MAX_RATE_MS, DEFAULT_MIN_RATE_MS, DEFAULT_WORKER_PORT,
};
pub use core::{Broker, BrokerError};
pub use factory::{
    FactoryError, NullWorkerFactory, ProcessWorkerFactory, WorkerDescriptor, WorkerFactory,
    DEFAULT_MAX_WORKER_COUNT, DESCRIPTOR_EXTENSION,
};
pub use lifecycle::BrokerHandle;
pub use ports::ServerPorts;
