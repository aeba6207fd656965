//! Meshbroker - dispatch brokering for distributed mesh generation
//!
//! Clients submit mesh-generation jobs to a central broker; workers
//! advertise what they can mesh and take jobs as they become ready. The
//! broker queues submissions, pairs them with capable workers (spawning
//! local worker processes through a factory when none are connected),
//! relays status and progress, and hands back final results.
//!
//! # High-Level API
//!
//! ```ignore
//! use meshbroker::server::{Broker, BrokerSettings, NullWorkerFactory, SignalHandling};
//!
//! let broker = Broker::bind(BrokerSettings::default(), Box::new(NullWorkerFactory)).await?;
//! let handle = broker.start(SignalHandling::Capture);
//! println!("brokering: {}", handle.ports());
//! handle.join().await;
//! ```
//!
//! The [`client`] and [`worker`] modules hold the peer SDKs; [`proto`]
//! defines the message taxonomy both sides share.

pub mod client;
pub mod logging;
pub mod proto;
pub mod server;
pub mod transport;
pub mod worker;

/// Version of the meshbroker library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
