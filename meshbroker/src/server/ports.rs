//! Bound endpoint reporting.

use std::fmt;

/// The addresses a broker actually bound to.
///
/// Multiple brokers can run on one machine; preferred ports fall back to
/// ephemeral ones on conflict, so peers must read the real ports from here
/// rather than assuming the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPorts {
    pub client_host: String,
    pub client_port: u16,
    pub worker_host: String,
    pub worker_port: u16,
}

impl ServerPorts {
    /// `host:port` for the client endpoint.
    pub fn client_endpoint(&self) -> String {
        format!("{}:{}", self.client_host, self.client_port)
    }

    /// `host:port` for the worker endpoint.
    pub fn worker_endpoint(&self) -> String {
        format!("{}:{}", self.worker_host, self.worker_port)
    }
}

impl fmt::Display for ServerPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clients on {}, workers on {}",
            self.client_endpoint(),
            self.worker_endpoint()
        )
    }
}
