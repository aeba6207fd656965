//! Worker-launching factories.
//!
//! The factory is an injected capability: the matching pass asks it to
//! spawn a local worker process when no pooled worker can take a queued
//! job. `create_worker` must not block — it forks and returns; the child
//! connects to the worker endpoint like any other peer and the usual
//! registration/heartbeat machinery takes over from there.

use crate::proto::{JobRequirements, JobRequirementsSet, MeshIOType, MeshKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Factory construction errors.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("failed to read worker descriptor directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad worker descriptor {path}: {reason}")]
    BadDescriptor { path: String, reason: String },
}

/// Admission control and process spawning for local workers.
pub trait WorkerFactory: Send {
    /// Whether this factory can produce a worker for `io_type`.
    fn have_support(&self, io_type: MeshIOType) -> bool;

    /// Requirement descriptors advertised for `io_type`.
    fn requirements(&self, io_type: MeshIOType) -> JobRequirementsSet;

    /// Attempts to spawn a worker for `io_type`. Returns false when the
    /// type is unsupported or the child cap is reached. Never blocks.
    fn create_worker(&mut self, io_type: MeshIOType) -> bool;

    /// Reaps exited children and refreshes the live count.
    fn update_worker_count(&mut self);

    /// Number of children currently believed alive.
    fn current_worker_count(&self) -> usize;

    /// Cap on concurrent children. Zero disables spawning entirely.
    fn max_worker_count(&self) -> usize;

    /// Injected after bind: the endpoint spawned workers should dial,
    /// appended to each child's command line.
    fn set_worker_endpoint(&mut self, endpoint: String);

    /// Kills every remaining child (broker shutdown).
    fn terminate_all(&mut self);
}

/// A factory that can launch nothing. The broker then serves only workers
/// that connect on their own.
#[derive(Debug, Default)]
pub struct NullWorkerFactory;

impl WorkerFactory for NullWorkerFactory {
    fn have_support(&self, _io_type: MeshIOType) -> bool {
        false
    }

    fn requirements(&self, _io_type: MeshIOType) -> JobRequirementsSet {
        JobRequirementsSet::new()
    }

    fn create_worker(&mut self, _io_type: MeshIOType) -> bool {
        false
    }

    fn update_worker_count(&mut self) {}

    fn current_worker_count(&self) -> usize {
        0
    }

    fn max_worker_count(&self) -> usize {
        0
    }

    fn set_worker_endpoint(&mut self, _endpoint: String) {}

    fn terminate_all(&mut self) {}
}

/// On-disk description of a launchable worker (`*.mbw`, JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub name: String,
    pub input_type: MeshKind,
    pub output_type: MeshKind,
    /// Executable to launch.
    pub command: String,
    /// Arguments placed before the broker endpoint.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Opaque requirements blob forwarded to clients.
    #[serde(default)]
    pub requirements: String,
}

impl WorkerDescriptor {
    pub fn io_type(&self) -> MeshIOType {
        MeshIOType::new(self.input_type, self.output_type)
    }

    fn job_requirements(&self) -> JobRequirements {
        JobRequirements::with_blob(self.name.clone(), self.requirements.clone())
    }
}

/// Extension worker descriptor files must carry.
pub const DESCRIPTOR_EXTENSION: &str = "mbw";

/// Default cap on concurrently spawned workers.
pub const DEFAULT_MAX_WORKER_COUNT: usize = 1;

/// The production factory: spawns worker processes described by `*.mbw`
/// files and reaps them as they exit.
pub struct ProcessWorkerFactory {
    descriptors: Vec<WorkerDescriptor>,
    max_worker_count: usize,
    worker_endpoint: Option<String>,
    children: Vec<(String, Child)>,
}

impl ProcessWorkerFactory {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            max_worker_count: DEFAULT_MAX_WORKER_COUNT,
            worker_endpoint: None,
            children: Vec::new(),
        }
    }

    /// Scans `dir` for descriptor files. Unparsable files are skipped with
    /// a warning; only directory I/O failures propagate.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, FactoryError> {
        let mut factory = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DESCRIPTOR_EXTENSION) {
                continue;
            }
            match std::fs::read(&path)
                .map_err(FactoryError::from)
                .and_then(|raw| {
                    serde_json::from_slice::<WorkerDescriptor>(&raw).map_err(|e| {
                        FactoryError::BadDescriptor {
                            path: path.display().to_string(),
                            reason: e.to_string(),
                        }
                    })
                }) {
                Ok(descriptor) => {
                    debug!(
                        worker = %descriptor.name,
                        io_type = %descriptor.io_type(),
                        "registered worker descriptor"
                    );
                    factory.descriptors.push(descriptor);
                }
                Err(e) => warn!(error = %e, "skipping worker descriptor"),
            }
        }
        Ok(factory)
    }

    pub fn add_descriptor(&mut self, descriptor: WorkerDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn set_max_worker_count(&mut self, max: usize) {
        self.max_worker_count = max;
    }

    fn descriptor_for(&self, io_type: MeshIOType) -> Option<&WorkerDescriptor> {
        self.descriptors.iter().find(|d| d.io_type() == io_type)
    }
}

impl Default for ProcessWorkerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerFactory for ProcessWorkerFactory {
    fn have_support(&self, io_type: MeshIOType) -> bool {
        self.descriptor_for(io_type).is_some()
    }

    fn requirements(&self, io_type: MeshIOType) -> JobRequirementsSet {
        self.descriptors
            .iter()
            .filter(|d| d.io_type() == io_type)
            .map(WorkerDescriptor::job_requirements)
            .collect()
    }

    fn create_worker(&mut self, io_type: MeshIOType) -> bool {
        if self.children.len() >= self.max_worker_count {
            return false;
        }
        let Some(descriptor) = self.descriptor_for(io_type) else {
            return false;
        };
        let Some(endpoint) = self.worker_endpoint.clone() else {
            warn!("factory asked to spawn before the worker endpoint was set");
            return false;
        };

        let mut command = Command::new(&descriptor.command);
        command
            .args(&descriptor.arguments)
            .arg(&endpoint)
            .kill_on_drop(true);
        match command.spawn() {
            Ok(child) => {
                info!(worker = %descriptor.name, %io_type, "spawned worker process");
                self.children.push((descriptor.name.clone(), child));
                true
            }
            Err(e) => {
                warn!(worker = %descriptor.name, error = %e, "worker spawn failed");
                false
            }
        }
    }

    fn update_worker_count(&mut self) {
        self.children.retain_mut(|(name, child)| match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if status.success() {
                    debug!(worker = %name, "worker process exited");
                } else {
                    warn!(worker = %name, %status, "worker process exited abnormally");
                }
                false
            }
            Err(e) => {
                warn!(worker = %name, error = %e, "failed to poll worker process");
                false
            }
        });
    }

    fn current_worker_count(&self) -> usize {
        self.children.len()
    }

    fn max_worker_count(&self) -> usize {
        self.max_worker_count
    }

    fn set_worker_endpoint(&mut self, endpoint: String) {
        self.worker_endpoint = Some(endpoint);
    }

    fn terminate_all(&mut self) {
        for (name, child) in &mut self.children {
            debug!(worker = %name, "terminating worker process");
            if let Err(e) = child.start_kill() {
                warn!(worker = %name, error = %e, "failed to kill worker process");
            }
        }
        self.children.clear();
    }
}
