//! Runtime client trait and the types it speaks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::Result;

/// Lifecycle state reported by the runtime for a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// In the middle of a restart.
    Restarting,
    /// Running.
    Running,
    /// Paused.
    Paused,
    /// Stopped after running.
    Exited,
    /// Unkillable or otherwise defunct.
    Dead,
    /// A state string this client does not recognize.
    Unknown(String),
}

impl ContainerState {
    /// Parse the runtime's state string.
    pub fn parse(s: &str) -> Self {
        match s {
            "created" => ContainerState::Created,
            "restarting" => ContainerState::Restarting,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            other => ContainerState::Unknown(other.to_string()),
        }
    }

    /// The runtime's string form of this state.
    pub fn as_str(&self) -> &str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Restarting => "restarting",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown(s) => s,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the runtime needs to create a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Container name, unique within the runtime.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Labels to attach.
    pub labels: HashMap<String, String>,
    /// Network to join, if any.
    pub network: Option<String>,
    /// Volume binds as `host:container` strings.
    pub binds: Vec<String>,
    /// Hostname inside the container network.
    pub hostname: Option<String>,
}

impl ContainerSpec {
    /// Create a spec for `name` running `image`.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Attach the container to a network.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Add a volume bind.
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.binds.push(bind.into());
        self
    }

    /// Set the container hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

/// A container as reported by the runtime's list operation.
#[derive(Debug, Clone)]
pub struct ContainerStatus {
    /// Runtime-assigned container ID.
    pub id: String,
    /// Names as reported by the runtime. Docker prefixes each with `/`.
    pub names: Vec<String>,
    /// Current lifecycle state.
    pub state: ContainerState,
}

/// Primitive operations the orchestration layer requires from a
/// container runtime.
///
/// Implementations report exact runtime facts; idempotency is the
/// caller's concern. The one exception is stopping an already-stopped
/// container, which the runtime itself treats as "desired state
/// already holds" and implementations surface as success.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Verify the runtime is reachable.
    async fn ping(&self) -> Result<()>;

    /// List all containers, including stopped ones.
    async fn list_containers(&self) -> Result<Vec<ContainerStatus>>;

    /// List the names of all networks.
    async fn list_networks(&self) -> Result<Vec<String>>;

    /// Create a network. Fails with `AlreadyExists` if another caller
    /// created it first.
    async fn create_network(&self, name: &str) -> Result<()>;

    /// Create a container from `spec`, returning its ID. The container
    /// is not started.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a container by name.
    async fn start_container(&self, name: &str) -> Result<()>;

    /// Stop a container by name. Stopping a stopped container succeeds.
    async fn stop_container(&self, name: &str) -> Result<()>;

    /// Force-remove a container by name.
    async fn remove_container(&self, name: &str) -> Result<()>;
}
