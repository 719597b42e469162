//! # Project Orchestration
//!
//! Lifecycle orchestration for local, multi-container development
//! environments. A project is one uniquely named environment with a
//! fixed set of service containers (at minimum `web` and `db`) sharing
//! one network with every other local project.
//!
//! The orchestrator never caches lifecycle state: the container
//! runtime is the single source of truth, and every phase computation
//! goes back to it. Start, stop and down are convergent "apply desired
//! state" operations, so repeating them is always safe.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use container_runtime::DockerRuntime;
//! use project_orchestration::ProjectOrchestrator;
//!
//! # async fn example() -> Result<(), project_orchestration::Error> {
//! let runtime = Arc::new(DockerRuntime::connect().await?);
//! let orchestrator = ProjectOrchestrator::init(runtime, "/home/me/mysite").await?;
//!
//! orchestrator.start().await?;
//! orchestrator.wait(Duration::from_secs(60)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod compose;
mod import;
mod inspector;
mod network;
mod orchestrator;
mod project;

pub use compose::ComposeController;
pub use container_runtime::ContainerState;
pub use import::ImportPipeline;
pub use inspector::ContainerInspector;
pub use network::{NetworkManager, SHARED_NETWORK};
pub use orchestrator::ProjectOrchestrator;
pub use project::{Phase, Project, ProjectConfig, ServiceDefinition};

/// Error types for orchestration operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The project cannot be initialized (missing directory, unreadable
    /// configuration).
    #[error("project configuration error: {0}")]
    Config(String),

    /// Container runtime errors, including an unreachable daemon.
    #[error("container runtime error: {0}")]
    Runtime(#[from] container_runtime::Error),

    /// A runtime operation failed for one specific service.
    #[error("service {service}: {source}")]
    Service {
        /// Role of the failing service.
        service: String,
        /// The underlying runtime error.
        #[source]
        source: container_runtime::Error,
    },

    /// A named container does not exist where a state check expected
    /// it to.
    #[error("unable to find container {name}")]
    ContainerMissing {
        /// Container name that was looked up.
        name: String,
    },

    /// A named container exists but is in an unexpected state.
    #[error("container {name} returned {actual}, expected {expected}")]
    StateMismatch {
        /// Container name.
        name: String,
        /// State the runtime reported.
        actual: ContainerState,
        /// State the caller expected.
        expected: ContainerState,
    },

    /// Wait's polling budget ran out before every service was running.
    #[error("timed out waiting for services to run: {}", .unready.join(", "))]
    WaitTimeout {
        /// Services that never reached `running`.
        unready: Vec<String>,
    },

    /// An import was attempted against a service that is not running.
    #[error("{operation} requires {service} to be running")]
    PreconditionFailed {
        /// Operation that was attempted.
        operation: String,
        /// Container the precondition was checked on.
        service: String,
    },

    /// Archive extraction or load failed. The target data is left in
    /// an undefined state; no rollback is performed.
    #[error("{target} import failed, contents left in an undefined state: {source}")]
    Import {
        /// What was being imported into (`database` or `files`).
        target: String,
        /// The extraction failure.
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;
