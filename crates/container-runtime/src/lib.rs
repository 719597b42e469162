//! # Container Runtime
//!
//! Client primitives for the container runtime backing local
//! development environments.
//!
//! The orchestration layer coordinates containers it does not own the
//! implementation of; this crate defines the narrow seam it depends
//! on ([`ContainerRuntime`]) together with a Docker implementation
//! ([`DockerRuntime`]) and, behind the `test-utils` feature, a
//! hermetic in-memory implementation ([`memory::MemoryRuntime`]) for
//! tests that must not touch a real daemon.
//!
//! ## Example
//!
//! ```rust,no_run
//! use container_runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
//!
//! # async fn example() -> container_runtime::Result<()> {
//! let runtime = DockerRuntime::connect().await?;
//!
//! let spec = ContainerSpec::new("local-mysite-web", "nginx:alpine")
//!     .with_network("local_default");
//! runtime.create_container(&spec).await?;
//! runtime.start_container("local-mysite-web").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod client;
mod docker;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use client::{ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus};
pub use docker::DockerRuntime;

/// Kind of runtime resource an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A container.
    Container,
    /// A network.
    Network,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Container => write!(f, "container"),
            ResourceKind::Network => write!(f, "network"),
        }
    }
}

/// Error types for runtime operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The runtime daemon could not be reached. Fatal for the calling
    /// operation; never retried here.
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    /// A named resource does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource name.
        name: String,
    },

    /// Creation raced with another caller that got there first.
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// Resource kind.
        kind: ResourceKind,
        /// Resource name.
        name: String,
    },

    /// Any other runtime API failure.
    #[error("container runtime error: {0}")]
    Api(#[from] bollard::errors::Error),
}

impl Error {
    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether this error reports a creation race.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }
}

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
