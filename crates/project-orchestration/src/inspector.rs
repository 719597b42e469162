//! Read-only container existence and state checks.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use container_runtime::{ContainerRuntime, ContainerState};

use crate::{Error, Result};

/// Queries the runtime for named containers and reports their
/// lifecycle state. Stateless and read-only; both the orchestrator's
/// wait loop and external verification go through this single path.
pub struct ContainerInspector {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerInspector {
    /// Create an inspector over `runtime`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Determine whether `name` exists and matches `expected`.
    ///
    /// Absent containers yield [`Error::ContainerMissing`]; a present
    /// container in another state yields [`Error::StateMismatch`]
    /// carrying both states for diagnostics.
    pub async fn check(&self, name: &str, expected: ContainerState) -> Result<()> {
        match self.observe(name).await? {
            None => Err(Error::ContainerMissing {
                name: name.to_string(),
            }),
            Some(actual) if actual != expected => Err(Error::StateMismatch {
                name: name.to_string(),
                actual,
                expected,
            }),
            Some(_) => Ok(()),
        }
    }

    /// Observe the current state of `name`, or `None` if absent.
    pub async fn observe(&self, name: &str) -> Result<Option<ContainerState>> {
        Ok(self.observe_all().await?.remove(name))
    }

    /// Observe every container the runtime knows about, keyed by name
    /// with the runtime's leading separator stripped. One runtime
    /// round-trip, including stopped containers.
    pub async fn observe_all(&self) -> Result<HashMap<String, ContainerState>> {
        let containers = self.runtime.list_containers().await?;
        debug!(count = containers.len(), "Listed containers");

        let mut observed = HashMap::new();
        for container in containers {
            for raw in &container.names {
                let name = raw.strip_prefix('/').unwrap_or(raw);
                observed.insert(name.to_string(), container.state.clone());
            }
        }
        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use container_runtime::{ContainerSpec, memory::MemoryRuntime};

    async fn runtime_with(name: &str, running: bool) -> Arc<MemoryRuntime> {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime
            .create_container(&ContainerSpec::new(name, "nginx:alpine"))
            .await
            .unwrap();
        runtime.start_container(name).await.unwrap();
        if !running {
            runtime.stop_container(name).await.unwrap();
        }
        runtime
    }

    #[tokio::test]
    async fn test_check_matching_state() {
        let runtime = runtime_with("local-site1-web", true).await;
        let inspector = ContainerInspector::new(runtime);

        inspector
            .check("local-site1-web", ContainerState::Running)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_check_strips_leading_separator() {
        // MemoryRuntime reports "/local-site1-web" the way Docker does;
        // the lookup must still match the bare name.
        let runtime = runtime_with("local-site1-web", true).await;
        let inspector = ContainerInspector::new(runtime);

        let state = inspector.observe("local-site1-web").await.unwrap();
        assert_eq!(state, Some(ContainerState::Running));
    }

    #[tokio::test]
    async fn test_check_wrong_state() {
        let runtime = runtime_with("local-site1-db", false).await;
        let inspector = ContainerInspector::new(runtime);

        let err = inspector
            .check("local-site1-db", ContainerState::Running)
            .await
            .unwrap_err();

        match err {
            Error::StateMismatch {
                name,
                actual,
                expected,
            } => {
                assert_eq!(name, "local-site1-db");
                assert_eq!(actual, ContainerState::Exited);
                assert_eq!(expected, ContainerState::Running);
            }
            other => panic!("expected StateMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_missing_container() {
        let runtime = Arc::new(MemoryRuntime::new());
        let inspector = ContainerInspector::new(runtime);

        let err = inspector
            .check("local-site1-web", ContainerState::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContainerMissing { .. }));
    }
}
