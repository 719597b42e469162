//! Shared-network management.

use std::sync::Arc;
use tracing::{debug, info};

use container_runtime::ContainerRuntime;

use crate::Result;

/// Name of the network every local project shares.
pub const SHARED_NETWORK: &str = "local_default";

/// Idempotently ensures the shared network exists.
///
/// The network's lifetime is process-external: it is created on first
/// use by whichever project gets there first and never deleted by any
/// single project.
pub struct NetworkManager {
    runtime: Arc<dyn ContainerRuntime>,
}

impl NetworkManager {
    /// Create a manager over `runtime`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Ensure `name` exists, creating it if absent.
    ///
    /// Safe under concurrent callers: losing the creation race is
    /// success, because the network now exists either way. Only a
    /// genuinely unrecoverable runtime error propagates.
    pub async fn ensure_network(&self, name: &str) -> Result<()> {
        let networks = self.runtime.list_networks().await?;
        if networks.iter().any(|n| n == name) {
            debug!(network = %name, "Network already present");
            return Ok(());
        }

        match self.runtime.create_network(name).await {
            Ok(()) => {
                info!(network = %name, "Created shared network");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(network = %name, "Network created concurrently");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use container_runtime::memory::MemoryRuntime;

    #[tokio::test]
    async fn test_ensure_network_is_idempotent() {
        let runtime = Arc::new(MemoryRuntime::new());
        let manager = NetworkManager::new(runtime.clone());

        manager.ensure_network(SHARED_NETWORK).await.unwrap();
        manager.ensure_network(SHARED_NETWORK).await.unwrap();

        assert_eq!(runtime.network_create_count(), 1);
    }

    /// Runtime whose network listing is always stale, so `ensure`
    /// proceeds to create and loses the race.
    struct StaleListing(MemoryRuntime);

    #[async_trait::async_trait]
    impl container_runtime::ContainerRuntime for StaleListing {
        async fn ping(&self) -> container_runtime::Result<()> {
            self.0.ping().await
        }
        async fn list_containers(
            &self,
        ) -> container_runtime::Result<Vec<container_runtime::ContainerStatus>> {
            self.0.list_containers().await
        }
        async fn list_networks(&self) -> container_runtime::Result<Vec<String>> {
            Ok(vec![])
        }
        async fn create_network(&self, name: &str) -> container_runtime::Result<()> {
            self.0.create_network(name).await
        }
        async fn create_container(
            &self,
            spec: &container_runtime::ContainerSpec,
        ) -> container_runtime::Result<String> {
            self.0.create_container(spec).await
        }
        async fn start_container(&self, name: &str) -> container_runtime::Result<()> {
            self.0.start_container(name).await
        }
        async fn stop_container(&self, name: &str) -> container_runtime::Result<()> {
            self.0.stop_container(name).await
        }
        async fn remove_container(&self, name: &str) -> container_runtime::Result<()> {
            self.0.remove_container(name).await
        }
    }

    #[tokio::test]
    async fn test_ensure_network_swallows_creation_race() {
        let runtime = Arc::new(StaleListing(MemoryRuntime::new()));
        // Another caller already created the network, but our listing
        // never shows it: creation collides and must still succeed.
        runtime.0.create_network(SHARED_NETWORK).await.unwrap();

        let manager = NetworkManager::new(runtime.clone());
        manager.ensure_network(SHARED_NETWORK).await.unwrap();

        assert_eq!(runtime.0.network_create_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_creates_once() {
        let runtime = Arc::new(MemoryRuntime::new());
        let a = NetworkManager::new(runtime.clone());
        let b = NetworkManager::new(runtime.clone());

        let (ra, rb) = tokio::join!(
            a.ensure_network(SHARED_NETWORK),
            b.ensure_network(SHARED_NETWORK)
        );
        ra.unwrap();
        rb.unwrap();

        assert_eq!(runtime.network_create_count(), 1);
    }
}
