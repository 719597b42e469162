//! Compose-level container mutation: up, stop, down.

use std::sync::Arc;
use tracing::{debug, info};

use container_runtime::{ContainerRuntime, ContainerSpec, ContainerState};

use crate::inspector::ContainerInspector;
use crate::network::SHARED_NETWORK;
use crate::project::Project;
use crate::{Error, Result};

/// Owns the per-project compose specification on disk and converges
/// the project's containers toward it.
///
/// All three operations are idempotent: invoking them when the desired
/// state already holds is a no-op success. The shared network is never
/// touched here.
pub struct ComposeController {
    runtime: Arc<dyn ContainerRuntime>,
    inspector: ContainerInspector,
}

impl ComposeController {
    /// Create a controller over `runtime`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        let inspector = ContainerInspector::new(runtime.clone());
        Self { runtime, inspector }
    }

    /// Create and start every declared service.
    ///
    /// Requires the compose artifact to exist; rendering it is the
    /// project model's job. Running containers are left alone, stopped
    /// ones are started, absent ones are created and started. A
    /// failure names the service it happened on.
    pub async fn up(&self, project: &Project) -> Result<()> {
        let compose = project.compose_path();
        if !compose.is_file() {
            return Err(Error::Config(format!(
                "compose artifact missing: {}",
                compose.display()
            )));
        }

        let observed = self.inspector.observe_all().await?;

        for service in &project.services {
            let name = project.container_name(&service.role);

            match observed.get(&name) {
                Some(ContainerState::Running) => {
                    debug!(container = %name, "Already running");
                }
                Some(state) => {
                    debug!(container = %name, state = %state, "Starting existing container");
                    self.runtime
                        .start_container(&name)
                        .await
                        .map_err(|e| service_error(&service.role, e))?;
                }
                None => {
                    let mut spec = ContainerSpec::new(&name, &service.image)
                        .with_network(SHARED_NETWORK)
                        .with_hostname(&service.role);
                    for (key, value) in &service.env {
                        spec = spec.with_env(key, value);
                    }
                    for bind in project.binds_for(service) {
                        spec = spec.with_bind(bind);
                    }
                    spec.labels = project.labels_for(&service.role);

                    match self.runtime.create_container(&spec).await {
                        Ok(_) => {}
                        // Another invocation created it between our
                        // listing and now; starting it converges.
                        Err(e) if e.is_already_exists() => {
                            debug!(container = %name, "Container created concurrently");
                        }
                        Err(e) => return Err(service_error(&service.role, e)),
                    }
                    self.runtime
                        .start_container(&name)
                        .await
                        .map_err(|e| service_error(&service.role, e))?;
                }
            }
        }

        info!(project = %project.name, "Compose up complete");
        Ok(())
    }

    /// Stop every declared container without removing it.
    pub async fn stop(&self, project: &Project) -> Result<()> {
        for service in &project.services {
            let name = project.container_name(&service.role);

            match self.runtime.stop_container(&name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(container = %name, "Nothing to stop");
                }
                Err(e) => return Err(service_error(&service.role, e)),
            }
        }

        info!(project = %project.name, "Compose stop complete");
        Ok(())
    }

    /// Stop and remove every declared container and project-scoped
    /// resource. The shared network stays.
    pub async fn down(&self, project: &Project) -> Result<()> {
        for service in &project.services {
            let name = project.container_name(&service.role);

            match self.runtime.stop_container(&name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(container = %name, "Already removed");
                    continue;
                }
                Err(e) => return Err(service_error(&service.role, e)),
            }

            match self.runtime.remove_container(&name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(service_error(&service.role, e)),
            }
        }

        info!(project = %project.name, "Compose down complete");
        Ok(())
    }
}

fn service_error(role: &str, source: container_runtime::Error) -> Error {
    Error::Service {
        service: role.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use container_runtime::memory::MemoryRuntime;

    fn test_project() -> (tempfile::TempDir, Project) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("site1");
        std::fs::create_dir(&dir).unwrap();
        let project = Project::init(&dir).unwrap();
        project.render_compose(SHARED_NETWORK).unwrap();
        (tmp, project)
    }

    #[tokio::test]
    async fn test_up_requires_compose_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("site1");
        std::fs::create_dir(&dir).unwrap();
        let project = Project::init(&dir).unwrap();
        std::fs::remove_dir_all(project.state_dir()).ok();

        let runtime = Arc::new(MemoryRuntime::new());
        let controller = ComposeController::new(runtime);

        let result = controller.up(&project).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_up_twice_creates_no_duplicates() {
        let (_tmp, project) = test_project();
        let runtime = Arc::new(MemoryRuntime::new());
        let controller = ComposeController::new(runtime.clone());

        controller.up(&project).await.unwrap();
        controller.up(&project).await.unwrap();

        let mut names = runtime.container_names();
        names.sort();
        assert_eq!(names, vec!["local-site1-db", "local-site1-web"]);
    }

    #[tokio::test]
    async fn test_up_restarts_stopped_containers() {
        let (_tmp, project) = test_project();
        let runtime = Arc::new(MemoryRuntime::new());
        let controller = ComposeController::new(runtime.clone());

        controller.up(&project).await.unwrap();
        controller.stop(&project).await.unwrap();
        controller.up(&project).await.unwrap();

        let inspector = ContainerInspector::new(runtime);
        for name in project.container_names() {
            inspector.check(&name, ContainerState::Running).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_stop_without_containers_is_noop() {
        let (_tmp, project) = test_project();
        let runtime = Arc::new(MemoryRuntime::new());
        let controller = ComposeController::new(runtime);

        controller.stop(&project).await.unwrap();
    }

    #[tokio::test]
    async fn test_down_is_idempotent() {
        let (_tmp, project) = test_project();
        let runtime = Arc::new(MemoryRuntime::new());
        let controller = ComposeController::new(runtime.clone());

        controller.up(&project).await.unwrap();
        controller.down(&project).await.unwrap();
        controller.down(&project).await.unwrap();

        assert!(runtime.container_names().is_empty());
    }
}
