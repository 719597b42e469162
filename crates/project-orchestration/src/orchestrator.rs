//! The project lifecycle orchestrator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use container_runtime::{ContainerRuntime, ContainerState};

use crate::compose::ComposeController;
use crate::import::ImportPipeline;
use crate::inspector::ContainerInspector;
use crate::network::{NetworkManager, SHARED_NETWORK};
use crate::project::{Phase, Project, derive_phase};
use crate::{Error, Result};

/// Interval between the first two wait polls.
const WAIT_POLL_INITIAL: Duration = Duration::from_millis(250);
/// Upper bound on the wait poll interval.
const WAIT_POLL_MAX: Duration = Duration::from_secs(2);

/// Drives one project between "not running" and "all required services
/// observably running", and back.
///
/// Every operation runs to completion before returning; only
/// [`wait`](Self::wait) suspends, in a bounded poll-sleep loop. No
/// lifecycle state is held in memory across calls: the runtime is
/// always re-queried, because containers may be mutated out-of-band.
///
/// Two orchestrators driving the *same* project concurrently are not
/// protected against each other; coordination across distinct projects
/// needs none, because the runtime serializes the shared network and
/// container names are project-scoped.
pub struct ProjectOrchestrator {
    project: Project,
    network: NetworkManager,
    inspector: ContainerInspector,
    compose: ComposeController,
    imports: ImportPipeline,
}

impl ProjectOrchestrator {
    /// Resolve the project at `dir` and render its compose artifact.
    pub async fn init(
        runtime: Arc<dyn ContainerRuntime>,
        dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let project = Project::init(dir)?;
        project.render_compose(SHARED_NETWORK)?;

        info!(project = %project.name, "Initialized project");
        Ok(Self {
            project,
            network: NetworkManager::new(runtime.clone()),
            inspector: ContainerInspector::new(runtime.clone()),
            compose: ComposeController::new(runtime.clone()),
            imports: ImportPipeline::new(runtime),
        })
    }

    /// The resolved project.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Ensure the shared network exists, then bring every declared
    /// service up. Convergent: starting a running project succeeds
    /// without creating duplicates.
    ///
    /// Success here does not mean the services are ready; container
    /// startup is asynchronous in the runtime. Callers that need a
    /// working environment must follow with [`wait`](Self::wait).
    pub async fn start(&self) -> Result<()> {
        info!(project = %self.project.name, "Starting project");
        self.network.ensure_network(SHARED_NETWORK).await?;
        self.compose.up(&self.project).await
    }

    /// Poll until every declared service reports `running`, or until
    /// `timeout` elapses.
    ///
    /// The interval backs off from 250ms to 2s. On timeout the error
    /// lists every service that never reached `running`; the
    /// environment must be treated as not usable regardless of what
    /// [`start`](Self::start) returned.
    pub async fn wait(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut interval = WAIT_POLL_INITIAL;

        loop {
            let unready = self.unready_services().await?;
            if unready.is_empty() {
                info!(project = %self.project.name, "All services running");
                return Ok(());
            }

            if Instant::now() >= deadline {
                warn!(
                    project = %self.project.name,
                    unready = ?unready,
                    "Wait budget exhausted"
                );
                return Err(Error::WaitTimeout { unready });
            }

            debug!(
                project = %self.project.name,
                unready = ?unready,
                interval_ms = interval.as_millis() as u64,
                "Services not ready yet"
            );
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(WAIT_POLL_MAX);
        }
    }

    /// Stop every declared container. They persist, `exited`.
    pub async fn stop(&self) -> Result<()> {
        info!(project = %self.project.name, "Stopping project");
        self.compose.stop(&self.project).await
    }

    /// Stop and remove every declared container. Idempotent on an
    /// already-removed project. The shared network is left in place.
    pub async fn down(&self) -> Result<()> {
        info!(project = %self.project.name, "Removing project");
        self.compose.down(&self.project).await
    }

    /// Import a database archive into the running `db` service.
    pub async fn import_db(&self, archive: impl AsRef<Path>) -> Result<()> {
        self.imports.import_db(&self.project, archive.as_ref()).await
    }

    /// Import a files archive into the running `web` service.
    pub async fn import_files(&self, archive: impl AsRef<Path>) -> Result<()> {
        self.imports
            .import_files(&self.project, archive.as_ref())
            .await
    }

    /// Compute the project's current phase from the runtime's ground
    /// truth. Never cached.
    pub async fn phase(&self) -> Result<Phase> {
        let observed = self.inspector.observe_all().await?;
        let states: Vec<Option<ContainerState>> = self
            .project
            .container_names()
            .into_iter()
            .map(|name| observed.get(&name).cloned())
            .collect();
        Ok(derive_phase(&states))
    }

    /// Declared services not currently observed `running`, in start
    /// order.
    async fn unready_services(&self) -> Result<Vec<String>> {
        let observed = self.inspector.observe_all().await?;
        Ok(self
            .project
            .container_names()
            .into_iter()
            .filter(|name| observed.get(name) != Some(&ContainerState::Running))
            .collect())
    }
}
