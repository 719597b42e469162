//! Docker implementation of the runtime client, via the daemon API.

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::service::HostConfig;
use tracing::{debug, info};

use crate::client::{ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus};
use crate::{Error, ResourceKind, Result};

/// Seconds the daemon waits before killing a container on stop.
const STOP_TIMEOUT_SECS: i64 = 10;

/// Runtime client backed by the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local daemon and verify it is reachable.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        debug!("Connected to Docker daemon");
        Ok(Self { docker })
    }
}

/// Map a daemon API error onto the crate taxonomy for `name`.
fn classify(kind: ResourceKind, name: &str, err: bollard::errors::Error) -> Error {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => Error::NotFound {
            kind,
            name: name.to_string(),
        },
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409, ..
        } => Error::AlreadyExists {
            kind,
            name: name.to_string(),
        },
        other => Error::Api(other),
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerStatus>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerStatus {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                state: ContainerState::parse(c.state.as_deref().unwrap_or_default()),
            })
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<String>> {
        let options = ListNetworksOptions::<String>::default();
        let networks = self.docker.list_networks(Some(options)).await?;

        Ok(networks.into_iter().filter_map(|n| n.name).collect())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        let config = CreateNetworkOptions {
            name,
            driver: "bridge",
            ..Default::default()
        };

        let response = self
            .docker
            .create_network(config)
            .await
            .map_err(|e| classify(ResourceKind::Network, name, e))?;

        info!(network = %name, id = ?response.id, "Created network");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

        let host_config = HostConfig {
            binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
            network_mode: spec.network.clone(),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            hostname: spec.hostname.clone(),
            env: Some(env),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| classify(ResourceKind::Container, &spec.name, e))?;

        info!(container = %spec.name, id = %response.id, "Created container");
        Ok(response.id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| classify(ResourceKind::Container, name, e))?;

        info!(container = %name, "Started container");
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        let options = StopContainerOptions {
            t: STOP_TIMEOUT_SECS,
        };

        match self.docker.stop_container(name, Some(options)).await {
            Ok(()) => {
                info!(container = %name, "Stopped container");
                Ok(())
            }
            // 304: the container was not running to begin with.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!(container = %name, "Container already stopped");
                Ok(())
            }
            Err(e) => Err(classify(ResourceKind::Container, name, e)),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(|e| classify(ResourceKind::Container, name, e))?;

        info!(container = %name, "Removed container");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such container".to_string(),
        };
        let classified = classify(ResourceKind::Container, "local-site1-web", err);
        assert!(classified.is_not_found());
    }

    #[test]
    fn test_classify_conflict() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: "network with name local_default already exists".to_string(),
        };
        let classified = classify(ResourceKind::Network, "local_default", err);
        assert!(classified.is_already_exists());
    }

    #[test]
    fn test_classify_other_passes_through() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "internal error".to_string(),
        };
        let classified = classify(ResourceKind::Container, "local-site1-web", err);
        assert!(matches!(classified, Error::Api(_)));
    }
}
