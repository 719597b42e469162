//! In-memory runtime for hermetic tests.
//!
//! Mimics the observable behavior the orchestration layer depends on:
//! names are reported with Docker's leading `/`, listing includes
//! stopped containers, creation races surface as `AlreadyExists`, and
//! containers can be configured to pass through `created` for a number
//! of observation polls before reaching `running`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::client::{ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus};
use crate::{Error, ResourceKind, Result};

#[derive(Debug)]
struct Entry {
    id: String,
    state: ContainerState,
    /// Remaining list-observations before a started container flips
    /// to `running`. Zero means no transition pending.
    pending_polls: u32,
}

#[derive(Debug, Default)]
struct State {
    networks: BTreeSet<String>,
    network_creates: u64,
    containers: BTreeMap<String, Entry>,
    wedged: BTreeSet<String>,
}

/// A `ContainerRuntime` holding all state in memory.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: Mutex<State>,
    start_delay_polls: u32,
    next_id: AtomicU64,
}

impl MemoryRuntime {
    /// Create a runtime whose containers run as soon as started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime whose started containers stay `created` for
    /// `polls` list-observations before reporting `running`.
    pub fn with_start_delay(polls: u32) -> Self {
        Self {
            start_delay_polls: polls,
            ..Default::default()
        }
    }

    /// Make `name` never progress past `created` once started.
    pub fn wedge(&self, name: &str) {
        self.state.lock().unwrap().wedged.insert(name.to_string());
    }

    /// How many times a network was actually created (not merely
    /// requested).
    pub fn network_create_count(&self) -> u64 {
        self.state.lock().unwrap().network_creates
    }

    /// Names of all containers currently known to the runtime.
    pub fn container_names(&self) -> Vec<String> {
        self.state.lock().unwrap().containers.keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for MemoryRuntime {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerStatus>> {
        let mut state = self.state.lock().unwrap();

        let mut out = Vec::with_capacity(state.containers.len());
        for (name, entry) in state.containers.iter_mut() {
            if entry.pending_polls > 0 {
                entry.pending_polls -= 1;
                if entry.pending_polls == 0 {
                    entry.state = ContainerState::Running;
                }
            }
            out.push(ContainerStatus {
                id: entry.id.clone(),
                names: vec![format!("/{}", name)],
                state: entry.state.clone(),
            });
        }
        Ok(out)
    }

    async fn list_networks(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().networks.iter().cloned().collect())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.networks.insert(name.to_string()) {
            return Err(Error::AlreadyExists {
                kind: ResourceKind::Network,
                name: name.to_string(),
            });
        }
        state.network_creates += 1;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.containers.contains_key(&spec.name) {
            return Err(Error::AlreadyExists {
                kind: ResourceKind::Container,
                name: spec.name.clone(),
            });
        }

        let id = format!("{:012x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        state.containers.insert(
            spec.name.clone(),
            Entry {
                id: id.clone(),
                state: ContainerState::Created,
                pending_polls: 0,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let wedged = state.wedged.contains(name);
        let delay = self.start_delay_polls;

        let entry = state.containers.get_mut(name).ok_or_else(|| Error::NotFound {
            kind: ResourceKind::Container,
            name: name.to_string(),
        })?;

        if wedged {
            entry.state = ContainerState::Created;
        } else if delay > 0 {
            entry.state = ContainerState::Created;
            entry.pending_polls = delay;
        } else {
            entry.state = ContainerState::Running;
        }
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state.containers.get_mut(name).ok_or_else(|| Error::NotFound {
            kind: ResourceKind::Container,
            name: name.to_string(),
        })?;

        entry.pending_polls = 0;
        entry.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.containers.remove(name).ok_or_else(|| Error::NotFound {
            kind: ResourceKind::Container,
            name: name.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_include_stopped_containers() {
        let runtime = MemoryRuntime::new();
        let spec = ContainerSpec::new("local-site1-web", "nginx:alpine");
        runtime.create_container(&spec).await.unwrap();
        runtime.start_container("local-site1-web").await.unwrap();
        runtime.stop_container("local-site1-web").await.unwrap();

        let containers = runtime.list_containers().await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].names[0], "/local-site1-web");
        assert_eq!(containers[0].state, ContainerState::Exited);
    }

    #[tokio::test]
    async fn test_duplicate_network_is_conflict() {
        let runtime = MemoryRuntime::new();
        runtime.create_network("local_default").await.unwrap();
        let err = runtime.create_network("local_default").await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(runtime.network_create_count(), 1);
    }

    #[tokio::test]
    async fn test_start_delay_counts_polls() {
        let runtime = MemoryRuntime::with_start_delay(2);
        let spec = ContainerSpec::new("local-site1-db", "mariadb:10.11");
        runtime.create_container(&spec).await.unwrap();
        runtime.start_container("local-site1-db").await.unwrap();

        let first = runtime.list_containers().await.unwrap();
        assert_eq!(first[0].state, ContainerState::Created);
        let second = runtime.list_containers().await.unwrap();
        assert_eq!(second[0].state, ContainerState::Running);
    }

    #[tokio::test]
    async fn test_stop_missing_container() {
        let runtime = MemoryRuntime::new();
        let err = runtime.stop_container("local-site1-web").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
