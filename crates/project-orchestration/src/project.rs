//! Project model: identity, declared services, naming, and the
//! rendered compose artifact.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

use container_runtime::ContainerState;

use crate::{Error, Result};

/// Directory under the project root holding orchestrator-owned state.
pub const STATE_DIR: &str = ".local";
/// Optional per-project configuration file inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";
/// Rendered compose artifact inside [`STATE_DIR`].
pub const COMPOSE_FILE: &str = "docker-compose.yaml";

const DEFAULT_WEB_IMAGE: &str = "nginx:alpine";
const DEFAULT_DB_IMAGE: &str = "mariadb:10.11";

/// One logical service within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Logical role, e.g. `web` or `db`. Also the container hostname.
    pub role: String,
    /// Image reference.
    pub image: String,
    /// Environment variables for the container.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ServiceDefinition {
    /// Create a definition for `role` running `image`.
    pub fn new(role: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            image: image.into(),
            env: HashMap::new(),
        }
    }
}

/// On-disk project configuration (`.local/config.yaml`). Every field
/// is optional; omissions fall back to derived defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name. Defaults to the directory basename.
    pub name: Option<String>,
    /// Declared services in start order. Defaults to `web` + `db`.
    pub services: Option<Vec<ServiceDefinition>>,
}

/// Observable lifecycle phase of a project.
///
/// Always derived from what the runtime reports right now, never
/// stored: containers may be mutated out-of-band and the runtime is
/// the single source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// At least one container is still `created` or `restarting`.
    Starting,
    /// Every declared service reports `running`.
    Running,
    /// Some services run while others are stopped or absent.
    PartiallyRunning,
    /// Every declared service exists but none is running.
    Stopped,
    /// No declared service exists in the runtime.
    Removed,
}

/// Derive a [`Phase`] from per-service observations, in declaration
/// order. `None` means the container is absent.
pub(crate) fn derive_phase(observed: &[Option<ContainerState>]) -> Phase {
    if observed.iter().all(Option::is_none) {
        return Phase::Removed;
    }
    if observed.iter().any(|s| {
        matches!(
            s,
            Some(ContainerState::Created) | Some(ContainerState::Restarting)
        )
    }) {
        return Phase::Starting;
    }
    if observed
        .iter()
        .all(|s| matches!(s, Some(ContainerState::Running)))
    {
        return Phase::Running;
    }
    if observed.iter().all(|s| {
        matches!(
            s,
            Some(ContainerState::Exited) | Some(ContainerState::Dead)
        )
    }) {
        return Phase::Stopped;
    }
    Phase::PartiallyRunning
}

/// One local development environment instance.
///
/// Container names are stable for the project's lifetime; renaming a
/// project requires recreating it.
#[derive(Debug, Clone)]
pub struct Project {
    /// Unique project name.
    pub name: String,
    /// Absolute project directory.
    pub dir: PathBuf,
    /// Declared services in start order.
    pub services: Vec<ServiceDefinition>,
}

impl Project {
    /// Resolve a project from its directory.
    ///
    /// The directory must exist. Identity and the service set come
    /// from `.local/config.yaml` when present, otherwise the name is
    /// the directory basename and the service set is the `web` + `db`
    /// default.
    pub fn init(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "project directory not found: {}",
                dir.display()
            )));
        }
        let dir = dir.canonicalize()?;

        let config_path = dir.join(STATE_DIR).join(CONFIG_FILE);
        let config: ProjectConfig = if config_path.is_file() {
            let raw = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&raw).map_err(|e| {
                Error::Config(format!(
                    "unreadable project config {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            ProjectConfig::default()
        };

        let name = match config.name {
            Some(name) => name,
            None => dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::Config(format!(
                        "cannot derive a project name from {}",
                        dir.display()
                    ))
                })?,
        };
        if name.is_empty() {
            return Err(Error::Config("project name is empty".to_string()));
        }

        let services = config.services.unwrap_or_else(default_services);
        if services.is_empty() {
            return Err(Error::Config(format!(
                "project {} declares no services",
                name
            )));
        }

        info!(project = %name, dir = %dir.display(), "Resolved project");
        Ok(Self { name, dir, services })
    }

    /// Deterministic container name for `role`: `local-<project>-<role>`.
    ///
    /// This template is bit-exact for interoperability with anything
    /// inspecting containers externally.
    pub fn container_name(&self, role: &str) -> String {
        format!("local-{}-{}", self.name, role)
    }

    /// Container names for every declared service, in start order.
    pub fn container_names(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|s| self.container_name(&s.role))
            .collect()
    }

    /// Look up a declared service by role.
    pub fn service(&self, role: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.role == role)
    }

    /// Orchestrator-owned state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.dir.join(STATE_DIR)
    }

    /// Location of the rendered compose artifact.
    pub fn compose_path(&self) -> PathBuf {
        self.state_dir().join(COMPOSE_FILE)
    }

    /// Host directory bind-mounted as the database service's storage.
    pub fn db_data_dir(&self) -> PathBuf {
        self.state_dir().join("db_data")
    }

    /// Host directory bind-mounted as the web service's file storage.
    pub fn files_dir(&self) -> PathBuf {
        self.dir.join("files")
    }

    /// Volume binds for a declared service.
    pub fn binds_for(&self, service: &ServiceDefinition) -> Vec<String> {
        match service.role.as_str() {
            "web" => vec![format!(
                "{}:/var/www/html/files",
                self.files_dir().display()
            )],
            "db" => vec![format!(
                "{}:/var/lib/mysql",
                self.db_data_dir().display()
            )],
            _ => vec![],
        }
    }

    /// Render the compose artifact for this project, joined to the
    /// shared `network`. Overwrites any previous rendering.
    pub fn render_compose(&self, network: &str) -> Result<()> {
        let mut compose = ComposeFile::new(network);
        for service in &self.services {
            compose.services.insert(
                self.container_name(&service.role),
                ComposeService {
                    image: service.image.clone(),
                    container_name: self.container_name(&service.role),
                    hostname: service.role.clone(),
                    networks: vec![network.to_string()],
                    environment: service.env.clone(),
                    volumes: self.binds_for(service),
                    labels: self.labels_for(&service.role),
                },
            );
        }

        let yaml = serde_yaml::to_string(&compose)
            .map_err(|e| Error::Config(format!("compose rendering failed: {}", e)))?;

        std::fs::create_dir_all(self.state_dir())?;
        std::fs::write(self.compose_path(), yaml)?;

        info!(
            project = %self.name,
            path = %self.compose_path().display(),
            "Rendered compose artifact"
        );
        Ok(())
    }

    /// Labels identifying a container as belonging to this project.
    pub fn labels_for(&self, role: &str) -> HashMap<String, String> {
        HashMap::from([
            ("localdev.project".to_string(), self.name.clone()),
            ("localdev.role".to_string(), role.to_string()),
        ])
    }
}

fn default_services() -> Vec<ServiceDefinition> {
    vec![
        ServiceDefinition::new("web", DEFAULT_WEB_IMAGE),
        ServiceDefinition::new("db", DEFAULT_DB_IMAGE),
    ]
}

// Compose artifact YAML types. The controller never parses these back;
// the file exists for the runtime and for manual debugging.

#[derive(Debug, Serialize, Deserialize)]
struct ComposeFile {
    version: String,
    services: BTreeMap<String, ComposeService>,
    networks: BTreeMap<String, ComposeNetwork>,
}

impl ComposeFile {
    fn new(network: &str) -> Self {
        Self {
            version: "3.8".to_string(),
            services: BTreeMap::new(),
            // The shared network outlives any one project.
            networks: BTreeMap::from([(network.to_string(), ComposeNetwork { external: true })]),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ComposeService {
    image: String,
    container_name: String,
    hostname: String,
    networks: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    environment: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComposeNetwork {
    external: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_dir(name: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(name);
        std::fs::create_dir(&dir).unwrap();
        (tmp, dir)
    }

    #[test]
    fn test_init_derives_name_from_directory() {
        let (_tmp, dir) = project_dir("mysite");
        let project = Project::init(&dir).unwrap();

        assert_eq!(project.name, "mysite");
        assert_eq!(project.container_name("web"), "local-mysite-web");
        assert_eq!(project.container_name("db"), "local-mysite-db");
        assert_eq!(project.services.len(), 2);
        assert!(project.service("web").is_some());
        assert!(project.service("cache").is_none());
    }

    #[test]
    fn test_init_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let result = Project::init(tmp.path().join("absent"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_init_reads_config_file() {
        let (_tmp, dir) = project_dir("anything");
        std::fs::create_dir(dir.join(STATE_DIR)).unwrap();
        std::fs::write(
            dir.join(STATE_DIR).join(CONFIG_FILE),
            "name: site1\nservices:\n  - role: web\n    image: nginx:alpine\n  - role: db\n    image: mariadb:10.11\n  - role: cache\n    image: redis:7-alpine\n",
        )
        .unwrap();

        let project = Project::init(&dir).unwrap();
        assert_eq!(project.name, "site1");
        assert_eq!(
            project.container_names(),
            vec!["local-site1-web", "local-site1-db", "local-site1-cache"]
        );
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let (_tmp, dir) = project_dir("mysite");
        std::fs::create_dir(dir.join(STATE_DIR)).unwrap();
        std::fs::write(dir.join(STATE_DIR).join(CONFIG_FILE), "name: [broken").unwrap();

        let result = Project::init(&dir);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_render_compose_writes_artifact() {
        let (_tmp, dir) = project_dir("site1");
        let project = Project::init(&dir).unwrap();
        project.render_compose("local_default").unwrap();

        let raw = std::fs::read_to_string(project.compose_path()).unwrap();
        assert!(raw.contains("local-site1-web"));
        assert!(raw.contains("local-site1-db"));
        assert!(raw.contains("local_default"));
        assert!(raw.contains("external: true"));
    }

    #[test]
    fn test_derive_phase() {
        use ContainerState::*;

        assert_eq!(derive_phase(&[None, None]), Phase::Removed);
        assert_eq!(
            derive_phase(&[Some(Running), Some(Running)]),
            Phase::Running
        );
        assert_eq!(derive_phase(&[Some(Exited), Some(Exited)]), Phase::Stopped);
        assert_eq!(
            derive_phase(&[Some(Running), Some(Created)]),
            Phase::Starting
        );
        assert_eq!(
            derive_phase(&[Some(Running), Some(Exited)]),
            Phase::PartiallyRunning
        );
        assert_eq!(
            derive_phase(&[Some(Running), None]),
            Phase::PartiallyRunning
        );
    }
}
