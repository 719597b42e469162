//! Archive imports into a running project's services.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use container_runtime::{ContainerRuntime, ContainerState};

use crate::inspector::ContainerInspector;
use crate::project::Project;
use crate::{Error, Result};

/// Loads already-materialized archives into the appropriate running
/// service: database restores and file-tree replacements.
///
/// Both operations block until completion and never retry. On an
/// extraction failure the target directory is left as-is, mid-replace;
/// the error says so.
pub struct ImportPipeline {
    inspector: ContainerInspector,
}

impl ImportPipeline {
    /// Create a pipeline over `runtime`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            inspector: ContainerInspector::new(runtime),
        }
    }

    /// Replace the database service's storage with the archive's
    /// contents. The `db` container must be observed `running`.
    pub async fn import_db(&self, project: &Project, archive: &Path) -> Result<()> {
        self.require_running(project, "db", "import-db").await?;

        let target = project.db_data_dir();
        extract_replacing(archive, &target).map_err(|e| Error::Import {
            target: "database".to_string(),
            source: e,
        })?;

        info!(
            project = %project.name,
            archive = %archive.display(),
            "Imported database archive"
        );
        Ok(())
    }

    /// Replace the web service's file storage with the archive's
    /// contents. The `web` container must be observed `running`.
    pub async fn import_files(&self, project: &Project, archive: &Path) -> Result<()> {
        self.require_running(project, "web", "import-files").await?;

        let target = project.files_dir();
        extract_replacing(archive, &target).map_err(|e| Error::Import {
            target: "files".to_string(),
            source: e,
        })?;

        info!(
            project = %project.name,
            archive = %archive.display(),
            "Imported files archive"
        );
        Ok(())
    }

    /// Fail with `PreconditionFailed` before any mutation when the
    /// backing container is not running.
    async fn require_running(&self, project: &Project, role: &str, operation: &str) -> Result<()> {
        let name = project.container_name(role);
        match self.inspector.observe(&name).await? {
            Some(ContainerState::Running) => Ok(()),
            _ => Err(Error::PreconditionFailed {
                operation: operation.to_string(),
                service: name,
            }),
        }
    }
}

/// Extract a gzip-compressed tarball into `target`, replacing whatever
/// was there.
fn extract_replacing(archive: &Path, target: &Path) -> std::io::Result<()> {
    let file = File::open(archive)?;

    if target.exists() {
        std::fs::remove_dir_all(target)?;
    }
    std::fs::create_dir_all(target)?;

    let mut unpacker = tar::Archive::new(flate2::read::GzDecoder::new(file));
    unpacker.unpack(target)?;
    Ok(())
}
