//! Export seam and the local file exporter.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use imagery_common::{format_compact, CrsCode, ImageryResult, Region};

use crate::{CollectionHandle, ImageCatalog, ImageRecord};

/// Lifecycle state of a submitted export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl TaskState {
    /// Completed, failed or cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed(_) | TaskState::Cancelled
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskState::Failed(_) | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "PENDING"),
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Completed => write!(f, "COMPLETED"),
            TaskState::Failed(reason) => write!(f, "FAILED: {}", reason),
            TaskState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Handle on one submitted export, pollable until terminal.
#[async_trait]
pub trait ExportTask: Send + Sync {
    fn id(&self) -> &str;

    /// Output name of the exported image.
    fn description(&self) -> &str;

    async fn status(&self) -> ImageryResult<TaskState>;
}

/// Pixel grid of an export. Exactly one is used per export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportGeometry {
    /// Metres per pixel.
    Scale(f64),
    CrsTransform([f64; 6]),
    Dimensions { width: u32, height: u32 },
}

impl ExportGeometry {
    pub fn scale(&self) -> Option<f64> {
        match self {
            ExportGeometry::Scale(scale) => Some(*scale),
            _ => None,
        }
    }
}

/// Export parameters after defaults and precedence are applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedExportParams {
    pub geometry: ExportGeometry,
    pub crs: CrsCode,
    pub folder: String,
}

/// Receives a resolved collection and starts one export per image.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(
        &self,
        catalog: &dyn ImageCatalog,
        handle: &CollectionHandle,
        region: &Region,
        basename: &str,
        params: &ResolvedExportParams,
    ) -> ImageryResult<Vec<Box<dyn ExportTask>>>;
}

/// Task whose state is settled when the local write finishes.
#[derive(Debug, Clone)]
pub struct LocalExportTask {
    id: String,
    description: String,
    state: TaskState,
}

#[async_trait]
impl ExportTask for LocalExportTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn status(&self) -> ImageryResult<TaskState> {
        Ok(self.state.clone())
    }
}

#[derive(Serialize)]
struct ExportManifest<'a> {
    name: &'a str,
    task_id: &'a str,
    plan: &'a CollectionHandle,
    image: &'a ImageRecord,
    region: &'a Region,
    crs: CrsCode,
    geometry: ExportGeometry,
    exported_at: String,
}

/// Writes a JSON manifest per image under `<root>/<folder>/<name>.json`.
#[derive(Debug, Clone)]
pub struct LocalExporter {
    root: PathBuf,
}

impl LocalExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_manifest(path: &Path, manifest: &ExportManifest<'_>) -> ImageryResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(manifest)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl Exporter for LocalExporter {
    async fn export(
        &self,
        catalog: &dyn ImageCatalog,
        handle: &CollectionHandle,
        region: &Region,
        basename: &str,
        params: &ResolvedExportParams,
    ) -> ImageryResult<Vec<Box<dyn ExportTask>>> {
        let images = catalog.images(handle).await?;
        let dir = self.root.join(&params.folder);

        let mut tasks: Vec<Box<dyn ExportTask>> = Vec::with_capacity(images.len());
        for image in &images {
            let name = format!("{}_{}", basename, format_compact(&image.timestamp));
            let id = Uuid::new_v4().to_string();
            let path = dir.join(format!("{}.json", name));

            let manifest = ExportManifest {
                name: &name,
                task_id: &id,
                plan: handle,
                image,
                region,
                crs: params.crs,
                geometry: params.geometry,
                exported_at: Utc::now().to_rfc3339(),
            };

            let state = match Self::write_manifest(&path, &manifest).await {
                Ok(()) => {
                    info!(task_id = %id, name = %name, path = %path.display(), "Export written");
                    TaskState::Completed
                }
                Err(e) => {
                    warn!(task_id = %id, name = %name, error = %e, "Export write failed");
                    TaskState::Failed(e.to_string())
                }
            };

            tasks.push(Box::new(LocalExportTask {
                id,
                description: name,
                state,
            }));
        }

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(TaskState::Failed("quota".into()).is_terminal());

        assert!(!TaskState::Completed.is_failure());
        assert!(TaskState::Cancelled.is_failure());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TaskState::Completed.to_string(), "COMPLETED");
        assert_eq!(TaskState::Failed("quota".into()).to_string(), "FAILED: quota");
    }

    #[test]
    fn test_geometry_scale() {
        assert_eq!(ExportGeometry::Scale(40.0).scale(), Some(40.0));
        assert_eq!(
            ExportGeometry::Dimensions {
                width: 10,
                height: 10
            }
            .scale(),
            None
        );
    }
}
