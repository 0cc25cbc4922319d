use crate::error::Result;
use crate::models::layout::{Category, Layout};
use crate::models::registry::{AssetEntry, Bundle, Pick, VariantSet, WorkflowFile};
use std::fs;
use std::path::PathBuf;

/// Location label used for workflow rows
pub const WORKFLOWS_LABEL: &str = "workflows";

/// One status row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub name: String,
    pub location: String,
    pub exists: bool,
}

/// Present/missing rows for a bundle or variant set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallStatus {
    pub rows: Vec<FileStatus>,
}

impl InstallStatus {
    fn push(&mut self, name: impl Into<String>, location: impl Into<String>, exists: bool) {
        self.rows.push(FileStatus {
            name: name.into(),
            location: location.into(),
            exists,
        });
    }

    #[must_use]
    pub fn installed(&self) -> usize {
        self.rows.iter().filter(|r| r.exists).count()
    }

    #[must_use]
    pub fn missing(&self) -> usize {
        self.rows.len() - self.installed()
    }
}

/// Answers "is this file on disk" against a layout. Never caches.
#[derive(Debug, Clone, Copy)]
pub struct Prober<'a> {
    layout: &'a Layout,
}

impl<'a> Prober<'a> {
    #[must_use]
    pub const fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Destination of a model file
    pub fn asset_path(&self, asset: &AssetEntry) -> Result<PathBuf> {
        Ok(self.layout.folder(asset.category)?.join(&asset.file_name))
    }

    /// Destination of a workflow file
    #[must_use]
    pub fn workflow_path(&self, workflow: &WorkflowFile) -> PathBuf {
        self.layout.workflows_dir().join(&workflow.file_name)
    }

    pub fn asset_exists(&self, asset: &AssetEntry) -> Result<bool> {
        Ok(self.asset_path(asset)?.is_file())
    }

    #[must_use]
    pub fn workflow_exists(&self, workflow: &WorkflowFile) -> bool {
        self.workflow_path(workflow).is_file()
    }

    /// Rows for model files followed by workflow files
    pub fn status(&self, assets: &[AssetEntry], workflows: &[WorkflowFile]) -> Result<InstallStatus> {
        let mut status = InstallStatus::default();
        self.push_assets(&mut status, assets)?;
        self.push_workflows(&mut status, workflows);
        Ok(status)
    }

    pub fn bundle_status(&self, bundle: &Bundle) -> Result<InstallStatus> {
        self.status(&bundle.assets, std::slice::from_ref(&bundle.workflow))
    }

    /// Variant slot first, then common files and shared workflows.
    ///
    /// For [`Pick::Many`] sets every matching file already in the target folder
    /// is listed, including quantizations the catalog does not name.
    pub fn variant_status(&self, set: &VariantSet) -> Result<InstallStatus> {
        let mut status = InstallStatus::default();
        let location = set.category.dir_name();

        match set.pick {
            Pick::One => {
                let mut present = false;
                for option in set.options() {
                    if self.asset_exists(option)? {
                        present = true;
                        break;
                    }
                }
                status.push(&set.placeholder, location, present);
            }
            Pick::Many => {
                let found = self.scan(set.category)?;
                if found.is_empty() {
                    status.push(&set.placeholder, location, false);
                }
                for path in found {
                    if let Some(name) = path.file_name() {
                        status.push(name.to_string_lossy(), location, true);
                    }
                }
            }
        }

        self.push_assets(&mut status, &set.common)?;
        self.push_workflows(&mut status, &set.workflows);
        Ok(status)
    }

    /// Files in a category folder matching its `*.<extension>` pattern, sorted
    pub fn scan(&self, category: Category) -> Result<Vec<PathBuf>> {
        let folder = self.layout.folder(category)?;
        if !folder.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(folder)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| category.matches(n))
            })
            .collect();
        files.sort();

        tracing::debug!("Scanned {}: {} file(s)", folder.display(), files.len());
        Ok(files)
    }

    /// Categories holding at least one matching file
    pub fn populated_categories(&self) -> Result<Vec<Category>> {
        let mut populated = Vec::new();
        for category in self.layout.categories() {
            if !self.scan(category)?.is_empty() {
                populated.push(category);
            }
        }
        Ok(populated)
    }

    fn push_assets(&self, status: &mut InstallStatus, assets: &[AssetEntry]) -> Result<()> {
        for asset in assets {
            let exists = self.asset_exists(asset)?;
            status.push(&asset.file_name, asset.category.dir_name(), exists);
        }
        Ok(())
    }

    fn push_workflows(&self, status: &mut InstallStatus, workflows: &[WorkflowFile]) {
        for wf in workflows {
            status.push(&wf.file_name, WORKFLOWS_LABEL, self.workflow_exists(wf));
        }
    }
}
