use crate::error::{ManagerError, Result};
use crate::models::download::{BatchReport, FetchOutcome, Fetcher, Target, Transport};
use crate::models::layout::{Category, Layout};
use crate::models::probe::{InstallStatus, Prober};
use crate::models::registry::{AssetEntry, Bundle, Catalog, VariantSet, WorkflowFile};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Install, inspect and delete catalog files
pub struct ModelManager<T> {
    catalog: Catalog,
    layout: Layout,
    fetcher: Fetcher<T>,
}

impl<T: Transport> ModelManager<T> {
    /// Validate the catalog against the layout and create the model folders.
    ///
    /// A catalog entry without a folder is a configuration error and nothing
    /// is created in that case.
    pub fn new(catalog: Catalog, layout: Layout, transport: T) -> Result<Self> {
        catalog.validate(&layout)?;
        layout.create_dirs()?;

        Ok(Self {
            catalog,
            layout,
            fetcher: Fetcher::new(transport),
        })
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub const fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    #[must_use]
    pub const fn prober(&self) -> Prober<'_> {
        Prober::new(&self.layout)
    }

    pub fn bundle_status(&self, bundle: &Bundle) -> Result<InstallStatus> {
        self.prober().bundle_status(bundle)
    }

    pub fn variant_status(&self, set: &VariantSet) -> Result<InstallStatus> {
        self.prober().variant_status(set)
    }

    /// Download every model file of a bundle, then its workflow
    pub fn install_bundle(&self, bundle: &Bundle, overwrite: bool, out: &mut dyn Write) -> Result<BatchReport> {
        tracing::info!("Installing bundle '{}' (overwrite: {overwrite})", bundle.key);
        let targets = self.targets(&bundle.assets, std::slice::from_ref(&bundle.workflow))?;
        self.fetcher.fetch_all(&targets, overwrite, out)
    }

    /// Download the chosen variants, the common files and the shared workflows
    pub fn install_variant(
        &self,
        set: &VariantSet,
        selected: &[&AssetEntry],
        overwrite: bool,
        out: &mut dyn Write,
    ) -> Result<BatchReport> {
        tracing::info!(
            "Installing {} variant(s) of '{}' (overwrite: {overwrite})",
            selected.len(),
            set.key
        );
        let assets: Vec<AssetEntry> = selected
            .iter()
            .map(|&a| a.clone())
            .chain(set.common.iter().cloned())
            .collect();
        let targets = self.targets(&assets, &set.workflows)?;
        self.fetcher.fetch_all(&targets, overwrite, out)
    }

    /// Workflow files not yet in the workflows folder
    #[must_use]
    pub fn pending_workflows(&self) -> Vec<WorkflowFile> {
        let prober = self.prober();
        self.catalog
            .all_workflows()
            .into_iter()
            .filter(|wf| !prober.workflow_exists(wf))
            .cloned()
            .collect()
    }

    pub fn fetch_workflow(&self, workflow: &WorkflowFile, out: &mut dyn Write) -> Result<FetchOutcome> {
        let target = Target::workflow(self.prober().workflow_path(workflow), &workflow.url);
        self.fetcher.fetch(&target, false, out)
    }

    /// Categories with at least one deletable file
    pub fn populated_categories(&self) -> Result<Vec<Category>> {
        self.prober().populated_categories()
    }

    /// Deletable files of one category, sorted
    pub fn files_in(&self, category: Category) -> Result<Vec<PathBuf>> {
        self.prober().scan(category)
    }

    /// Delete a single model file.
    ///
    /// Only files directly inside a category folder and matching its pattern
    /// can be deleted.
    pub fn delete_file(&self, category: Category, path: &Path) -> Result<()> {
        let folder = self.layout.folder(category)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| category.matches(n))
            .filter(|_| path.parent() == Some(folder))
            .ok_or_else(|| {
                ManagerError::NotFound(format!(
                    "{} is not a {category} model file",
                    path.display()
                ))
            })?;

        if !path.is_file() {
            return Err(ManagerError::NotFound(format!("{name} no longer exists")));
        }

        fs::remove_file(path)?;
        tracing::info!("Deleted {}", path.display());
        Ok(())
    }

    fn targets(&self, assets: &[AssetEntry], workflows: &[WorkflowFile]) -> Result<Vec<Target>> {
        let prober = self.prober();
        let mut targets = Vec::with_capacity(assets.len() + workflows.len());
        for asset in assets {
            targets.push(Target::model(prober.asset_path(asset)?, &asset.url));
        }
        for wf in workflows {
            targets.push(Target::workflow(prober.workflow_path(wf), &wf.url));
        }
        Ok(targets)
    }
}
