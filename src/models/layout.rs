use crate::config::Config;
use crate::error::{ManagerError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Model folder under `<ComfyUI>/models`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Checkpoints,
    DiffusionModels,
    TextEncoders,
    Vae,
    Loras,
    LatentUpscaleModels,
    Unet,
}

impl Category {
    pub const ALL: [Self; 7] = [
        Self::Checkpoints,
        Self::DiffusionModels,
        Self::TextEncoders,
        Self::Vae,
        Self::Loras,
        Self::LatentUpscaleModels,
        Self::Unet,
    ];

    /// Folder name on disk
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Checkpoints => "checkpoints",
            Self::DiffusionModels => "diffusion_models",
            Self::TextEncoders => "text_encoders",
            Self::Vae => "vae",
            Self::Loras => "loras",
            Self::LatentUpscaleModels => "latent_upscale_models",
            Self::Unet => "unet",
        }
    }

    /// Menu label
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Checkpoints => "Checkpoints",
            Self::DiffusionModels => "Diffusion Models",
            Self::TextEncoders => "Text Encoders",
            Self::Vae => "Vae",
            Self::Loras => "Loras",
            Self::LatentUpscaleModels => "Latent Upscale Models",
            Self::Unet => "UNet (GGUF)",
        }
    }

    /// File extension of the weights kept in this folder
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Unet => "gguf",
            _ => "safetensors",
        }
    }

    /// Whether `file_name` matches this folder's `*.<extension>` pattern
    #[must_use]
    pub fn matches(self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext == self.extension())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Where every category and the workflow files live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    folders: BTreeMap<Category, PathBuf>,
    workflows: PathBuf,
}

impl Layout {
    /// One folder per category under `models_dir`
    #[must_use]
    pub fn new(models_dir: &Path, workflows_dir: impl Into<PathBuf>) -> Self {
        let folders = Category::ALL
            .iter()
            .map(|&category| (category, models_dir.join(category.dir_name())))
            .collect();

        Self {
            folders,
            workflows: workflows_dir.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.models_dir(), config.workflows_dir.clone())
    }

    /// Layout with an explicit folder map; categories left out have no folder
    #[must_use]
    pub fn from_folders(
        folders: BTreeMap<Category, PathBuf>,
        workflows_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            folders,
            workflows: workflows_dir.into(),
        }
    }

    /// Folder for a category
    pub fn folder(&self, category: Category) -> Result<&Path> {
        self.folders
            .get(&category)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                ManagerError::Config(format!("No folder configured for category '{category}'"))
            })
    }

    #[must_use]
    pub fn has_folder(&self, category: Category) -> bool {
        self.folders.contains_key(&category)
    }

    /// Categories that have a folder, in display order
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.folders.keys().copied()
    }

    #[must_use]
    pub fn workflows_dir(&self) -> &Path {
        &self.workflows
    }

    /// Create the workflows folder and every category folder
    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.workflows)?;
        for folder in self.folders.values() {
            fs::create_dir_all(folder)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_category_patterns() {
        assert!(Category::Unet.matches("ltx-2-19b-dev-Q4_0.gguf"));
        assert!(!Category::Unet.matches("model.safetensors"));
        assert!(Category::Loras.matches("detailer.safetensors"));
        assert!(!Category::Loras.matches("detailer.safetensors.part"));
        assert!(!Category::Vae.matches("README"));
    }

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new(Path::new("/c/models"), "/w");
        assert_eq!(
            layout.folder(Category::LatentUpscaleModels).unwrap(),
            Path::new("/c/models/latent_upscale_models")
        );
        assert_eq!(layout.workflows_dir(), Path::new("/w"));
        assert_eq!(layout.categories().count(), Category::ALL.len());
    }

    #[test]
    fn test_missing_folder_is_config_error() {
        let mut folders = BTreeMap::new();
        folders.insert(Category::Vae, PathBuf::from("/m/vae"));
        let layout = Layout::from_folders(folders, "/w");

        assert!(layout.has_folder(Category::Vae));
        let err = layout.folder(Category::Loras).unwrap_err();
        assert!(matches!(err, ManagerError::Config(_)));
    }

    #[test]
    fn test_create_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let layout = Layout::new(&temp_dir.path().join("models"), temp_dir.path().join("wf"));

        layout.create_dirs().unwrap();
        for category in Category::ALL {
            assert!(layout.folder(category).unwrap().is_dir());
        }
        assert!(layout.workflows_dir().is_dir());

        // Second run is a no-op
        layout.create_dirs().unwrap();
    }
}
