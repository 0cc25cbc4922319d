use crate::error::{ManagerError, Result};
use std::path::{Path, PathBuf};

pub const ROOT_ENV: &str = "LTX2_MANAGER_ROOT";
pub const COMFYUI_ENV: &str = "LTX2_MANAGER_COMFYUI";
pub const NO_CLEAR_ENV: &str = "LTX2_MANAGER_NO_CLEAR";

/// Main configuration structure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    pub comfy_dir: PathBuf,
    pub workflows_dir: PathBuf,
    pub banner_path: PathBuf,
    pub clear_screen: bool,
}

// Default value functions
fn default_comfy_dir(root: &Path) -> PathBuf {
    root.join("ComfyUI")
}
fn default_workflows_dir(root: &Path) -> PathBuf {
    root.join("workflows").join("ltx2")
}
fn default_banner_path(root: &Path) -> PathBuf {
    root.join("about.nfo")
}
fn default_clear_screen() -> bool {
    true
}

impl Config {
    /// Build config from the environment, falling back to the current directory
    pub fn load() -> Result<Self> {
        let root = match std::env::var_os(ROOT_ENV) {
            Some(root) if !root.is_empty() => PathBuf::from(root),
            _ => std::env::current_dir().map_err(|e| {
                ManagerError::Config(format!("Cannot determine current directory: {e}"))
            })?,
        };

        let mut config = Self::with_root(root);

        if let Some(comfy) = std::env::var_os(COMFYUI_ENV).filter(|v| !v.is_empty()) {
            config.comfy_dir = PathBuf::from(comfy);
        }

        if let Ok(value) = std::env::var(NO_CLEAR_ENV) {
            config.clear_screen = !parse_flag(&value);
        }

        tracing::debug!("Loaded config: {config:?}");
        Ok(config)
    }

    /// Config with every path derived from `root`
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            comfy_dir: default_comfy_dir(&root),
            workflows_dir: default_workflows_dir(&root),
            banner_path: default_banner_path(&root),
            clear_screen: default_clear_screen(),
            root,
        }
    }

    /// `<ComfyUI>/models`
    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.comfy_dir.join("models")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(ROOT_ENV);
        std::env::remove_var(COMFYUI_ENV);
        std::env::remove_var(NO_CLEAR_ENV);
    }

    #[test]
    fn test_with_root_layout() {
        let config = Config::with_root("/opt/ltx");
        assert_eq!(config.comfy_dir, PathBuf::from("/opt/ltx/ComfyUI"));
        assert_eq!(config.models_dir(), PathBuf::from("/opt/ltx/ComfyUI/models"));
        assert_eq!(config.workflows_dir, PathBuf::from("/opt/ltx/workflows/ltx2"));
        assert_eq!(config.banner_path, PathBuf::from("/opt/ltx/about.nfo"));
        assert!(config.clear_screen);
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        clear_env();
        std::env::set_var(ROOT_ENV, "/srv/ltx");
        std::env::set_var(COMFYUI_ENV, "/srv/comfy");
        std::env::set_var(NO_CLEAR_ENV, "1");

        let config = Config::load().unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/ltx"));
        assert_eq!(config.comfy_dir, PathBuf::from("/srv/comfy"));
        assert_eq!(config.workflows_dir, PathBuf::from("/srv/ltx/workflows/ltx2"));
        assert!(!config.clear_screen);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_defaults_to_current_dir() {
        clear_env();
        let config = Config::load().unwrap();
        assert_eq!(config.root, std::env::current_dir().unwrap());
        assert!(config.clear_screen);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
