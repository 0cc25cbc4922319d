//! Configuration module for ltx2-manager
//!
//! There is no config file. Paths come from the environment and fall back to
//! defaults relative to the current directory:
//!
//! - `LTX2_MANAGER_ROOT`: root directory holding `ComfyUI/`, `workflows/` and `about.nfo`
//! - `LTX2_MANAGER_COMFYUI`: ComfyUI install directory (default `<root>/ComfyUI`)
//! - `LTX2_MANAGER_NO_CLEAR`: set to `1` or `true` to keep the screen between menus
//!
//! # Example
//!
//! ```no_run
//! use ltx2_manager::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Models: {}", config.models_dir().display());
//! println!("Workflows: {}", config.workflows_dir.display());
//! ```

pub mod schema;

pub use schema::Config;
