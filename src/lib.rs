#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod error;
pub mod menu;
pub mod models;
pub mod patch;

pub use error::{ManagerError, Result};
