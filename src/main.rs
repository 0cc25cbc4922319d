#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use ltx2_manager::config::Config;
use ltx2_manager::menu::Driver;
use ltx2_manager::models::{Catalog, HttpTransport, Layout, ModelManager};
use ltx2_manager::patch::PatchableFile;
use std::io::{self, IsTerminal, Write};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the menus
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = Config::load()?;
    tracing::info!("Managing ComfyUI at {}", config.comfy_dir.display());

    let runtime = Handle::current();
    let menu = tokio::task::spawn_blocking(move || run_menu(&config, runtime));

    tokio::select! {
        result = menu => result.context("Menu task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nExiting...");
            io::stdout().flush().ok();
            std::process::exit(0);
        }
    }
}

fn run_menu(config: &Config, runtime: Handle) -> anyhow::Result<()> {
    let layout = Layout::from_config(config);
    let transport = HttpTransport::new(runtime).context("Failed to create HTTP client")?;
    let manager = ModelManager::new(Catalog::builtin(), layout, transport)?;
    let patch = PatchableFile::embeddings_connector(&config.comfy_dir);

    let stdin = io::stdin();
    let mut driver = Driver::new(manager, patch, stdin.lock(), io::stdout())
        .with_banner(&config.banner_path)
        .with_clear_screen(config.clear_screen && io::stdout().is_terminal());
    driver.run()?;

    println!("\nExiting...");
    Ok(())
}
