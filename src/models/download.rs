use crate::error::{ManagerError, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;

/// Moves bytes from a URL into a local file
pub trait Transport {
    /// Download `url` into `dest`, returning the number of bytes written
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        (**self).download(url, dest)
    }
}

/// `reqwest` transport with redirect following and a progress bar.
///
/// Downloads run on the given runtime handle; callers must not be on an
/// async task themselves.
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: Handle,
    progress: bool,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("client", &"Client { ... }")
            .field("progress", &self.progress)
            .finish()
    }
}

impl HttpTransport {
    /// Create new transport
    pub fn new(runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ltx2-manager/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            runtime,
            progress: true,
        })
    }

    /// Disable the progress bar
    #[must_use]
    pub fn without_progress(mut self) -> Self {
        self.progress = false;
        self
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ManagerError::Download(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        let total_size = response.content_length();
        if let (Some(total), Some(parent)) = (total_size, dest.parent()) {
            check_disk_space(parent, total)?;
        }

        let pb = self.progress_bar(total_size, dest);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;

        if let Some(total) = total_size {
            if downloaded != total {
                pb.abandon();
                return Err(ManagerError::Download(format!(
                    "transfer interrupted after {} of {}",
                    format_bytes(downloaded),
                    format_bytes(total)
                )));
            }
        }

        pb.finish_and_clear();
        Ok(downloaded)
    }

    fn progress_bar(&self, total_size: Option<u64>, dest: &Path) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }

        let pb = match total_size {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                ) {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        if let Some(name) = dest.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }
        pb
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.runtime.block_on(self.stream_to(url, dest))
    }
}

/// What gets written where, and how it is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub dest: PathBuf,
    pub url: String,
    pub kind: TargetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Model,
    /// JSON descriptor, parsed before it replaces anything
    Workflow,
}

impl Target {
    pub fn model(dest: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            dest: dest.into(),
            url: url.into(),
            kind: TargetKind::Model,
        }
    }

    pub fn workflow(dest: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            dest: dest.into(),
            url: url.into(),
            kind: TargetKind::Workflow,
        }
    }

    fn display_name(&self) -> String {
        self.dest
            .file_name()
            .map_or_else(|| self.dest.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Result of one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Skipped,
    Downloaded(u64),
    Failed(String),
}

/// Tally for a batch of fetches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Skipped => self.skipped += 1,
            FetchOutcome::Downloaded(_) => self.downloaded += 1,
            FetchOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Deserialize)]
struct WorkflowSummary {
    #[serde(default)]
    nodes: Vec<serde::de::IgnoredAny>,
}

/// Skip-or-download policy on top of a [`Transport`]
#[derive(Debug)]
pub struct Fetcher<T> {
    transport: T,
}

impl<T: Transport> Fetcher<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Fetch one target, writing a status line to `out`.
    ///
    /// An existing destination is left alone unless `overwrite` is set. Data
    /// lands in `<dest>.part` first and only replaces `dest` once complete.
    pub fn fetch(&self, target: &Target, overwrite: bool, out: &mut dyn Write) -> Result<FetchOutcome> {
        let name = target.display_name();

        if target.dest.exists() && !target.dest.is_file() {
            let reason = format!("{} exists but is not a regular file", target.dest.display());
            tracing::warn!("{reason}");
            writeln!(out, "[FAIL] {name} - {reason}")?;
            return Ok(FetchOutcome::Failed(reason));
        }

        if target.dest.is_file() && !overwrite {
            writeln!(out, "[SKIP] {name} already exists")?;
            return Ok(FetchOutcome::Skipped);
        }

        writeln!(out, "[DOWN] {name}")?;
        out.flush()?;

        let partial = partial_path(&target.dest);
        match self.transfer(target, &partial) {
            Ok(bytes) => {
                tracing::info!("Downloaded {} ({})", target.dest.display(), format_bytes(bytes));
                writeln!(out, "[DONE] {name} ({})", format_bytes(bytes))?;
                Ok(FetchOutcome::Downloaded(bytes))
            }
            Err(e) => {
                if partial.exists() {
                    if let Err(rm) = fs::remove_file(&partial) {
                        tracing::warn!("Could not remove {}: {rm}", partial.display());
                    }
                }
                tracing::warn!("Download of {} failed: {e}", target.url);
                writeln!(out, "[FAIL] {name} - {e}")?;
                Ok(FetchOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Fetch every target in order; failures do not stop the batch
    pub fn fetch_all(&self, targets: &[Target], overwrite: bool, out: &mut dyn Write) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for target in targets {
            let outcome = self.fetch(target, overwrite, out)?;
            report.record(&outcome);
        }
        Ok(report)
    }

    fn transfer(&self, target: &Target, partial: &Path) -> Result<u64> {
        let bytes = self.transport.download(&target.url, partial)?;

        if target.kind == TargetKind::Workflow {
            let invalid = |reason: String| {
                ManagerError::InvalidWorkflow(format!("{}: {reason}", target.display_name()))
            };
            let content = fs::read(partial)?;
            let value: serde_json::Value =
                serde_json::from_slice(&content).map_err(|e| invalid(e.to_string()))?;
            // Structs also deserialize from JSON arrays
            if !value.is_object() {
                return Err(invalid("expected a JSON object".to_string()));
            }
            let summary = WorkflowSummary::deserialize(&value).map_err(|e| invalid(e.to_string()))?;
            tracing::debug!("{} has {} node(s)", target.display_name(), summary.nodes.len());
        }

        fs::rename(partial, &target.dest)?;
        Ok(bytes)
    }
}

/// `<dest>.part` next to the destination
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Check if enough disk space is available in `dir`
#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
fn check_disk_space(dir: &Path, required_bytes: u64) -> Result<()> {
    let stats = match nix::sys::statvfs::statvfs(dir) {
        Ok(stats) => stats,
        Err(e) => {
            tracing::debug!("Could not check free space of {}: {e}", dir.display());
            return Ok(());
        }
    };

    let available_bytes = (stats.blocks_available() as u64).saturating_mul(stats.fragment_size() as u64);

    if available_bytes < required_bytes {
        return Err(ManagerError::DiskSpace {
            required: format_bytes(required_bytes),
            available: format_bytes(available_bytes),
        });
    }

    Ok(())
}

#[cfg(not(unix))]
fn check_disk_space(_dir: &Path, _required_bytes: u64) -> Result<()> {
    Ok(())
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
