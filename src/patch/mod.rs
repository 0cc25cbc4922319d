//! Backup, replace and restore of the ComfyUI `embeddings_connector.py`
//!
//! The live file is backed up once, on the first install that finds it. Later
//! installs keep that original backup, and restoring never removes it.

use crate::error::{ManagerError, Result};
use crate::models::download::{FetchOutcome, Fetcher, Target, Transport};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EMBEDDINGS_CONNECTOR_URL: &str =
    "https://raw.githubusercontent.com/gjnave/cogni-scripts/refs/heads/main/workflows/ltx-2/embeddings_connector.py";

/// Word the operator must type to restore the backup
pub const RESTORE_CONFIRMATION: &str = "YES";

/// What install did with the original file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupAction {
    Created,
    AlreadyPresent,
    NoOriginal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub backup: BackupAction,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchStatus {
    pub live_exists: bool,
    pub backup_exists: bool,
    pub backup_modified: Option<DateTime<Local>>,
}

/// The single application file this tool may overwrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchableFile {
    live: PathBuf,
    backup: PathBuf,
    url: String,
}

impl PatchableFile {
    pub fn new(live: impl Into<PathBuf>, backup: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            live: live.into(),
            backup: backup.into(),
            url: url.into(),
        }
    }

    /// `<ComfyUI>/comfy/ldm/lightricks/embeddings_connector.py`, backed up as `.py._bak`
    #[must_use]
    pub fn embeddings_connector(comfy_dir: &Path) -> Self {
        let live = comfy_dir
            .join("comfy")
            .join("ldm")
            .join("lightricks")
            .join("embeddings_connector.py");
        let backup = live.with_extension("py._bak");
        Self::new(live, backup, EMBEDDINGS_CONNECTOR_URL)
    }

    #[must_use]
    pub fn live_path(&self) -> &Path {
        &self.live
    }

    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    #[must_use]
    pub fn has_backup(&self) -> bool {
        self.backup.is_file()
    }

    /// Back up the original once, then download the replacement over it
    pub fn install<T: Transport>(&self, fetcher: &Fetcher<T>, out: &mut dyn Write) -> Result<PatchReport> {
        if let Some(parent) = self.live.parent() {
            fs::create_dir_all(parent)?;
        }

        let backup = if !self.live.is_file() {
            writeln!(out, "Warning: Original file does not exist at:")?;
            writeln!(out, "{}\n", self.live.display())?;
            tracing::warn!("No original {} to back up", self.live.display());
            BackupAction::NoOriginal
        } else if self.has_backup() {
            writeln!(out, "Backup already exists: {}\n", self.backup_name())?;
            BackupAction::AlreadyPresent
        } else {
            writeln!(out, "Backing up original {}...", self.live_name())?;
            copy_preserving(&self.live, &self.backup)?;
            tracing::info!("Created backup {}", self.backup.display());
            writeln!(out, "Backup created: {}\n", self.backup_name())?;
            BackupAction::Created
        };

        writeln!(out, "Downloading updated {}...", self.live_name())?;
        let target = Target::model(&self.live, &self.url);
        let outcome = fetcher.fetch(&target, true, out)?;

        match &outcome {
            FetchOutcome::Failed(_) => writeln!(out, "\nFailed to download {}", self.live_name())?,
            _ => writeln!(out, "\nSuccessfully installed {}", self.live_name())?,
        }

        Ok(PatchReport { backup, outcome })
    }

    /// Copy the backup over the live file if `answer` is the confirmation word.
    ///
    /// The backup is kept.
    pub fn restore(&self, answer: &str) -> Result<RestoreOutcome> {
        if !self.has_backup() {
            return Err(ManagerError::NoBackup(self.backup.clone()));
        }

        if !answer.trim().eq_ignore_ascii_case(RESTORE_CONFIRMATION) {
            tracing::debug!("Restore cancelled");
            return Ok(RestoreOutcome::Cancelled);
        }

        if let Some(parent) = self.live.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_preserving(&self.backup, &self.live)?;
        tracing::info!("Restored {} from backup", self.live.display());
        Ok(RestoreOutcome::Restored)
    }

    #[must_use]
    pub fn status(&self) -> PatchStatus {
        let backup_modified = fs::metadata(&self.backup)
            .and_then(|m| m.modified())
            .ok()
            .filter(|_| self.has_backup())
            .map(DateTime::<Local>::from);

        PatchStatus {
            live_exists: self.live.is_file(),
            backup_exists: self.has_backup(),
            backup_modified,
        }
    }

    fn live_name(&self) -> String {
        file_name(&self.live)
    }

    fn backup_name(&self) -> String {
        file_name(&self.backup)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Copy contents and permissions, then carry over the modification time
fn copy_preserving(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)?;
    let modified = fs::metadata(from)?.modified()?;
    File::options().write(true).open(to)?.set_modified(modified)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct StaticTransport(&'static [u8]);

    impl Transport for StaticTransport {
        fn download(&self, _url: &str, dest: &Path) -> Result<u64> {
            fs::write(dest, self.0)?;
            Ok(self.0.len() as u64)
        }
    }

    struct BrokenTransport;

    impl Transport for BrokenTransport {
        fn download(&self, _url: &str, _dest: &Path) -> Result<u64> {
            Err(ManagerError::Download("HTTP 404".to_string()))
        }
    }

    fn patchable(temp_dir: &TempDir) -> PatchableFile {
        PatchableFile::embeddings_connector(&temp_dir.path().join("ComfyUI"))
    }

    #[test]
    fn test_paths() {
        let file = PatchableFile::embeddings_connector(Path::new("/c"));
        assert_eq!(
            file.live_path(),
            Path::new("/c/comfy/ldm/lightricks/embeddings_connector.py")
        );
        assert_eq!(
            file.backup_path(),
            Path::new("/c/comfy/ldm/lightricks/embeddings_connector.py._bak")
        );
    }

    #[test]
    fn test_install_backs_up_once() {
        let temp_dir = TempDir::new().unwrap();
        let file = patchable(&temp_dir);
        fs::create_dir_all(file.live_path().parent().unwrap()).unwrap();
        fs::write(file.live_path(), "original").unwrap();

        let fetcher = Fetcher::new(StaticTransport(b"patched v1"));
        let report = file.install(&fetcher, &mut Vec::new()).unwrap();
        assert_eq!(report.backup, BackupAction::Created);
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), "original");
        assert_eq!(fs::read_to_string(file.live_path()).unwrap(), "patched v1");

        let fetcher = Fetcher::new(StaticTransport(b"patched v2"));
        let report = file.install(&fetcher, &mut Vec::new()).unwrap();
        assert_eq!(report.backup, BackupAction::AlreadyPresent);
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), "original");
        assert_eq!(fs::read_to_string(file.live_path()).unwrap(), "patched v2");

        let backups = fs::read_dir(file.live_path().parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains("_bak"))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_install_without_original() {
        let temp_dir = TempDir::new().unwrap();
        let file = patchable(&temp_dir);
        let mut out = Vec::new();

        let report = file
            .install(&Fetcher::new(StaticTransport(b"patched")), &mut out)
            .unwrap();
        assert_eq!(report.backup, BackupAction::NoOriginal);
        assert!(!file.has_backup());
        assert!(file.live_path().is_file());
        assert!(String::from_utf8(out).unwrap().contains("Warning: Original file does not exist"));
    }

    #[test]
    fn test_failed_install_keeps_live_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = patchable(&temp_dir);
        fs::create_dir_all(file.live_path().parent().unwrap()).unwrap();
        fs::write(file.live_path(), "original").unwrap();

        let report = file.install(&Fetcher::new(BrokenTransport), &mut Vec::new()).unwrap();
        assert!(matches!(report.outcome, FetchOutcome::Failed(_)));
        assert_eq!(fs::read_to_string(file.live_path()).unwrap(), "original");
    }

    #[test]
    fn test_restore_without_backup() {
        let temp_dir = TempDir::new().unwrap();
        let file = patchable(&temp_dir);
        fs::create_dir_all(file.live_path().parent().unwrap()).unwrap();
        fs::write(file.live_path(), "live").unwrap();

        let result = file.restore("YES");
        assert!(matches!(result, Err(ManagerError::NoBackup(_))));
        assert_eq!(fs::read_to_string(file.live_path()).unwrap(), "live");
    }

    #[test]
    fn test_restore_confirmed_any_case() {
        let temp_dir = TempDir::new().unwrap();
        let file = patchable(&temp_dir);
        fs::create_dir_all(file.live_path().parent().unwrap()).unwrap();
        let original = [0u8, 159, 146, 150, 10, 255];
        fs::write(file.backup_path(), original).unwrap();
        fs::write(file.live_path(), "patched").unwrap();

        assert_eq!(file.restore("yes").unwrap(), RestoreOutcome::Restored);
        assert_eq!(fs::read(file.live_path()).unwrap(), original);
        assert!(file.has_backup());
    }

    #[test]
    fn test_restore_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let file = patchable(&temp_dir);
        fs::create_dir_all(file.live_path().parent().unwrap()).unwrap();
        fs::write(file.backup_path(), "original").unwrap();
        fs::write(file.live_path(), "patched").unwrap();

        assert_eq!(file.restore("y").unwrap(), RestoreOutcome::Cancelled);
        assert_eq!(fs::read_to_string(file.live_path()).unwrap(), "patched");
    }

    #[test]
    fn test_status() {
        let temp_dir = TempDir::new().unwrap();
        let file = patchable(&temp_dir);

        let status = file.status();
        assert!(!status.live_exists);
        assert!(!status.backup_exists);
        assert!(status.backup_modified.is_none());

        fs::create_dir_all(file.live_path().parent().unwrap()).unwrap();
        fs::write(file.backup_path(), "original").unwrap();
        let status = file.status();
        assert!(!status.live_exists);
        assert!(status.backup_exists);
        assert!(status.backup_modified.is_some());
    }
}
