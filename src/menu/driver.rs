use crate::error::{ManagerError, Result};
use crate::menu::{group_letter, parse_variant_choice, Action, Listing, Screen, Transition, VariantChoice};
use crate::models::download::{BatchReport, Transport};
use crate::models::layout::Category;
use crate::models::manager::ModelManager;
use crate::models::probe::InstallStatus;
use crate::models::registry::{AssetEntry, Pick, VariantSet, WorkflowFile};
use crate::patch::{PatchableFile, RestoreOutcome, RESTORE_CONFIRMATION};
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

const RULE: &str = "==================================================";

/// Runs the menus over any line reader and writer
pub struct Driver<R, W, T> {
    manager: ModelManager<T>,
    patch: PatchableFile,
    input: R,
    out: W,
    banner: Option<PathBuf>,
    clear_screen: bool,
}

impl<R: BufRead, W: Write, T: Transport> Driver<R, W, T> {
    pub fn new(manager: ModelManager<T>, patch: PatchableFile, input: R, out: W) -> Self {
        Self {
            manager,
            patch,
            input,
            out,
            banner: None,
            clear_screen: false,
        }
    }

    /// Text file printed above the main menu when present
    #[must_use]
    pub fn with_banner(mut self, path: impl Into<PathBuf>) -> Self {
        self.banner = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_clear_screen(mut self, clear_screen: bool) -> Self {
        self.clear_screen = clear_screen;
        self
    }

    /// Consume the driver, returning the output writer
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until the operator exits or input ends
    pub fn run(&mut self) -> Result<()> {
        match self.run_screens() {
            Err(ManagerError::InputClosed) => {
                tracing::debug!("Input closed, leaving menu");
                Ok(())
            }
            other => other,
        }
    }

    fn run_screens(&mut self) -> Result<()> {
        let mut stack = vec![Screen::Main];

        while let Some(screen) = stack.last().cloned() {
            let listing = match self.listing(&screen) {
                Ok(listing) => listing,
                Err(e) => {
                    self.report(e)?;
                    stack.pop();
                    continue;
                }
            };

            if screen.is_dynamic() && listing.is_empty() {
                self.clear()?;
                writeln!(self.out, "\n{}", empty_message(&screen))?;
                self.pause()?;
                stack.pop();
                continue;
            }

            self.clear()?;
            if let Err(e) = self.render(&screen, &listing) {
                self.report(e)?;
                stack.pop();
                continue;
            }
            let input = self.prompt(prompt_text(&screen))?;

            match screen.on_input(&input, self.manager.catalog(), &listing) {
                Transition::Push(next) => stack.push(next),
                Transition::Pop => {
                    stack.pop();
                }
                Transition::Run(action) => self.run_action(action)?,
                Transition::Exit => break,
                Transition::Ignore => tracing::debug!("Ignoring input {input:?} on {screen:?}"),
            }
        }

        Ok(())
    }

    fn listing(&self, screen: &Screen) -> Result<Listing> {
        Ok(match screen {
            Screen::Delete => Listing::Categories(self.manager.populated_categories()?),
            Screen::DeleteFolder(category) => Listing::Files(self.manager.files_in(*category)?),
            Screen::WorkflowsOnly => Listing::Workflows(self.manager.pending_workflows()),
            _ => Listing::None,
        })
    }

    fn render(&mut self, screen: &Screen, listing: &Listing) -> Result<()> {
        let out = &mut self.out;
        let catalog = self.manager.catalog();

        match screen {
            Screen::Main => {
                if let Some(text) = self.banner.as_deref().and_then(read_banner) {
                    writeln!(out, "{text}")?;
                }
                header(out, "LTX-2 WORKFLOW MANAGER")?;
                writeln!(out, "  1. Install Workflows & Models")?;
                writeln!(out, "  2. Delete Models")?;
                writeln!(out, "  3. Download Workflows Only")?;
                writeln!(out, "  4. Manage ComfyUI Files")?;
                writeln!(out, "  5. Exit")?;
            }
            Screen::Install => {
                header(out, "INSTALL WORKFLOWS & MODELS")?;
                writeln!(out, "Workflows:")?;
                for (i, bundle) in catalog.bundles.iter().enumerate() {
                    writeln!(out, "  {}. {}", i + 1, bundle.name)?;
                }
                let offset = catalog.bundles.len();
                writeln!(out, "\nKijai Variants:")?;
                for (i, set) in catalog.variants.iter().enumerate() {
                    writeln!(out, "  {}. {}", offset + i + 1, set.name)?;
                }
                writeln!(out, "\nOther:")?;
                writeln!(out, "  {}. Back to Main Menu", offset + catalog.variants.len() + 1)?;
            }
            Screen::Bundle(index) => {
                let bundle = catalog
                    .bundles
                    .get(*index)
                    .ok_or_else(|| ManagerError::NotFound(format!("bundle #{index}")))?;
                let status = self.manager.bundle_status(bundle)?;
                writeln!(out, "\n{} - Status\n", bundle.name)?;
                write_status(out, &status)?;
                write_install_options(out)?;
            }
            Screen::Variant(index) => {
                let set = catalog
                    .variants
                    .get(*index)
                    .ok_or_else(|| ManagerError::NotFound(format!("variant set #{index}")))?;
                let status = self.manager.variant_status(set)?;
                writeln!(out, "\n{} - Status\n", set.name)?;
                write_status(out, &status)?;
                write_install_options(out)?;
            }
            Screen::Delete => {
                header(out, "DELETE MODELS")?;
                if let Listing::Categories(categories) = listing {
                    for (i, category) in categories.iter().enumerate() {
                        writeln!(out, "  {}. {}", i + 1, category.display_name())?;
                    }
                }
                writeln!(out, "\n  {}. Back to Main Menu", listing.len() + 1)?;
            }
            Screen::DeleteFolder(category) => {
                header(out, &format!("FILES IN {}", category.dir_name().to_uppercase()))?;
                if let Listing::Files(files) = listing {
                    for (i, file) in files.iter().enumerate() {
                        writeln!(out, "  {}. {}", i + 1, display_file_name(file))?;
                    }
                }
                writeln!(out, "\n  B. Back to Previous Menu")?;
            }
            Screen::WorkflowsOnly => {
                header(out, "DOWNLOAD WORKFLOWS ONLY")?;
                if let Listing::Workflows(workflows) = listing {
                    for (i, wf) in workflows.iter().enumerate() {
                        writeln!(out, "  {}. {}", i + 1, wf.file_name)?;
                    }
                }
                writeln!(out, "\n  {}. Back to Main Menu", listing.len() + 1)?;
            }
            Screen::Patch => {
                let name = display_file_name(self.patch.live_path());
                header(out, "MANAGE COMFYUI FILES")?;
                writeln!(out, "  1. Install/Update {name}")?;
                writeln!(out, "  2. Restore Original {name}")?;
                writeln!(out, "  3. Check {name} Status")?;
                writeln!(out, "  4. Back to Main Menu")?;
            }
        }

        Ok(())
    }

    fn run_action(&mut self, action: Action) -> Result<()> {
        tracing::debug!("Running {action:?}");

        let result = match action {
            Action::InstallBundle { bundle, overwrite } => self.install_bundle(bundle, overwrite),
            Action::InstallVariant { variant, overwrite } => self.install_variant(variant, overwrite),
            Action::DeleteFile { category, path } => self.delete_file(category, &path),
            Action::FetchWorkflow(workflow) => self.fetch_workflow(&workflow),
            Action::PatchInstall => self.patch_install(),
            Action::PatchRestore => self.patch_restore(),
            Action::PatchStatus => self.patch_status(),
        };

        match result {
            Err(e) => self.report(e),
            Ok(()) => Ok(()),
        }
    }

    /// Show an error and wait, so the caller can fall back to the previous menu
    fn report(&mut self, error: ManagerError) -> Result<()> {
        if matches!(error, ManagerError::InputClosed) {
            return Err(error);
        }
        tracing::warn!("{error}");
        writeln!(self.out, "\nError: {error}")?;
        self.pause()
    }

    fn install_bundle(&mut self, index: usize, overwrite: bool) -> Result<()> {
        let bundle = self
            .manager
            .catalog()
            .bundles
            .get(index)
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(format!("bundle #{index}")))?;

        self.clear()?;
        writeln!(self.out, "\nDownloading...\n")?;
        let report = self.manager.install_bundle(&bundle, overwrite, &mut self.out)?;
        self.finish_batch(report)
    }

    fn install_variant(&mut self, index: usize, overwrite: bool) -> Result<()> {
        let set = self
            .manager
            .catalog()
            .variants
            .get(index)
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(format!("variant set #{index}")))?;

        let selected = match set.pick {
            Pick::One => self.choose_one(&set)?,
            Pick::Many => self.choose_many(&set)?,
        };
        if selected.is_empty() {
            tracing::debug!("Nothing selected for '{}'", set.key);
            return Ok(());
        }

        let selected: Vec<&AssetEntry> = selected.iter().collect();
        self.clear()?;
        writeln!(self.out, "\nDownloading...\n")?;
        let report = self
            .manager
            .install_variant(&set, &selected, overwrite, &mut self.out)?;
        self.finish_batch(report)
    }

    fn fetch_workflow(&mut self, workflow: &WorkflowFile) -> Result<()> {
        self.clear()?;
        writeln!(self.out, "\nDownloading...\n")?;
        self.manager.fetch_workflow(workflow, &mut self.out)?;
        writeln!(self.out, "\nDownload complete!")?;
        self.pause()
    }

    /// Empty when the operator backs out
    fn choose_one(&mut self, set: &VariantSet) -> Result<Vec<AssetEntry>> {
        loop {
            self.clear()?;
            let label = set.groups.first().map_or("Variant", |g| g.label.as_str());
            writeln!(self.out, "\nChoose {label}\n")?;
            let mut count = 0;
            for option in set.options() {
                count += 1;
                writeln!(self.out, "{count}. {}", option.file_name)?;
            }
            writeln!(self.out, "{}. Back", count + 1)?;

            let input = self.prompt("\nChoice: ")?;
            match parse_variant_choice(&input, set) {
                VariantChoice::Selected(selected) => {
                    return Ok(selected.into_iter().cloned().collect())
                }
                VariantChoice::Cancel => return Ok(Vec::new()),
                VariantChoice::Invalid => {}
            }
        }
    }

    fn choose_many(&mut self, set: &VariantSet) -> Result<Vec<AssetEntry>> {
        self.clear()?;
        writeln!(self.out, "\nChoose {} (space-separated numbers)", set.name)?;

        let mut index = 0;
        for group in &set.groups {
            writeln!(self.out, "\n{}:", group.label)?;
            for option in &group.options {
                index += 1;
                writeln!(self.out, "{index:2}. {}", option.file_name)?;
            }
        }

        writeln!(self.out)?;
        for (i, group) in set.groups.iter().enumerate() {
            writeln!(self.out, "{}. Select All {}", group_letter(i), group.label)?;
        }
        writeln!(self.out, "{}. Back", group_letter(set.groups.len()))?;

        let input = self.prompt("\nEnter choices (e.g., 1 5 12): ")?;
        Ok(match parse_variant_choice(&input, set) {
            VariantChoice::Selected(selected) => selected.into_iter().cloned().collect(),
            VariantChoice::Cancel | VariantChoice::Invalid => Vec::new(),
        })
    }

    fn finish_batch(&mut self, report: BatchReport) -> Result<()> {
        writeln!(
            self.out,
            "\nDownload complete! ({} downloaded, {} skipped, {} failed)",
            report.downloaded, report.skipped, report.failed
        )?;
        self.pause()
    }

    fn delete_file(&mut self, category: Category, path: &Path) -> Result<()> {
        let name = display_file_name(path);
        let confirm = self.prompt(&format!("\nDelete {name}? (Y/N): "))?;
        if !confirm.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }

        self.manager.delete_file(category, path)?;
        writeln!(self.out, "File deleted successfully.")?;
        self.pause()
    }

    fn patch_install(&mut self) -> Result<()> {
        self.clear()?;
        let name = display_file_name(self.patch.live_path()).to_uppercase();
        header(&mut self.out, &format!("INSTALL/UPDATE {name}"))?;
        self.patch.install(self.manager.fetcher(), &mut self.out)?;
        self.pause()
    }

    fn patch_restore(&mut self) -> Result<()> {
        self.clear()?;
        let name = display_file_name(self.patch.live_path());
        header(&mut self.out, &format!("RESTORE ORIGINAL {}", name.to_uppercase()))?;

        if !self.patch.has_backup() {
            writeln!(self.out, "Error: No backup file found!")?;
            writeln!(self.out, "Backup location: {}", self.patch.backup_path().display())?;
            writeln!(self.out, "\nCannot restore original file.")?;
            return self.pause();
        }

        writeln!(self.out, "Backup file found.\n")?;
        let answer = self.prompt(&format!(
            "Type {RESTORE_CONFIRMATION} to restore original {name}: "
        ))?;

        match self.patch.restore(&answer)? {
            RestoreOutcome::Restored => {
                writeln!(self.out, "\nSuccessfully restored original {name}\n")?;
                writeln!(self.out, "The backup file has been kept in case you need it.")?;
            }
            RestoreOutcome::Cancelled => writeln!(self.out, "\nRestore cancelled.")?,
        }
        self.pause()
    }

    fn patch_status(&mut self) -> Result<()> {
        self.clear()?;
        let name = display_file_name(self.patch.live_path());
        header(&mut self.out, &format!("{} STATUS", name.to_uppercase()))?;

        let status = self.patch.status();
        writeln!(self.out, "File location: {}\n", self.patch.live_path().display())?;
        if status.live_exists {
            writeln!(self.out, "[x] {name} exists")?;
        } else {
            writeln!(self.out, "[ ] {name} NOT found")?;
        }
        writeln!(self.out)?;
        match status.backup_modified {
            Some(modified) if status.backup_exists => writeln!(
                self.out,
                "[x] Backup exists (._bak, saved {})",
                modified.format("%Y-%m-%d %H:%M")
            )?,
            _ if status.backup_exists => writeln!(self.out, "[x] Backup exists (._bak)")?,
            _ => writeln!(self.out, "[ ] No backup found")?,
        }

        writeln!(self.out)?;
        self.pause()
    }

    fn prompt(&mut self, text: &str) -> Result<String> {
        write!(self.out, "{text}")?;
        self.out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ManagerError::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    fn pause(&mut self) -> Result<()> {
        self.prompt("\nPress Enter to continue...")?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.clear_screen {
            crossterm::execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        Ok(())
    }
}

fn prompt_text(screen: &Screen) -> &'static str {
    match screen {
        Screen::Install | Screen::WorkflowsOnly => "\nSelect workflow: ",
        Screen::Bundle(_) | Screen::Variant(_) => "\nChoice: ",
        Screen::DeleteFolder(_) => "\nSelect file to delete (or B): ",
        Screen::Main | Screen::Delete | Screen::Patch => "\nSelect option: ",
    }
}

fn empty_message(screen: &Screen) -> String {
    match screen {
        Screen::DeleteFolder(category) => format!("No files found in {category}"),
        Screen::WorkflowsOnly => "All workflows are already downloaded.".to_string(),
        _ => "No model files found.".to_string(),
    }
}

fn header(out: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(out, "\n{RULE}")?;
    writeln!(out, "  {title}")?;
    writeln!(out, "{RULE}\n")
}

fn write_status(out: &mut impl Write, status: &InstallStatus) -> io::Result<()> {
    for row in &status.rows {
        if row.exists {
            writeln!(out, "[OK] {} ({})", row.name, row.location)?;
        } else {
            writeln!(out, "[X] {} ({}) - MISSING", row.name, row.location)?;
        }
    }
    writeln!(
        out,
        "\nMissing: {} | Installed: {}\n",
        status.missing(),
        status.installed()
    )
}

fn write_install_options(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "1. Download Missing Files")?;
    writeln!(out, "2. Re-download All Files")?;
    writeln!(out, "3. Back")
}

fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Banner text, lossily decoded; `None` when the file is absent or unreadable
fn read_banner(path: &Path) -> Option<String> {
    fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
