//! Menu state machine
//!
//! Every screen maps one line of input to a [`Transition`]. The table is pure:
//! anything that depends on the filesystem (deletable categories, files,
//! missing workflows) is passed in as a [`Listing`] computed by the driver
//! right before the screen is shown.

pub mod driver;

pub use driver::Driver;

use crate::models::layout::Category;
use crate::models::registry::{AssetEntry, Catalog, Pick, VariantSet, WorkflowFile};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Main,
    Install,
    /// Status of `catalog.bundles[i]`
    Bundle(usize),
    /// Status of `catalog.variants[i]`
    Variant(usize),
    Delete,
    DeleteFolder(Category),
    WorkflowsOnly,
    Patch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InstallBundle { bundle: usize, overwrite: bool },
    InstallVariant { variant: usize, overwrite: bool },
    DeleteFile { category: Category, path: PathBuf },
    FetchWorkflow(WorkflowFile),
    PatchInstall,
    PatchRestore,
    PatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Push(Screen),
    Pop,
    Run(Action),
    Exit,
    /// Unrecognized input, show the screen again
    Ignore,
}

/// Items of a screen whose options come from disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Listing {
    #[default]
    None,
    Categories(Vec<Category>),
    Files(Vec<PathBuf>),
    Workflows(Vec<WorkflowFile>),
}

impl Listing {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Categories(items) => items.len(),
            Self::Files(items) => items.len(),
            Self::Workflows(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn number(input: &str) -> Option<usize> {
    input.trim().parse().ok()
}

impl Screen {
    /// Whether this screen lists files or folders found on disk
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Delete | Self::DeleteFolder(_) | Self::WorkflowsOnly)
    }

    /// Decide what one line of input does on this screen
    #[must_use]
    pub fn on_input(&self, input: &str, catalog: &Catalog, listing: &Listing) -> Transition {
        let input = input.trim();

        match self {
            Self::Main => match input {
                "1" => Transition::Push(Self::Install),
                "2" => Transition::Push(Self::Delete),
                "3" => Transition::Push(Self::WorkflowsOnly),
                "4" => Transition::Push(Self::Patch),
                "5" => Transition::Exit,
                _ => Transition::Ignore,
            },
            Self::Install => {
                let bundles = catalog.bundles.len();
                let variants = catalog.variants.len();
                match number(input) {
                    Some(n) if n >= 1 && n <= bundles => Transition::Push(Self::Bundle(n - 1)),
                    Some(n) if n > bundles && n <= bundles + variants => {
                        Transition::Push(Self::Variant(n - bundles - 1))
                    }
                    Some(n) if n == bundles + variants + 1 => Transition::Pop,
                    _ => Transition::Ignore,
                }
            }
            Self::Bundle(bundle) => match input {
                "1" => Transition::Run(Action::InstallBundle {
                    bundle: *bundle,
                    overwrite: false,
                }),
                "2" => Transition::Run(Action::InstallBundle {
                    bundle: *bundle,
                    overwrite: true,
                }),
                "3" => Transition::Pop,
                _ => Transition::Ignore,
            },
            Self::Variant(variant) => match input {
                "1" => Transition::Run(Action::InstallVariant {
                    variant: *variant,
                    overwrite: false,
                }),
                "2" => Transition::Run(Action::InstallVariant {
                    variant: *variant,
                    overwrite: true,
                }),
                "3" => Transition::Pop,
                _ => Transition::Ignore,
            },
            Self::Delete => match (listing, number(input)) {
                (Listing::Categories(categories), Some(n)) if n >= 1 && n <= categories.len() => {
                    Transition::Push(Self::DeleteFolder(categories[n - 1]))
                }
                (_, Some(n)) if n == listing.len() + 1 => Transition::Pop,
                _ => Transition::Ignore,
            },
            Self::DeleteFolder(category) => {
                if input.eq_ignore_ascii_case("b") {
                    return Transition::Pop;
                }
                match (listing, number(input)) {
                    (Listing::Files(files), Some(n)) if n >= 1 && n <= files.len() => {
                        Transition::Run(Action::DeleteFile {
                            category: *category,
                            path: files[n - 1].clone(),
                        })
                    }
                    _ => Transition::Ignore,
                }
            }
            Self::WorkflowsOnly => match (listing, number(input)) {
                (Listing::Workflows(workflows), Some(n)) if n >= 1 && n <= workflows.len() => {
                    Transition::Run(Action::FetchWorkflow(workflows[n - 1].clone()))
                }
                (_, Some(n)) if n == listing.len() + 1 => Transition::Pop,
                _ => Transition::Ignore,
            },
            Self::Patch => match input {
                "1" => Transition::Run(Action::PatchInstall),
                "2" => Transition::Run(Action::PatchRestore),
                "3" => Transition::Run(Action::PatchStatus),
                "4" => Transition::Pop,
                _ => Transition::Ignore,
            },
        }
    }
}

/// Operator's answer on a variant picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantChoice<'a> {
    Selected(Vec<&'a AssetEntry>),
    Cancel,
    /// Re-prompt
    Invalid,
}

/// Letter that selects a whole group, `A` for the first
#[must_use]
pub fn group_letter(index: usize) -> char {
    (b'A'..=b'Z').map(char::from).nth(index).unwrap_or('?')
}

/// Parse the answer on a variant picker.
///
/// [`Pick::One`]: a number from the option list, or the number after it to go back.
///
/// [`Pick::Many`]: space-separated numbers over all groups, one letter per group
/// for the whole group, or the letter after the last group to go back.
/// Out-of-range and non-numeric tokens are dropped, so the selection may come
/// back empty.
#[must_use]
pub fn parse_variant_choice<'a>(input: &str, set: &'a VariantSet) -> VariantChoice<'a> {
    let options: Vec<&AssetEntry> = set.options().collect();
    let input = input.trim();

    match set.pick {
        Pick::One => match number(input) {
            Some(n) if n >= 1 && n <= options.len() => VariantChoice::Selected(vec![options[n - 1]]),
            Some(n) if n == options.len() + 1 => VariantChoice::Cancel,
            _ => VariantChoice::Invalid,
        },
        Pick::Many => {
            let upper = input.to_ascii_uppercase();
            if let Some((index, group)) = set
                .groups
                .iter()
                .enumerate()
                .find(|(i, _)| upper == group_letter(*i).to_string())
            {
                tracing::debug!("Selected whole group {index} of '{}'", set.key);
                return VariantChoice::Selected(group.options.iter().collect());
            }
            if upper == group_letter(set.groups.len()).to_string() {
                return VariantChoice::Cancel;
            }

            let selected = input
                .split_whitespace()
                .filter_map(number)
                .filter(|n| *n >= 1 && *n <= options.len())
                .map(|n| options[n - 1])
                .collect();
            VariantChoice::Selected(selected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin()
    }

    #[test]
    fn test_main_menu_transitions() {
        let catalog = catalog();
        let none = Listing::None;
        assert_eq!(Screen::Main.on_input("1", &catalog, &none), Transition::Push(Screen::Install));
        assert_eq!(Screen::Main.on_input(" 2 ", &catalog, &none), Transition::Push(Screen::Delete));
        assert_eq!(
            Screen::Main.on_input("3", &catalog, &none),
            Transition::Push(Screen::WorkflowsOnly)
        );
        assert_eq!(Screen::Main.on_input("4", &catalog, &none), Transition::Push(Screen::Patch));
        assert_eq!(Screen::Main.on_input("5", &catalog, &none), Transition::Exit);
        assert_eq!(Screen::Main.on_input("9", &catalog, &none), Transition::Ignore);
        assert_eq!(Screen::Main.on_input("", &catalog, &none), Transition::Ignore);
    }

    #[test]
    fn test_exit_only_from_main() {
        let catalog = catalog();
        let screens = [
            Screen::Install,
            Screen::Bundle(0),
            Screen::Variant(0),
            Screen::Delete,
            Screen::DeleteFolder(Category::Vae),
            Screen::WorkflowsOnly,
            Screen::Patch,
        ];
        for screen in screens {
            for input in ["1", "2", "3", "4", "5", "6", "7", "8", "9", "b", "x"] {
                assert_ne!(
                    screen.on_input(input, &catalog, &Listing::None),
                    Transition::Exit,
                    "{screen:?} exited on {input}"
                );
            }
        }
    }

    #[test]
    fn test_install_menu_numbering() {
        let catalog = catalog();
        let none = Listing::None;
        assert_eq!(Screen::Install.on_input("1", &catalog, &none), Transition::Push(Screen::Bundle(0)));
        assert_eq!(Screen::Install.on_input("5", &catalog, &none), Transition::Push(Screen::Bundle(4)));
        assert_eq!(Screen::Install.on_input("6", &catalog, &none), Transition::Push(Screen::Variant(0)));
        assert_eq!(Screen::Install.on_input("7", &catalog, &none), Transition::Push(Screen::Variant(1)));
        assert_eq!(Screen::Install.on_input("8", &catalog, &none), Transition::Pop);
        assert_eq!(Screen::Install.on_input("0", &catalog, &none), Transition::Ignore);
        assert_eq!(Screen::Install.on_input("abc", &catalog, &none), Transition::Ignore);
    }

    #[test]
    fn test_bundle_screen_actions() {
        let catalog = catalog();
        let none = Listing::None;
        assert_eq!(
            Screen::Bundle(1).on_input("1", &catalog, &none),
            Transition::Run(Action::InstallBundle { bundle: 1, overwrite: false })
        );
        assert_eq!(
            Screen::Bundle(1).on_input("2", &catalog, &none),
            Transition::Run(Action::InstallBundle { bundle: 1, overwrite: true })
        );
        assert_eq!(Screen::Bundle(1).on_input("3", &catalog, &none), Transition::Pop);
        assert_eq!(
            Screen::Variant(1).on_input("2", &catalog, &none),
            Transition::Run(Action::InstallVariant { variant: 1, overwrite: true })
        );
    }

    #[test]
    fn test_delete_screens_use_listing() {
        let catalog = catalog();
        let categories = Listing::Categories(vec![Category::Vae, Category::Unet]);
        assert_eq!(
            Screen::Delete.on_input("2", &catalog, &categories),
            Transition::Push(Screen::DeleteFolder(Category::Unet))
        );
        assert_eq!(Screen::Delete.on_input("3", &catalog, &categories), Transition::Pop);
        assert_eq!(Screen::Delete.on_input("4", &catalog, &categories), Transition::Ignore);

        let files = Listing::Files(vec![PathBuf::from("/m/unet/a.gguf")]);
        let folder = Screen::DeleteFolder(Category::Unet);
        assert_eq!(
            folder.on_input("1", &catalog, &files),
            Transition::Run(Action::DeleteFile {
                category: Category::Unet,
                path: PathBuf::from("/m/unet/a.gguf"),
            })
        );
        assert_eq!(folder.on_input("b", &catalog, &files), Transition::Pop);
        assert_eq!(folder.on_input("2", &catalog, &files), Transition::Ignore);
    }

    #[test]
    fn test_workflows_only_screen() {
        let catalog = catalog();
        let pending = Listing::Workflows(vec![catalog.bundles[0].workflow.clone()]);
        assert_eq!(
            Screen::WorkflowsOnly.on_input("1", &catalog, &pending),
            Transition::Run(Action::FetchWorkflow(catalog.bundles[0].workflow.clone()))
        );
        assert_eq!(Screen::WorkflowsOnly.on_input("2", &catalog, &pending), Transition::Pop);
    }

    #[test]
    fn test_patch_screen() {
        let catalog = catalog();
        let none = Listing::None;
        assert_eq!(Screen::Patch.on_input("1", &catalog, &none), Transition::Run(Action::PatchInstall));
        assert_eq!(Screen::Patch.on_input("2", &catalog, &none), Transition::Run(Action::PatchRestore));
        assert_eq!(Screen::Patch.on_input("3", &catalog, &none), Transition::Run(Action::PatchStatus));
        assert_eq!(Screen::Patch.on_input("4", &catalog, &none), Transition::Pop);
    }

    #[test]
    fn test_quant_selection_drops_out_of_range() {
        let catalog = catalog();
        let gguf = catalog.variant("kijai-gguf").unwrap();

        match parse_variant_choice("1 5 99", gguf) {
            VariantChoice::Selected(selected) => {
                assert_eq!(selected.len(), 2);
                assert_eq!(selected[0].file_name, "ltx-2-19b-distilled-Q3_K_M.gguf");
                assert_eq!(selected[1].file_name, "ltx-2-19b-distilled-Q4_K_M.gguf");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_quant_selection_groups_and_cancel() {
        let catalog = catalog();
        let gguf = catalog.variant("kijai-gguf").unwrap();

        let VariantChoice::Selected(all_distilled) = parse_variant_choice("a", gguf) else {
            panic!("expected selection");
        };
        assert_eq!(all_distilled.len(), 12);
        assert!(all_distilled.iter().all(|a| a.file_name.contains("distilled")));

        let VariantChoice::Selected(all_dev) = parse_variant_choice("B", gguf) else {
            panic!("expected selection");
        };
        assert!(all_dev.iter().all(|a| a.file_name.contains("-dev-")));

        assert_eq!(parse_variant_choice("C", gguf), VariantChoice::Cancel);
        assert_eq!(parse_variant_choice("x 0 25", gguf), VariantChoice::Selected(Vec::new()));
    }

    #[test]
    fn test_quant_selection_keeps_duplicates() {
        let catalog = catalog();
        let gguf = catalog.variant("kijai-gguf").unwrap();
        let VariantChoice::Selected(selected) = parse_variant_choice("13 13", gguf) else {
            panic!("expected selection");
        };
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].file_name, "ltx-2-19b-dev-Q3_K_M.gguf");
    }

    #[test]
    fn test_pick_one_choice() {
        let catalog = catalog();
        let diffusion = catalog.variant("kijai-diffusion").unwrap();

        let VariantChoice::Selected(selected) = parse_variant_choice("2", diffusion) else {
            panic!("expected selection");
        };
        assert_eq!(
            selected[0].file_name,
            "ltx-2-19b-dev-fp8_transformer_only.safetensors"
        );
        assert_eq!(parse_variant_choice("3", diffusion), VariantChoice::Cancel);
        assert_eq!(parse_variant_choice("7", diffusion), VariantChoice::Invalid);
        assert_eq!(parse_variant_choice("", diffusion), VariantChoice::Invalid);
    }

    #[test]
    fn test_group_letter() {
        assert_eq!(group_letter(0), 'A');
        assert_eq!(group_letter(2), 'C');
    }
}
