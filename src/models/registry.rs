use crate::error::{ManagerError, Result};
use crate::models::layout::{Category, Layout};
use reqwest::Url;
use std::collections::HashSet;
use std::path::Path;

const LIGHTRICKS: &str = "https://huggingface.co/Lightricks/LTX-2/resolve/main";
const LIGHTRICKS_DETAILER: &str =
    "https://huggingface.co/Lightricks/LTX-2-19b-IC-LoRA-Detailer/resolve/main";
const COMFY_ORG: &str = "https://huggingface.co/Comfy-Org/ltx-2/resolve/main/split_files";
const KIJAI: &str = "https://huggingface.co/Kijai/LTXV2_comfy/resolve/main";
const GGUF_BASE: &str = "https://huggingface.co/vantagewithai/LTX-2-GGUF/resolve/main";
const WORKFLOW_BASE: &str =
    "https://raw.githubusercontent.com/gjnave/cogni-scripts/refs/heads/main/workflows/ltx-2";

/// Quantization levels published for each GGUF family
pub const QUANT_LEVELS: &[&str] = &[
    "Q3_K_M", "Q3_K_S", "Q4_0", "Q4_1", "Q4_K_M", "Q4_K_S", "Q5_0", "Q5_1", "Q5_K_M", "Q5_K_S",
    "Q6_K", "Q8_0",
];

/// One model file: where it goes and where it comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub file_name: String,
    pub category: Category,
    pub url: String,
}

impl AssetEntry {
    pub fn new(file_name: impl Into<String>, category: Category, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            category,
            url: url.into(),
        }
    }
}

/// ComfyUI workflow descriptor, always stored in the workflows folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowFile {
    pub file_name: String,
    pub url: String,
}

impl WorkflowFile {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
        }
    }
}

/// Named set of model files installed together with one workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub key: String,
    pub name: String,
    pub assets: Vec<AssetEntry>,
    pub workflow: WorkflowFile,
}

/// How many options of a variant set the operator picks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// Exactly one option
    One,
    /// Any number of options, by index list or whole group
    Many,
}

/// Alternative files sharing a role, e.g. all "dev" quantizations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantGroup {
    pub label: String,
    pub options: Vec<AssetEntry>,
}

/// Selectable variants plus the files every selection needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSet {
    pub key: String,
    pub name: String,
    pub pick: Pick,
    /// Folder all options install into
    pub category: Category,
    /// Status row shown for the variant slot
    pub placeholder: String,
    pub groups: Vec<VariantGroup>,
    pub common: Vec<AssetEntry>,
    pub workflows: Vec<WorkflowFile>,
}

impl VariantSet {
    /// Every option across groups, in menu order
    pub fn options(&self) -> impl Iterator<Item = &AssetEntry> {
        self.groups.iter().flat_map(|g| g.options.iter())
    }
}

/// Read-only catalog of everything the manager can install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub bundles: Vec<Bundle>,
    pub variants: Vec<VariantSet>,
}

impl Catalog {
    /// The LTX-2 workflows and models
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            bundles: builtin_bundles(),
            variants: builtin_variants(),
        }
    }

    /// Find bundle by key
    #[must_use]
    pub fn bundle(&self, key: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.key == key)
    }

    /// Find variant set by key
    #[must_use]
    pub fn variant(&self, key: &str) -> Option<&VariantSet> {
        self.variants.iter().find(|v| v.key == key)
    }

    /// Every workflow file, bundles first, without duplicate file names
    #[must_use]
    pub fn all_workflows(&self) -> Vec<&WorkflowFile> {
        let mut seen = HashSet::new();
        self.bundles
            .iter()
            .map(|b| &b.workflow)
            .chain(self.variants.iter().flat_map(|v| v.workflows.iter()))
            .filter(|wf| seen.insert(wf.file_name.as_str()))
            .collect()
    }

    /// Check the catalog against the folder layout before anything runs
    pub fn validate(&self, layout: &Layout) -> Result<()> {
        for bundle in &self.bundles {
            if bundle.assets.is_empty() {
                return Err(ManagerError::Config(format!(
                    "Bundle '{}' has no model files",
                    bundle.key
                )));
            }
            for asset in &bundle.assets {
                check_asset(asset, layout, &bundle.key)?;
            }
            check_file(&bundle.workflow.file_name, &bundle.workflow.url, &bundle.key)?;
        }

        for set in &self.variants {
            if set.options().next().is_none() {
                return Err(ManagerError::Config(format!(
                    "Variant set '{}' has no options",
                    set.key
                )));
            }
            if !layout.has_folder(set.category) {
                return Err(ManagerError::Config(format!(
                    "Variant set '{}' targets unknown category '{}'",
                    set.key, set.category
                )));
            }
            for option in set.options() {
                if option.category != set.category {
                    return Err(ManagerError::Config(format!(
                        "Variant '{}' in '{}' must install into '{}'",
                        option.file_name, set.key, set.category
                    )));
                }
                check_asset(option, layout, &set.key)?;
            }
            for asset in &set.common {
                check_asset(asset, layout, &set.key)?;
            }
            for wf in &set.workflows {
                check_file(&wf.file_name, &wf.url, &set.key)?;
            }
        }

        Ok(())
    }
}

fn check_asset(asset: &AssetEntry, layout: &Layout, owner: &str) -> Result<()> {
    if !layout.has_folder(asset.category) {
        return Err(ManagerError::Config(format!(
            "'{}' in '{owner}' references unknown category '{}'",
            asset.file_name, asset.category
        )));
    }
    check_file(&asset.file_name, &asset.url, owner)
}

fn check_file(file_name: &str, url: &str, owner: &str) -> Result<()> {
    let path = Path::new(file_name);
    if path.extension().is_none() || path.components().count() != 1 {
        return Err(ManagerError::Config(format!(
            "'{file_name}' in '{owner}' must be a plain file name with an extension"
        )));
    }

    let parsed = Url::parse(url).map_err(|e| {
        ManagerError::Config(format!("'{file_name}' in '{owner}' has invalid URL '{url}': {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ManagerError::Config(format!(
            "'{file_name}' in '{owner}' must use an http(s) URL"
        )));
    }

    Ok(())
}

fn workflow(file_name: &str, url_path: &str) -> WorkflowFile {
    WorkflowFile::new(file_name, format!("{WORKFLOW_BASE}/{url_path}"))
}

fn builtin_bundles() -> Vec<Bundle> {
    use Category::{
        Checkpoints, DiffusionModels, LatentUpscaleModels, Loras, TextEncoders, Vae,
    };

    // I2V and T2V share the same models
    let video_assets = || {
        vec![
            AssetEntry::new(
                "ltx-2-19b-dev-fp8.safetensors",
                DiffusionModels,
                format!("{LIGHTRICKS}/ltx-2-19b-dev-fp8.safetensors"),
            ),
            AssetEntry::new(
                "gemma_3_12B_it.safetensors",
                TextEncoders,
                format!("{COMFY_ORG}/text_encoders/gemma_3_12B_it.safetensors"),
            ),
            AssetEntry::new(
                "ltx-2-19b-lora-camera-control-dolly-left.safetensors",
                Loras,
                format!("{COMFY_ORG}/loras/ltx-2-19b-lora-camera-control-dolly-left.safetensors"),
            ),
            AssetEntry::new(
                "ltx-2-19b-distilled-lora-384.safetensors",
                Loras,
                format!("{COMFY_ORG}/loras/ltx-2-19b-distilled-lora-384.safetensors"),
            ),
            AssetEntry::new(
                "ltx-2-spatial_upscaler-x2-1.0.safetensors",
                LatentUpscaleModels,
                format!("{LIGHTRICKS}/ltx-2-spatial-upscaler-x2-1.0.safetensors"),
            ),
        ]
    };

    vec![
        Bundle {
            key: "itv".to_string(),
            name: "I2V (Image to Video)".to_string(),
            assets: video_assets(),
            workflow: workflow("video_ltx2_i2v.json", "video_ltx2_i2v.json"),
        },
        Bundle {
            key: "t2v".to_string(),
            name: "T2V (Text to Video)".to_string(),
            assets: video_assets(),
            workflow: workflow("video_ltx2_t2v.json", "video_ltx2_t2v.json"),
        },
        Bundle {
            key: "v2v".to_string(),
            name: "V2V Detailer (Video Enhancement)".to_string(),
            assets: vec![
                AssetEntry::new(
                    "ltx-2-19b-dev.safetensors",
                    Checkpoints,
                    format!("{LIGHTRICKS}/ltx-2-19b-dev-fp8.safetensors"),
                ),
                AssetEntry::new(
                    "ltx-2-19b-ic-lora-detailer.safetensors",
                    Loras,
                    format!("{LIGHTRICKS_DETAILER}/ltx-2-19b-ic-lora-detailer.safetensors"),
                ),
                AssetEntry::new(
                    "gemma_3_12B_it_fp8_e4m3fn.safetensors",
                    TextEncoders,
                    "https://huggingface.co/GitMylo/LTX-2-comfy_gemma_fp8_e4m3fn/resolve/main/gemma_3_12B_it_fp8_e4m3fn.safetensors",
                ),
                AssetEntry::new(
                    "ltx-2-19b-dev.safetensors",
                    TextEncoders,
                    format!("{LIGHTRICKS}/ltx-2-19b-dev.safetensors"),
                ),
            ],
            workflow: workflow("LTX-2_V2V_Detailer.json", "LTX-2_V2V_Detailer.json"),
        },
        Bundle {
            key: "infinity".to_string(),
            name: "LTX-Infinity (Extended Generation)".to_string(),
            assets: vec![
                AssetEntry::new(
                    "ltx-2-19b-dev-fp8.safetensors",
                    Checkpoints,
                    format!("{LIGHTRICKS}/ltx-2-19b-dev-fp8.safetensors"),
                ),
                AssetEntry::new(
                    "gemma_3_12B_it.safetensors",
                    TextEncoders,
                    format!("{COMFY_ORG}/text_encoders/gemma_3_12B_it.safetensors"),
                ),
                AssetEntry::new(
                    "ltx-2-19b-ic-lora-detailer.safetensors",
                    Loras,
                    format!(
                        "{LIGHTRICKS_DETAILER}/ltx-2-19b-ic-lora-detailer.safetensors?download=true"
                    ),
                ),
                AssetEntry::new(
                    "ltx-2-19b-distilled-lora-384.safetensors",
                    Loras,
                    format!("{LIGHTRICKS}/ltx-2-19b-distilled-lora-384.safetensors"),
                ),
            ],
            workflow: workflow("LTX-Infinity__v0.5.7.json", "LTX-Infinity__v0.5.7.json"),
        },
        Bundle {
            key: "lipsync".to_string(),
            name: "LTX2 Lipsync (Audio Sync)".to_string(),
            assets: vec![
                AssetEntry::new(
                    "ltx-2-19b-dev-fp8_transformer_only.safetensors",
                    Checkpoints,
                    format!(
                        "{KIJAI}/diffusion_models/ltx-2-19b-dev-fp8_transformer_only.safetensors?download=true"
                    ),
                ),
                AssetEntry::new(
                    "LTX2_video_vae_bf16.safetensors",
                    Vae,
                    format!("{KIJAI}/VAE/LTX2_video_vae_bf16.safetensors"),
                ),
                AssetEntry::new(
                    "LTX2_audio_vae_bf16.safetensors",
                    Vae,
                    format!("{KIJAI}/VAE/LTX2_audio_vae_bf16.safetensors"),
                ),
                AssetEntry::new(
                    "gemma_3_12B_it_fp8_scaled.safetensors",
                    TextEncoders,
                    format!("{COMFY_ORG}/text_encoders/gemma_3_12B_it_fp8_scaled.safetensors"),
                ),
                AssetEntry::new(
                    "ltx-2-19b-embeddings_connector_distill_bf16.safetensors",
                    TextEncoders,
                    format!(
                        "{KIJAI}/text_encoders/ltx-2-19b-embeddings_connector_distill_bf16.safetensors"
                    ),
                ),
                AssetEntry::new(
                    "MelBandRoformer_fp16.safetensors",
                    DiffusionModels,
                    "https://huggingface.co/Kijai/MelBandRoFormer_comfy/resolve/main/MelBandRoformer_fp16.safetensors",
                ),
                AssetEntry::new(
                    "ltx-2-19b-ic-lora-detailer.safetensors",
                    Loras,
                    format!(
                        "{LIGHTRICKS_DETAILER}/ltx-2-19b-ic-lora-detailer.safetensors?download=true"
                    ),
                ),
                AssetEntry::new(
                    "ltx-2-19b-distilled-lora-384.safetensors",
                    Loras,
                    format!("{LIGHTRICKS}/ltx-2-19b-distilled-lora-384.safetensors"),
                ),
                AssetEntry::new(
                    "HeroCam_LTX2_bucket113_step_1500.safetensors",
                    Loras,
                    "https://huggingface.co/Nebsh/LTX2_Herocam_Lora/resolve/main/HeroCam_LTX2_bucket113_step_1500.safetensors?download=true",
                ),
            ],
            workflow: workflow("LTX2 - Lipsync.json", "LTX2%20-%20Lipsync.json"),
        },
    ]
}

fn kijai_common() -> Vec<AssetEntry> {
    vec![
        AssetEntry::new(
            "gemma_3_12B_it_fp8_scaled.safetensors",
            Category::TextEncoders,
            format!("{COMFY_ORG}/text_encoders/gemma_3_12B_it_fp8_scaled.safetensors"),
        ),
        AssetEntry::new(
            "ltx-2-19b-embeddings_connector_distill_bf16.safetensors",
            Category::TextEncoders,
            format!("{KIJAI}/text_encoders/ltx-2-19b-embeddings_connector_distill_bf16.safetensors"),
        ),
        AssetEntry::new(
            "LTX2_video_vae_bf16_KJ.safetensors",
            Category::Vae,
            format!("{KIJAI}/VAE/LTX2_video_vae_bf16.safetensors"),
        ),
        AssetEntry::new(
            "LTX2_audio_vae_bf16.safetensors",
            Category::Vae,
            format!("{KIJAI}/VAE/LTX2_audio_vae_bf16.safetensors"),
        ),
    ]
}

fn kijai_workflows() -> Vec<WorkflowFile> {
    vec![
        workflow(
            "LTX-2 - Kijai-I2V Basic.json",
            "LTX-2%20-%20Kijai-I2V%20Basic.json",
        ),
        workflow(
            "LTX-2 - Kijai - I2V Basic 2nd pass upscale.json",
            "LTX-2%20-%20Kijai%20-%20I2V%20Basic%202nd%20pass%20upscale.json",
        ),
    ]
}

fn gguf_group(label: &str, family: &str) -> VariantGroup {
    VariantGroup {
        label: label.to_string(),
        options: QUANT_LEVELS
            .iter()
            .map(|level| {
                let file_name = format!("ltx-2-19b-{family}-{level}.gguf");
                let url = format!("{GGUF_BASE}/{family}/{file_name}");
                AssetEntry::new(file_name, Category::Unet, url)
            })
            .collect(),
    }
}

fn builtin_variants() -> Vec<VariantSet> {
    vec![
        VariantSet {
            key: "kijai-diffusion".to_string(),
            name: "I2V Basic (Kijai) - Diffusion Models".to_string(),
            pick: Pick::One,
            category: Category::DiffusionModels,
            placeholder: "Diffusion model (choose one)".to_string(),
            groups: vec![VariantGroup {
                label: "Diffusion model".to_string(),
                options: vec![
                    AssetEntry::new(
                        "ltx-2-19b-phr00tmerge-nsfw-v3.safetensors",
                        Category::DiffusionModels,
                        "https://huggingface.co/Phr00t/LTX2-Rapid-Merges/resolve/main/nsfw/ltx-2-19b-phr00tmerge-nsfw-v3.safetensors",
                    ),
                    AssetEntry::new(
                        "ltx-2-19b-dev-fp8_transformer_only.safetensors",
                        Category::DiffusionModels,
                        format!(
                            "{KIJAI}/diffusion_models/ltx-2-19b-dev-fp8_transformer_only.safetensors"
                        ),
                    ),
                ],
            }],
            common: kijai_common(),
            workflows: kijai_workflows(),
        },
        VariantSet {
            key: "kijai-gguf".to_string(),
            name: "I2V Basic (Kijai) - GGUF (Quantized)".to_string(),
            pick: Pick::Many,
            category: Category::Unet,
            placeholder: "GGUF models (choose at least one)".to_string(),
            groups: vec![
                gguf_group("Distilled", "distilled"),
                gguf_group("Dev", "dev"),
            ],
            common: kijai_common(),
            workflows: kijai_workflows(),
        },
    ]
}
