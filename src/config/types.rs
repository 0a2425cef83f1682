//! Configuration type definitions.

use crate::constants::{artifacts, interrogate, ldsr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runtime (device, precision, memory) settings.
    pub runtime: RuntimeConfig,

    /// Interrogator settings.
    pub interrogate: InterrogateConfig,

    /// LDSR upscaler settings.
    pub ldsr: LdsrConfig,

    /// Model artifact locations.
    pub models: ModelsConfig,
}

/// Inference device configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InferenceDevice {
    /// Automatically select (GPU if available, else CPU).
    #[default]
    Auto,
    /// Best available GPU provider, CPU fallback with a warning.
    Gpu,
    /// Force CPU inference.
    Cpu,
    /// NVIDIA CUDA.
    Cuda,
    /// NVIDIA `TensorRT`.
    #[serde(rename = "tensorrt")]
    #[value(name = "tensorrt")]
    TensorRt,
    /// Windows `DirectML`.
    #[serde(rename = "directml")]
    #[value(name = "directml")]
    DirectMl,
    /// Apple `CoreML`.
    #[serde(rename = "coreml")]
    #[value(name = "coreml")]
    CoreMl,
    /// AMD `ROCm`.
    Rocm,
    /// Intel `OpenVINO`.
    #[serde(rename = "openvino")]
    #[value(name = "openvino")]
    OpenVino,
}

/// Numeric precision of model weights.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit floats.
    Full,
    /// 16-bit floats.
    #[default]
    Half,
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "fp32"),
            Self::Half => write!(f, "fp16"),
        }
    }
}

/// Accelerator memory pressure mode.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// No special handling.
    #[default]
    Normal,
    /// Offload resident models before interrogating.
    Medium,
    /// Offload resident models before interrogating.
    Low,
}

impl MemoryMode {
    /// Whether this mode asks for everything to be offloaded before a new load.
    pub fn is_constrained(self) -> bool {
        matches!(self, Self::Medium | Self::Low)
    }
}

/// Runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Device to use for inference.
    pub device: InferenceDevice,

    /// Requested model precision.
    pub precision: Precision,

    /// Memory pressure mode.
    pub memory: MemoryMode,
}

/// Interrogator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterrogateConfig {
    /// Keep caption and ranking models on the accelerator between calls.
    pub keep_models_in_memory: bool,

    /// Maximum number of labels ranked per category (0 = unlimited).
    pub clip_dict_limit: usize,

    /// Beam count for caption generation.
    pub num_beams: usize,

    /// Minimum caption length in tokens.
    pub min_length: usize,

    /// Maximum caption length in tokens.
    pub max_length: usize,

    /// Rank the artist database and append the best match.
    pub use_builtin_artists: bool,

    /// Directory of category files (`name.topN.txt`).
    pub categories_dir: Option<PathBuf>,

    /// Artist database CSV (`artist,score,category`).
    pub artists_file: Option<PathBuf>,
}

impl Default for InterrogateConfig {
    fn default() -> Self {
        Self {
            keep_models_in_memory: false,
            clip_dict_limit: interrogate::DEFAULT_CLIP_DICT_LIMIT,
            num_beams: interrogate::DEFAULT_NUM_BEAMS,
            min_length: interrogate::DEFAULT_MIN_LENGTH,
            max_length: interrogate::DEFAULT_MAX_LENGTH,
            use_builtin_artists: true,
            categories_dir: None,
            artists_file: None,
        }
    }
}

/// Resampling filter used when shrinking the input before LDSR.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Nearest neighbour.
    Nearest,
    /// Bilinear.
    Bilinear,
    /// Bicubic (Catmull-Rom).
    Bicubic,
    /// Lanczos with window 3.
    #[default]
    Lanczos,
}

impl Interpolation {
    /// Matching `image` crate filter.
    pub fn filter(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
            Self::Bicubic => FilterType::CatmullRom,
            Self::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Bicubic => write!(f, "bicubic"),
            Self::Lanczos => write!(f, "lanczos"),
        }
    }
}

/// LDSR upscaler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdsrConfig {
    /// Number of DDIM steps.
    pub steps: usize,

    /// Target upscale factor.
    pub target_scale: f32,

    /// Filter used to pre-shrink the input.
    pub downsample: Interpolation,

    /// DDIM eta.
    pub eta: f32,

    /// Seed for the initial noise (random when unset).
    pub seed: Option<u64>,
}

impl Default for LdsrConfig {
    fn default() -> Self {
        Self {
            steps: ldsr::DEFAULT_STEPS,
            target_scale: ldsr::DEFAULT_TARGET_SCALE,
            downsample: Interpolation::default(),
            eta: ldsr::DEFAULT_ETA,
            seed: None,
        }
    }
}

/// Location of a single model artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactConfig {
    /// File path, relative paths resolve against the models directory.
    pub path: PathBuf,

    /// Optional half precision variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_path: Option<PathBuf>,

    /// Download URL used when the file is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Expected SHA-256 of the downloaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ArtifactConfig {
    /// Artifact with a local path only.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            half_path: None,
            url: None,
            sha256: None,
        }
    }

    /// Absolute path of the artifact for the requested precision.
    ///
    /// Falls back to the full precision file when no half variant is configured.
    pub fn resolve(&self, models_dir: &Path, precision: crate::config::Precision) -> PathBuf {
        let path = match (precision, &self.half_path) {
            (crate::config::Precision::Half, Some(half)) => half,
            _ => &self.path,
        };
        if path.is_absolute() {
            path.clone()
        } else {
            models_dir.join(path)
        }
    }
}

/// BLIP caption model artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlipModelConfig {
    /// Vision encoder graph.
    pub vision: ArtifactConfig,
    /// Text decoder graph.
    pub decoder: ArtifactConfig,
    /// Tokenizer definition.
    pub tokenizer: ArtifactConfig,
}

impl Default for BlipModelConfig {
    fn default() -> Self {
        Self {
            vision: ArtifactConfig::local(artifacts::BLIP_VISION),
            decoder: ArtifactConfig::local(artifacts::BLIP_DECODER),
            tokenizer: ArtifactConfig::local(artifacts::BLIP_TOKENIZER),
        }
    }
}

/// CLIP ranking model artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipModelConfig {
    /// Vision encoder graph.
    pub vision: ArtifactConfig,
    /// Text encoder graph.
    pub text: ArtifactConfig,
    /// Tokenizer definition.
    pub tokenizer: ArtifactConfig,
}

impl Default for ClipModelConfig {
    fn default() -> Self {
        Self {
            vision: ArtifactConfig::local(artifacts::CLIP_VISION),
            text: ArtifactConfig::local(artifacts::CLIP_TEXT),
            tokenizer: ArtifactConfig::local(artifacts::CLIP_TOKENIZER),
        }
    }
}

/// LDSR model artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdsrModelConfig {
    /// Denoising U-Net graph.
    pub unet: ArtifactConfig,
    /// First stage decoder graph.
    pub decoder: ArtifactConfig,
    /// `project.yaml` model configuration.
    pub config: ArtifactConfig,
}

impl Default for LdsrModelConfig {
    fn default() -> Self {
        Self {
            unet: ArtifactConfig::local(artifacts::LDSR_UNET),
            decoder: ArtifactConfig::local(artifacts::LDSR_DECODER),
            config: ArtifactConfig {
                url: Some(ldsr::CONFIG_URL.to_string()),
                ..ArtifactConfig::local(artifacts::LDSR_CONFIG)
            },
        }
    }
}

/// Model artifact configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Base directory for relative artifact paths (platform data dir when unset).
    pub dir: Option<PathBuf>,

    /// BLIP caption model.
    pub blip: BlipModelConfig,

    /// CLIP ranking model.
    pub clip: ClipModelConfig,

    /// LDSR diffusion model.
    pub ldsr: LdsrModelConfig,
}

impl ModelsConfig {
    /// All artifacts with a short display name.
    pub fn artifacts(&self) -> Vec<(&'static str, &ArtifactConfig)> {
        vec![
            ("blip.vision", &self.blip.vision),
            ("blip.decoder", &self.blip.decoder),
            ("blip.tokenizer", &self.blip.tokenizer),
            ("clip.vision", &self.clip.vision),
            ("clip.text", &self.clip.text),
            ("clip.tokenizer", &self.clip.tokenizer),
            ("ldsr.unet", &self.ldsr.unet),
            ("ldsr.decoder", &self.ldsr.decoder),
            ("ldsr.config", &self.ldsr.config),
        ]
    }
}
