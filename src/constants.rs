//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config paths.
pub const APP_NAME: &str = "vista";

/// Marker appended to an interrogation result when inference fails.
pub const ERROR_MARKER: &str = "<error>";

/// Separator placed between caption and tags.
pub const TAG_SEPARATOR: &str = ", ";

/// CLIP image normalization constants (also used by BLIP).
pub mod normalize {
    /// Per-channel mean.
    pub const MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

    /// Per-channel standard deviation.
    pub const STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_1];
}

/// Interrogation defaults and model constants.
pub mod interrogate {
    /// BLIP input resolution.
    pub const BLIP_IMAGE_SIZE: u32 = 384;

    /// CLIP ViT-L/14 input resolution.
    pub const CLIP_IMAGE_SIZE: u32 = 224;

    /// CLIP text context length.
    pub const CLIP_CONTEXT_LENGTH: usize = 77;

    /// Logit scale applied to cosine similarities before softmax.
    pub const CLIP_LOGIT_SCALE: f32 = 100.0;

    /// Prompt prepended to BLIP generation and stripped from the caption.
    pub const BLIP_PROMPT: &str = "a picture of ";

    /// Default beam count.
    pub const DEFAULT_NUM_BEAMS: usize = 1;

    /// Default minimum caption length in tokens.
    pub const DEFAULT_MIN_LENGTH: usize = 24;

    /// Default maximum caption length in tokens.
    pub const DEFAULT_MAX_LENGTH: usize = 48;

    /// Default cap on the number of labels ranked per category (0 = unlimited).
    pub const DEFAULT_CLIP_DICT_LIMIT: usize = 1500;

    /// Top-N used when a category filename carries no `.topN.` marker.
    pub const DEFAULT_TOPN: usize = 1;

    /// Prefix applied to artist names before ranking.
    pub const ARTIST_PREFIX: &str = "by ";
}

/// LDSR upscaler constants.
pub mod ldsr {
    /// Native upscaling factor of the latent diffusion model.
    pub const NATIVE_SCALE: f32 = 4.0;

    /// Default number of diffusion steps.
    pub const DEFAULT_STEPS: usize = 100;

    /// Default target scale.
    pub const DEFAULT_TARGET_SCALE: f32 = 2.0;

    /// DDIM eta (1.0 = fully stochastic).
    pub const DEFAULT_ETA: f32 = 1.0;

    /// Tile kernel size in latent pixels.
    pub const TILE_KERNEL: usize = 128;

    /// Tile stride in latent pixels.
    pub const TILE_STRIDE: usize = 64;

    /// First stage (VQ) downsampling factor.
    pub const FIRST_STAGE_FACTOR: usize = 4;

    /// Lower clip for patch border weights.
    pub const CLIP_MIN_WEIGHT: f32 = 0.01;

    /// Upper clip for patch border weights.
    pub const CLIP_MAX_WEIGHT: f32 = 0.5;

    /// A `project.yaml` at least this large is a mis-download and gets removed.
    pub const MAX_CONFIG_BYTES: u64 = 10 * 1024 * 1024;

    /// Upstream location of the LDSR model configuration.
    pub const CONFIG_URL: &str = "https://heibox.uni-heidelberg.de/f/31a76b13ea27482981b4/?dl=1";

    /// Suffix added to upscaled output files.
    pub const OUTPUT_SUFFIX: &str = ".ldsr.png";
}

/// Model artifact file names inside the models directory.
pub mod artifacts {
    /// BLIP vision encoder.
    pub const BLIP_VISION: &str = "blip/vision_encoder.onnx";
    /// BLIP text decoder.
    pub const BLIP_DECODER: &str = "blip/text_decoder.onnx";
    /// BLIP tokenizer.
    pub const BLIP_TOKENIZER: &str = "blip/tokenizer.json";
    /// CLIP vision encoder with projection.
    pub const CLIP_VISION: &str = "clip/vision_model.onnx";
    /// CLIP text encoder with projection.
    pub const CLIP_TEXT: &str = "clip/text_model.onnx";
    /// CLIP tokenizer.
    pub const CLIP_TOKENIZER: &str = "clip/tokenizer.json";
    /// LDSR denoising U-Net.
    pub const LDSR_UNET: &str = "ldsr/unet.onnx";
    /// LDSR first stage decoder.
    pub const LDSR_DECODER: &str = "ldsr/first_stage_decoder.onnx";
    /// LDSR model configuration.
    pub const LDSR_CONFIG: &str = "ldsr/project.yaml";
    /// Default directory of category files.
    pub const CATEGORIES_DIR: &str = "interrogate";
    /// Default artist database.
    pub const ARTISTS_FILE: &str = "artists.csv";
}

/// Image file extensions accepted as inputs.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff"];
