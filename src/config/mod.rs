//! Configuration loading and management.

mod file;
mod paths;
mod types;
mod validate;

pub use file::{load_config_file, load_default_config, save_config};
pub use paths::{config_dir, config_file_path, models_dir};
pub use types::{
    ArtifactConfig, BlipModelConfig, ClipModelConfig, Config, InferenceDevice, InterrogateConfig,
    Interpolation, LdsrConfig, LdsrModelConfig, MemoryMode, ModelsConfig, Precision,
    RuntimeConfig,
};
pub use validate::{validate_config, validate_interrogate, validate_ldsr};
