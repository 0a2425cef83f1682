//! Configuration file loading.

use crate::config::Config;
use crate::error::{Error, Result};
use std::path::Path;

/// Load configuration from a TOML file.
///
/// Returns default config if the file does not exist.
pub fn load_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load configuration from the default platform-specific path.
///
/// Returns default config if no config file exists.
pub fn load_default_config() -> Result<Config> {
    super::config_file_path().map_or_else(|_| Ok(Config::default()), |path| load_config_file(&path))
}

/// Save configuration to a TOML file.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::ConfigWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents = toml::to_string_pretty(config).map_err(|e| Error::ConfigSerialize { source: e })?;

    std::fs::write(path, contents).map_err(|e| Error::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::{InferenceDevice, MemoryMode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_nonexistent_file_returns_default() {
        let path = Path::new("/nonexistent/path/config.toml");
        let config = load_config_file(path);
        assert!(config.is_ok());
        let config = config.ok().unwrap();
        assert!(config.models.dir.is_none());
        assert_eq!(config.ldsr.steps, 100);
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[runtime]
device = "cpu"
memory = "medium"

[interrogate]
keep_models_in_memory = true
num_beams = 3

[ldsr]
steps = 50
target_scale = 4.0

[models.clip.vision]
path = "/opt/clip/vision.onnx"
half_path = "/opt/clip/vision.fp16.onnx"
"#
        )
        .unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.runtime.device, InferenceDevice::Cpu);
        assert_eq!(config.runtime.memory, MemoryMode::Medium);
        assert!(config.interrogate.keep_models_in_memory);
        assert_eq!(config.interrogate.num_beams, 3);
        assert_eq!(config.interrogate.max_length, 48);
        assert_eq!(config.ldsr.steps, 50);
        assert_eq!(config.ldsr.target_scale, 4.0);
        assert!(config.models.clip.vision.half_path.is_some());
        assert!(config.models.ldsr.config.url.is_some());
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let config = load_config_file(file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.interrogate.clip_dict_limit = 0;
        config.ldsr.seed = Some(42);
        save_config(&config, &path).unwrap();

        let loaded = load_config_file(&path).unwrap();
        assert_eq!(loaded.interrogate.clip_dict_limit, 0);
        assert_eq!(loaded.ldsr.seed, Some(42));
    }
}
