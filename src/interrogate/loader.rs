//! Loads the ONNX-backed caption and ranking networks.

use super::caption::OnnxCaptioner;
use super::clip::OnnxRanker;
use super::model::ModelLoader;
use crate::config::{ArtifactConfig, BlipModelConfig, ClipModelConfig, Config, Precision};
use crate::error::{Error, Result};
use crate::registry::ensure_artifact;
use crate::runtime::{OnnxModel, Provider};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::info;

/// [`ModelLoader`] reading ONNX graphs from the models directory.
///
/// Artifacts are resolved on each load: a missing half precision variant falls
/// back to the full precision file, and a missing file with a configured URL is
/// downloaded first.
pub struct OnnxLoader {
    blip: BlipModelConfig,
    clip: ClipModelConfig,
    models_dir: PathBuf,
    precision: Precision,
    provider: Provider,
    progress: bool,
}

impl OnnxLoader {
    /// Create a loader for the configured artifacts and execution provider.
    pub fn new(config: &Config, models_dir: &Path, provider: Provider, progress: bool) -> Self {
        Self {
            blip: config.models.blip.clone(),
            clip: config.models.clip.clone(),
            models_dir: models_dir.to_path_buf(),
            precision: config.runtime.precision,
            provider,
            progress,
        }
    }

    fn graph_path(&self, name: &str, artifact: &ArtifactConfig) -> Result<PathBuf> {
        ensure_artifact(name, artifact, &self.models_dir, self.precision, self.progress)
    }

    // Tokenizers have a single variant.
    fn tokenizer_path(&self, name: &str, artifact: &ArtifactConfig) -> Result<PathBuf> {
        ensure_artifact(name, artifact, &self.models_dir, Precision::Full, self.progress)
    }
}

impl ModelLoader for OnnxLoader {
    type Caption = OnnxCaptioner;
    type Ranker = OnnxRanker;

    fn load_caption(&self) -> Result<OnnxCaptioner> {
        info!("Loading BLIP caption model");
        let vision_path = self.graph_path("blip.vision", &self.blip.vision)?;
        let decoder_path = self.graph_path("blip.decoder", &self.blip.decoder)?;
        let tokenizer_path = self.tokenizer_path("blip.tokenizer", &self.blip.tokenizer)?;

        let vision = OnnxModel::open("blip.vision", &vision_path, self.provider)?;
        let decoder = OnnxModel::open("blip.decoder", &decoder_path, self.provider)?;
        let tokenizer = load_tokenizer(&tokenizer_path)?;
        OnnxCaptioner::new(vision, decoder, tokenizer)
    }

    fn load_ranker(&self) -> Result<OnnxRanker> {
        info!("Loading CLIP ranking model");
        let vision_path = self.graph_path("clip.vision", &self.clip.vision)?;
        let text_path = self.graph_path("clip.text", &self.clip.text)?;
        let tokenizer_path = self.tokenizer_path("clip.tokenizer", &self.clip.tokenizer)?;

        let vision = OnnxModel::open("clip.vision", &vision_path, self.provider)?;
        let text = OnnxModel::open("clip.text", &text_path, self.provider)?;
        let tokenizer = load_tokenizer(&tokenizer_path)?;
        OnnxRanker::new(vision, text, tokenizer)
    }
}

/// Load a `tokenizer.json`.
pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    if !path.is_file() {
        return Err(Error::ModelFileNotFound {
            path: path.to_path_buf(),
        });
    }
    Tokenizer::from_file(path).map_err(|e| Error::Tokenizer {
        reason: format!("{}: {e}", path.display()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn half_config() -> Config {
        let mut config = Config::default();
        config.runtime.precision = Precision::Half;
        config.models.blip.vision = ArtifactConfig {
            half_path: Some("blip/vision_encoder.fp16.onnx".into()),
            ..ArtifactConfig::local("blip/vision_encoder.onnx")
        };
        config
    }

    #[test]
    fn test_half_graph_used_when_present() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("blip")).unwrap();
        std::fs::write(tmp.path().join("blip/vision_encoder.fp16.onnx"), b"half").unwrap();
        std::fs::write(tmp.path().join("blip/vision_encoder.onnx"), b"full").unwrap();

        let config = half_config();
        let loader = OnnxLoader::new(&config, tmp.path(), Provider::Cpu, false);
        let path = loader
            .graph_path("blip.vision", &config.models.blip.vision)
            .unwrap();
        assert_eq!(path, tmp.path().join("blip/vision_encoder.fp16.onnx"));
    }

    #[test]
    fn test_missing_half_graph_falls_back_to_full() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("blip")).unwrap();
        std::fs::write(tmp.path().join("blip/vision_encoder.onnx"), b"full").unwrap();

        let config = half_config();
        let loader = OnnxLoader::new(&config, tmp.path(), Provider::Cpu, false);
        let path = loader
            .graph_path("blip.vision", &config.models.blip.vision)
            .unwrap();
        assert_eq!(path, tmp.path().join("blip/vision_encoder.onnx"));

        // The vision graph resolves through the fallback; loading stops at the
        // next missing artifact.
        match loader.load_caption() {
            Err(Error::ModelFileNotFound { path }) => {
                assert_eq!(path, tmp.path().join("blip/text_decoder.onnx"));
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("caption model should not load"),
        }
    }

    #[test]
    fn test_loader_reports_missing_files() {
        let tmp = TempDir::new().unwrap();
        let loader = OnnxLoader::new(&Config::default(), tmp.path(), Provider::Cpu, false);
        assert!(matches!(
            loader.load_caption(),
            Err(Error::ModelFileNotFound { .. })
        ));
        assert!(matches!(
            loader.load_ranker(),
            Err(Error::ModelFileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_tokenizer_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tokenizer.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_tokenizer(&path), Err(Error::Tokenizer { .. })));
    }
}
