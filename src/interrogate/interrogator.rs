//! Caption plus ranked tags for an image.

use super::artists::Artist;
use super::category::Category;
use super::model::{CaptionModel, CaptionParams, ModelLoader, RankingModel};
use super::rank::{l2_normalize_rows, similarity, top_labels};
use crate::config::{Config, Precision};
use crate::constants::interrogate::ARTIST_PREFIX;
use crate::constants::{ERROR_MARKER, TAG_SEPARATOR};
use crate::error::{Error, Result};
use crate::runtime::{Placeable, ResidencyPolicy};
use image::DynamicImage;
use ndarray::Array2;
use std::time::Instant;
use tracing::{debug, error, info};

/// Interrogation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterrogateSettings {
    /// Caption decoding parameters.
    pub caption: CaptionParams,
    /// Maximum number of labels ranked per list (0 = unlimited).
    pub clip_dict_limit: usize,
    /// Rank the artist database.
    pub use_builtin_artists: bool,
    /// When models leave the device.
    pub residency: ResidencyPolicy,
}

impl InterrogateSettings {
    /// Settings from the application config.
    pub fn from_config(config: &Config) -> Self {
        let interrogate = &config.interrogate;
        Self {
            caption: CaptionParams {
                num_beams: interrogate.num_beams,
                min_length: interrogate.min_length,
                max_length: interrogate.max_length,
            },
            clip_dict_limit: interrogate.clip_dict_limit,
            use_builtin_artists: interrogate.use_builtin_artists,
            residency: ResidencyPolicy::new(
                interrogate.keep_models_in_memory,
                config.runtime.memory,
            ),
        }
    }
}

/// Produces `"caption, tag, tag"` strings for images.
///
/// Networks are created on first use and kept in host memory between calls;
/// the residency policy decides whether they also stay on the device.
pub struct Interrogator<L: ModelLoader> {
    loader: L,
    categories: Vec<Category>,
    artists: Vec<Artist>,
    settings: InterrogateSettings,
    caption_model: Option<L::Caption>,
    ranking_model: Option<L::Ranker>,
    precision: Option<Precision>,
}

impl<L: ModelLoader> Interrogator<L> {
    /// Create an interrogator. No model is loaded yet.
    pub fn new(
        categories: Vec<Category>,
        artists: Vec<Artist>,
        settings: InterrogateSettings,
        loader: L,
    ) -> Self {
        Self {
            loader,
            categories,
            artists,
            settings,
            caption_model: None,
            ranking_model: None,
            precision: None,
        }
    }

    /// Label categories in ranking order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Precision of the ranking network, once loaded.
    pub fn precision(&self) -> Option<Precision> {
        self.precision
    }

    /// Caption network, if it has been created.
    pub fn caption_model(&self) -> Option<&L::Caption> {
        self.caption_model.as_ref()
    }

    /// Ranking network, if it has been created.
    pub fn ranking_model(&self) -> Option<&L::Ranker> {
        self.ranking_model.as_ref()
    }

    /// Create missing networks and place both on the device.
    pub fn load(&mut self) -> Result<()> {
        if self.caption_model.is_none() {
            self.caption_model = Some(self.loader.load_caption()?);
        }
        if let Some(model) = self.caption_model.as_mut() {
            model.move_to_device()?;
        }

        if self.ranking_model.is_none() {
            self.ranking_model = Some(self.loader.load_ranker()?);
        }
        if let Some(model) = self.ranking_model.as_mut() {
            model.move_to_device()?;
            self.precision = Some(model.precision());
        }
        Ok(())
    }

    fn caption_mut(&mut self) -> Result<&mut L::Caption> {
        self.caption_model.as_mut().ok_or_else(|| Error::Internal {
            message: "caption model not loaded".to_string(),
        })
    }

    fn ranker_mut(&mut self) -> Result<&mut L::Ranker> {
        self.ranking_model.as_mut().ok_or_else(|| Error::Internal {
            message: "ranking model not loaded".to_string(),
        })
    }

    /// Caption an image. Requires [`Self::load`].
    pub fn generate_caption(&mut self, image: &DynamicImage) -> Result<String> {
        let params = self.settings.caption;
        let start = Instant::now();
        let caption = self.caption_mut()?.caption(image, params)?;
        debug!("Caption generated in {:.2?}: {caption}", start.elapsed());
        Ok(caption)
    }

    /// Row-normalized image embeddings. Requires [`Self::load`].
    pub fn image_features(&mut self, image: &DynamicImage) -> Result<Array2<f32>> {
        let mut features = self.ranker_mut()?.encode_image(image)?;
        l2_normalize_rows(&mut features);
        Ok(features)
    }

    /// Best `top_count` labels for the image, scores in percent.
    ///
    /// Only the first `clip_dict_limit` texts are considered when the limit is set.
    pub fn rank(
        &mut self,
        image_features: &Array2<f32>,
        texts: &[String],
        top_count: usize,
    ) -> Result<Vec<(String, f32)>> {
        let limit = self.settings.clip_dict_limit;
        let texts = if limit != 0 && texts.len() > limit {
            &texts[..limit]
        } else {
            texts
        };
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let top_count = top_count.min(texts.len());

        let mut text_features = self.ranker_mut()?.encode_text(texts)?;
        l2_normalize_rows(&mut text_features);
        let scores = similarity(image_features, &text_features);
        Ok(top_labels(texts, &scores, top_count))
    }

    /// Caption and tags for an image. Never fails.
    ///
    /// Failures are logged and marked inline with `<error>` after whatever
    /// was produced so far.
    pub fn interrogate(&mut self, image: &DynamicImage) -> String {
        let mut result = String::new();
        let start = Instant::now();

        if let Err(e) = self.interrogate_into(image, &mut result) {
            error!("Error interrogating: {}", error_chain(&e));
            result.push_str(ERROR_MARKER);
        }

        self.unload();
        info!("Interrogated in {:.2?}", start.elapsed());
        result
    }

    fn interrogate_into(&mut self, image: &DynamicImage, result: &mut String) -> Result<()> {
        if self.settings.residency.offload_before_load() {
            self.offload_all();
        }

        self.load()?;

        let caption = self.generate_caption(image)?;
        self.send_caption_to_host();
        result.push_str(&caption);

        let features = self.image_features(image)?;

        if self.settings.use_builtin_artists && !self.artists.is_empty() {
            let names: Vec<String> = self
                .artists
                .iter()
                .map(|a| format!("{ARTIST_PREFIX}{}", a.name))
                .collect();
            if let Some((artist, score)) = self.rank(&features, &names, 1)?.into_iter().next() {
                debug!("Artist: {artist} ({score:.2})");
                result.push_str(TAG_SEPARATOR);
                result.push_str(&artist);
            }
        }

        for i in 0..self.categories.len() {
            let (items, topn) = {
                let category = &self.categories[i];
                (category.items.clone(), category.topn)
            };
            for (label, score) in self.rank(&features, &items, topn)? {
                debug!("{}: {label} ({score:.2})", self.categories[i].name);
                result.push_str(TAG_SEPARATOR);
                result.push_str(&label);
            }
        }
        Ok(())
    }

    /// Move the caption network to host unless models are kept resident.
    pub fn send_caption_to_host(&mut self) {
        if !self.settings.residency.evict_after_use() {
            return;
        }
        if let Some(model) = self.caption_model.as_mut() {
            model.move_to_host();
        }
    }

    /// Move the ranking network to host unless models are kept resident.
    pub fn send_ranker_to_host(&mut self) {
        if !self.settings.residency.evict_after_use() {
            return;
        }
        if let Some(model) = self.ranking_model.as_mut() {
            model.move_to_host();
        }
    }

    /// Move both networks to host unless models are kept resident.
    pub fn unload(&mut self) {
        self.send_ranker_to_host();
        self.send_caption_to_host();
    }

    /// Move both networks to host regardless of the keep-resident setting.
    pub fn offload_all(&mut self) {
        debug!("Offloading all models to host");
        if let Some(model) = self.caption_model.as_mut() {
            model.move_to_host();
        }
        if let Some(model) = self.ranking_model.as_mut() {
            model.move_to_host();
        }
    }
}

/// `error: cause: cause` rendering of an error and its sources.
fn error_chain(error: &Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_sources() {
        let error = Error::CategoryRead {
            path: "flavors.txt".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(
            error_chain(&error),
            "failed to read category file 'flavors.txt': gone"
        );
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.interrogate.num_beams = 3;
        config.interrogate.keep_models_in_memory = true;
        config.runtime.memory = crate::config::MemoryMode::Low;

        let settings = InterrogateSettings::from_config(&config);
        assert_eq!(settings.caption.num_beams, 3);
        assert!(!settings.residency.evict_after_use());
        assert!(settings.residency.offload_before_load());
    }
}
