//! Model seams used by the interrogator.

use crate::config::Precision;
use crate::error::Result;
use crate::runtime::Placeable;
use image::DynamicImage;
use ndarray::Array2;

/// Caption decoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionParams {
    /// Beam width (1 = greedy).
    pub num_beams: usize,
    /// Minimum caption length in tokens.
    pub min_length: usize,
    /// Maximum caption length in tokens.
    pub max_length: usize,
}

/// Image captioning network.
pub trait CaptionModel: Placeable {
    /// Generate a caption for an image.
    fn caption(&mut self, image: &DynamicImage, params: CaptionParams) -> Result<String>;
}

/// Contrastive image-text network.
pub trait RankingModel: Placeable {
    /// Precision of the network's parameters.
    fn precision(&self) -> Precision;

    /// Image embeddings, one row per image view (not normalized).
    fn encode_image(&mut self, image: &DynamicImage) -> Result<Array2<f32>>;

    /// Text embeddings, one row per text (not normalized).
    fn encode_text(&mut self, texts: &[String]) -> Result<Array2<f32>>;
}

/// Creates the interrogator's networks on first use.
pub trait ModelLoader {
    /// Caption network type.
    type Caption: CaptionModel;
    /// Ranking network type.
    type Ranker: RankingModel;

    /// Load the caption network (placed on host).
    fn load_caption(&self) -> Result<Self::Caption>;

    /// Load the ranking network (placed on host).
    fn load_ranker(&self) -> Result<Self::Ranker>;
}
