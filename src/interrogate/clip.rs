//! CLIP image and text encoders over ONNX graphs.
//!
//! The vision graph maps `pixel_values [1, 3, 224, 224]` to `image_embeds [1, D]`;
//! the text graph maps `input_ids [N, 77]` and `attention_mask [N, 77]` to
//! `text_embeds [N, D]`. Both embeddings are taken after projection.

use super::model::RankingModel;
use super::preprocess::clip_input;
use crate::config::Precision;
use crate::constants::interrogate::CLIP_CONTEXT_LENGTH;
use crate::error::{Error, Result};
use crate::runtime::{OnnxModel, Placeable, Placement, tensor_i64};
use image::DynamicImage;
use ndarray::Array2;
use tokenizers::Tokenizer;

/// End-of-text token.
const EOT_TOKEN: &str = "<|endoftext|>";

/// CLIP ranking model.
pub struct OnnxRanker {
    vision: OnnxModel,
    text: OnnxModel,
    tokenizer: Tokenizer,
    eot_token_id: u32,
}

impl OnnxRanker {
    /// Assemble from loaded graphs and tokenizer.
    pub fn new(vision: OnnxModel, text: OnnxModel, tokenizer: Tokenizer) -> Result<Self> {
        let eot_token_id = tokenizer
            .token_to_id(EOT_TOKEN)
            .ok_or_else(|| Error::Tokenizer {
                reason: format!("tokenizer has no {EOT_TOKEN} token"),
            })?;
        Ok(Self {
            vision,
            text,
            tokenizer,
            eot_token_id,
        })
    }
}

/// Fit token ids into the context window.
///
/// Over-long sequences are cut and end with the end-of-text token; shorter ones
/// are zero padded. Returns the ids and the attention mask.
pub fn fit_context(ids: &[u32], eot: u32, context: usize) -> (Vec<i64>, Vec<i64>) {
    let mut fitted: Vec<i64> = ids.iter().take(context).map(|&t| i64::from(t)).collect();
    if ids.len() > context
        && let Some(last) = fitted.last_mut()
    {
        *last = i64::from(eot);
    }
    let used = fitted.len();
    fitted.resize(context, 0);
    let mut mask = vec![1_i64; used];
    mask.resize(context, 0);
    (fitted, mask)
}

fn to_matrix(name: &str, shape: Vec<usize>, data: Vec<f32>) -> Result<Array2<f32>> {
    if shape.len() != 2 {
        return Err(Error::UnexpectedShape {
            name: name.to_string(),
            shape,
        });
    }
    Array2::from_shape_vec((shape[0], shape[1]), data).map_err(|e| Error::inference(name, e))
}

impl Placeable for OnnxRanker {
    fn placement(&self) -> Placement {
        self.text.placement()
    }

    fn move_to_device(&mut self) -> Result<()> {
        self.vision.move_to_device()?;
        self.text.move_to_device()
    }

    fn move_to_host(&mut self) {
        self.vision.move_to_host();
        self.text.move_to_host();
    }
}

impl RankingModel for OnnxRanker {
    fn precision(&self) -> Precision {
        self.vision.precision()
    }

    fn encode_image(&mut self, image: &DynamicImage) -> Result<Array2<f32>> {
        let pixels = clip_input(image);
        let shape = pixels.shape().to_vec();
        let (data, _) = pixels.into_raw_vec_and_offset();
        let input = self.vision.float_input(&shape, data)?;
        let (shape, embeds) = self.vision.run(vec![("pixel_values", input)])?;
        to_matrix(self.vision.name(), shape, embeds)
    }

    fn encode_text(&mut self, texts: &[String]) -> Result<Array2<f32>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::Tokenizer {
                reason: e.to_string(),
            })?;

        let mut ids = Vec::with_capacity(texts.len() * CLIP_CONTEXT_LENGTH);
        let mut mask = Vec::with_capacity(texts.len() * CLIP_CONTEXT_LENGTH);
        for encoding in &encodings {
            let (fitted, fitted_mask) =
                fit_context(encoding.get_ids(), self.eot_token_id, CLIP_CONTEXT_LENGTH);
            ids.extend(fitted);
            mask.extend(fitted_mask);
        }

        let name = self.text.name();
        let shape = [texts.len(), CLIP_CONTEXT_LENGTH];
        let input_ids = tensor_i64(name, &shape, ids)?;
        let attention_mask = tensor_i64(name, &shape, mask)?;
        let (shape, embeds) = self.text.run(vec![
            ("input_ids", input_ids),
            ("attention_mask", attention_mask),
        ])?;
        to_matrix(name, shape, embeds)
    }
}
