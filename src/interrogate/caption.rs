//! BLIP captioning over ONNX graphs.
//!
//! The vision encoder maps `pixel_values [1, 3, 384, 384]` to image embeddings
//! `[1, S, D]`. The text decoder takes `input_ids [B, L]`, `attention_mask [B, L]`
//! and `encoder_hidden_states [B, S, D]` and returns logits `[B, L, V]`.

use super::beam::BeamSearch;
use super::model::{CaptionModel, CaptionParams};
use super::preprocess::blip_input;
use crate::constants::interrogate::BLIP_PROMPT;
use crate::error::{Error, Result};
use crate::runtime::{OnnxModel, Placeable, Placement, tensor_i64};
use image::DynamicImage;
use tokenizers::Tokenizer;
use tracing::debug;

/// Decoder start token replacing `[CLS]`.
const BOS_TOKEN: &str = "[DEC]";
/// Separator token, used as end-of-sequence.
const SEP_TOKEN: &str = "[SEP]";

/// BLIP caption model.
pub struct OnnxCaptioner {
    vision: OnnxModel,
    decoder: OnnxModel,
    tokenizer: Tokenizer,
    prompt_ids: Vec<u32>,
    eos_token_id: u32,
}

impl OnnxCaptioner {
    /// Assemble from loaded graphs and tokenizer.
    pub fn new(vision: OnnxModel, decoder: OnnxModel, tokenizer: Tokenizer) -> Result<Self> {
        let bos = special_token(&tokenizer, BOS_TOKEN)?;
        let eos_token_id = special_token(&tokenizer, SEP_TOKEN)?;
        let encoding = tokenizer
            .encode(BLIP_PROMPT, true)
            .map_err(|e| Error::Tokenizer {
                reason: e.to_string(),
            })?;
        let prompt_ids = decoder_prompt(encoding.get_ids(), bos, eos_token_id);
        debug!("BLIP prompt ids: {prompt_ids:?}");

        Ok(Self {
            vision,
            decoder,
            tokenizer,
            prompt_ids,
            eos_token_id,
        })
    }

    fn encode_image(&mut self, image: &DynamicImage) -> Result<(Vec<usize>, Vec<f32>)> {
        let pixels = blip_input(image);
        let shape = pixels.shape().to_vec();
        let (data, _) = pixels.into_raw_vec_and_offset();
        let input = self.vision.float_input(&shape, data)?;
        let (shape, embeds) = self.vision.run(vec![("pixel_values", input)])?;
        if shape.len() != 3 || shape[0] != 1 {
            return Err(Error::UnexpectedShape {
                name: self.vision.name().to_string(),
                shape,
            });
        }
        Ok((shape, embeds))
    }

    /// Next-token logits for every sequence in the batch.
    fn decode_step(
        &mut self,
        embeds_shape: &[usize],
        embeds: &[f32],
        sequences: &[Vec<u32>],
    ) -> Result<Vec<Vec<f32>>> {
        let batch = sequences.len();
        let len = sequences.first().map_or(0, Vec::len);
        let ids: Vec<i64> = sequences
            .iter()
            .flat_map(|s| s.iter().map(|&t| i64::from(t)))
            .collect();
        let mask = vec![1_i64; batch * len];
        let hidden: Vec<f32> = (0..batch).flat_map(|_| embeds.iter().copied()).collect();

        let name = self.decoder.name();
        let input_ids = tensor_i64(name, &[batch, len], ids)?;
        let attention_mask = tensor_i64(name, &[batch, len], mask)?;
        let hidden_shape = [batch, embeds_shape[1], embeds_shape[2]];
        let encoder_hidden_states = self.decoder.float_input(&hidden_shape, hidden)?;

        let (shape, logits) = self.decoder.run(vec![
            ("input_ids", input_ids),
            ("attention_mask", attention_mask),
            ("encoder_hidden_states", encoder_hidden_states),
        ])?;
        last_position_logits(name, &shape, &logits, batch)
    }
}

/// `[CLS] prompt [SEP]` becomes `[DEC] prompt`.
fn decoder_prompt(ids: &[u32], bos: u32, sep: u32) -> Vec<u32> {
    let mut prompt = ids.to_vec();
    if prompt.last() == Some(&sep) {
        prompt.pop();
    }
    match prompt.first_mut() {
        Some(first) => *first = bos,
        None => prompt.push(bos),
    }
    prompt
}

/// Slice `[B, L, V]` logits down to the last position of each row.
fn last_position_logits(
    name: &str,
    shape: &[usize],
    logits: &[f32],
    batch: usize,
) -> Result<Vec<Vec<f32>>> {
    if shape.len() != 3 || shape[0] != batch || shape[1] == 0 {
        return Err(Error::UnexpectedShape {
            name: name.to_string(),
            shape: shape.to_vec(),
        });
    }
    let (len, vocab) = (shape[1], shape[2]);
    Ok((0..batch)
        .map(|b| {
            let start = (b * len + len - 1) * vocab;
            logits[start..start + vocab].to_vec()
        })
        .collect())
}

/// Decoded text with the generation prompt removed.
fn strip_prompt(text: &str) -> String {
    let prompt = BLIP_PROMPT.trim_end();
    text.strip_prefix(prompt)
        .unwrap_or(text)
        .trim()
        .to_string()
}

fn special_token(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer.token_to_id(token).ok_or_else(|| Error::Tokenizer {
        reason: format!("tokenizer has no {token} token"),
    })
}

impl Placeable for OnnxCaptioner {
    fn placement(&self) -> Placement {
        self.decoder.placement()
    }

    fn move_to_device(&mut self) -> Result<()> {
        self.vision.move_to_device()?;
        self.decoder.move_to_device()
    }

    fn move_to_host(&mut self) {
        self.vision.move_to_host();
        self.decoder.move_to_host();
    }
}

impl CaptionModel for OnnxCaptioner {
    fn caption(&mut self, image: &DynamicImage, params: CaptionParams) -> Result<String> {
        let (embeds_shape, embeds) = self.encode_image(image)?;
        debug!("BLIP image embeds shape: {embeds_shape:?}");

        let search = BeamSearch {
            num_beams: params.num_beams,
            min_length: params.min_length,
            max_length: params.max_length,
            eos_token_id: self.eos_token_id,
        };
        let prompt = self.prompt_ids.clone();
        let tokens = search.run(&prompt, |sequences| {
            self.decode_step(&embeds_shape, &embeds, sequences)
        })?;

        let text = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| Error::Tokenizer {
                reason: e.to_string(),
            })?;
        Ok(strip_prompt(&text))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_prompt_replaces_cls_and_drops_sep() {
        assert_eq!(decoder_prompt(&[101, 1037, 3861, 1997, 102], 30522, 102), vec![
            30522, 1037, 3861, 1997
        ]);
    }

    #[test]
    fn test_last_position_logits() {
        // batch 2, len 2, vocab 3
        let logits = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 4.0, 5.0, 6.0];
        let rows = last_position_logits("decoder", &[2, 2, 3], &logits, 2).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_last_position_logits_rejects_bad_shape() {
        let result = last_position_logits("decoder", &[1, 3], &[0.0; 3], 1);
        assert!(matches!(result, Err(Error::UnexpectedShape { .. })));
    }

    #[test]
    fn test_strip_prompt() {
        assert_eq!(strip_prompt("a picture of a cat on a mat"), "a cat on a mat");
        assert_eq!(strip_prompt("a dog"), "a dog");
    }
}
