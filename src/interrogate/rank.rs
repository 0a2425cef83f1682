//! Label ranking maths over CLIP embeddings.

use crate::constants::interrogate::CLIP_LOGIT_SCALE;
use ndarray::{Array2, ArrayView1, Axis};

/// Scale every row to unit L2 norm. Zero rows are left untouched.
pub fn l2_normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }
}

/// Mean over image rows of `softmax(100 * image_row . textᵀ)`.
///
/// Both matrices are expected to be row-normalized. The result has one
/// probability per text row.
pub fn similarity(image: &Array2<f32>, text: &Array2<f32>) -> Vec<f32> {
    let mut total = vec![0.0_f32; text.nrows()];
    if image.nrows() == 0 {
        return total;
    }
    for image_row in image.axis_iter(Axis(0)) {
        let probs = softmax_logits(image_row, text);
        for (t, p) in total.iter_mut().zip(probs) {
            *t += p;
        }
    }
    let rows = image.nrows() as f32;
    total.iter_mut().for_each(|t| *t /= rows);
    total
}

fn softmax_logits(image_row: ArrayView1<'_, f32>, text: &Array2<f32>) -> Vec<f32> {
    let logits: Vec<f32> = text
        .axis_iter(Axis(0))
        .map(|t| CLIP_LOGIT_SCALE * image_row.dot(&t))
        .collect();
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// The `count` best labels with their probability in percent.
///
/// Equal scores keep the order the labels were given in.
pub fn top_labels(labels: &[String], scores: &[f32], count: usize) -> Vec<(String, f32)> {
    let mut order: Vec<usize> = (0..labels.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
        .into_iter()
        .take(count)
        .map(|i| (labels[i].clone(), scores[i] * 100.0))
        .collect()
}
