//! Deterministic caption decoding: greedy and beam search over next-token logits.
//!
//! Lengths count every token in the sequence, prompt included. A step function
//! receives the current sequences (all the same length) and returns the
//! next-token logits for each of them.

use crate::error::{Error, Result};

/// Score given to the padding beams so that the first step expands only beam 0.
const INACTIVE_BEAM_SCORE: f32 = -1e9;

/// Decoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamSearch {
    /// Beam width; 1 means greedy decoding.
    pub num_beams: usize,
    /// End-of-sequence is suppressed while the sequence is shorter than this.
    pub min_length: usize,
    /// Hard cap on sequence length.
    pub max_length: usize,
    /// End-of-sequence token id.
    pub eos_token_id: u32,
}

/// A finished sequence and its length-normalized log probability.
#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score: f32,
}

/// Best `num_beams` finished hypotheses.
struct Hypotheses {
    capacity: usize,
    items: Vec<Hypothesis>,
}

impl Hypotheses {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity + 1),
        }
    }

    fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32) {
        let score = sum_logprobs / tokens.len().max(1) as f32;
        if self.items.len() < self.capacity || score > self.worst() {
            self.items.push(Hypothesis { tokens, score });
            if self.items.len() > self.capacity {
                let worst = self
                    .items
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1.score.total_cmp(&b.1.score))
                    .map(|(i, _)| i);
                if let Some(i) = worst {
                    self.items.remove(i);
                }
            }
        }
    }

    fn worst(&self) -> f32 {
        self.items
            .iter()
            .map(|h| h.score)
            .fold(f32::INFINITY, f32::min)
    }

    /// No running beam can still beat the worst kept hypothesis.
    fn is_done(&self, best_running_sum: f32, cur_len: usize) -> bool {
        self.items.len() >= self.capacity
            && self.worst() >= best_running_sum / cur_len.max(1) as f32
    }

    fn best(self) -> Option<Hypothesis> {
        self.items
            .into_iter()
            .reduce(|best, h| if h.score > best.score { h } else { best })
    }
}

impl BeamSearch {
    /// Decode starting from `prompt`, returning the best sequence without the
    /// trailing end-of-sequence token.
    pub fn run<F>(&self, prompt: &[u32], step: F) -> Result<Vec<u32>>
    where
        F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
    {
        if prompt.is_empty() {
            return Err(Error::Internal {
                message: "beam search needs a non-empty prompt".to_string(),
            });
        }
        if self.num_beams <= 1 {
            self.greedy(prompt, step)
        } else {
            self.beam(prompt, step)
        }
    }

    fn greedy<F>(&self, prompt: &[u32], mut step: F) -> Result<Vec<u32>>
    where
        F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
    {
        let mut sequence = vec![prompt.to_vec()];
        while sequence[0].len() < self.max_length {
            let logits = step(&sequence)?;
            let mut row = single_row(logits, 1)?.swap_remove(0);
            if sequence[0].len() < self.min_length {
                self.ban_eos(&mut row);
            }
            let next = argmax(&row);
            if next == self.eos_token_id {
                break;
            }
            sequence[0].push(next);
        }
        Ok(sequence.swap_remove(0))
    }

    fn beam<F>(&self, prompt: &[u32], mut step: F) -> Result<Vec<u32>>
    where
        F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
    {
        let n = self.num_beams;
        let mut beams: Vec<Vec<u32>> = vec![prompt.to_vec(); n];
        let mut scores: Vec<f32> = (0..n)
            .map(|i| if i == 0 { 0.0 } else { INACTIVE_BEAM_SCORE })
            .collect();
        let mut finished = Hypotheses::new(n);
        let mut cur_len = prompt.len();
        let mut done = false;

        while cur_len < self.max_length {
            let logits = single_row(step(&beams)?, n)?;

            let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
            for (b, row) in logits.into_iter().enumerate() {
                let mut logprobs = log_softmax(&row);
                if cur_len < self.min_length {
                    self.ban_eos(&mut logprobs);
                }
                candidates.extend(
                    logprobs
                        .into_iter()
                        .enumerate()
                        .map(|(t, lp)| (b, t as u32, scores[b] + lp)),
                );
            }
            candidates.sort_by(|a, b| b.2.total_cmp(&a.2));
            candidates.truncate(2 * n);

            let mut next_beams = Vec::with_capacity(n);
            let mut next_scores = Vec::with_capacity(n);
            for (rank, &(b, token, score)) in candidates.iter().enumerate() {
                if token == self.eos_token_id {
                    if rank < n {
                        finished.add(beams[b].clone(), score);
                    }
                } else {
                    let mut tokens = beams[b].clone();
                    tokens.push(token);
                    next_beams.push(tokens);
                    next_scores.push(score);
                }
                if next_beams.len() == n {
                    break;
                }
            }
            if next_beams.len() < n {
                return Err(Error::Internal {
                    message: format!("vocabulary too small for {n} beams"),
                });
            }

            let best_running = candidates
                .first()
                .map_or(f32::NEG_INFINITY, |candidate| candidate.2);
            beams = next_beams;
            scores = next_scores;
            if finished.is_done(best_running, cur_len) {
                done = true;
                break;
            }
            cur_len += 1;
        }

        if !done {
            for (tokens, score) in beams.into_iter().zip(scores) {
                finished.add(tokens, score);
            }
        }
        finished.best().map(|h| h.tokens).ok_or_else(|| Error::Internal {
            message: "beam search produced no hypothesis".to_string(),
        })
    }

    fn ban_eos(&self, row: &mut [f32]) {
        if let Some(v) = row.get_mut(self.eos_token_id as usize) {
            *v = f32::NEG_INFINITY;
        }
    }
}

fn single_row(logits: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if logits.len() != expected || logits.iter().any(Vec::is_empty) {
        return Err(Error::Internal {
            message: format!(
                "decoder returned {} logit rows, expected {expected}",
                logits.len()
            ),
        });
    }
    Ok(logits)
}

/// Index of the first maximum.
fn argmax(row: &[f32]) -> u32 {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best as u32
}

fn log_softmax(row: &[f32]) -> Vec<f32> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = row.iter().map(|v| (v - max).exp()).sum();
    let log_sum = max + sum.ln();
    row.iter().map(|v| v - log_sum).collect()
}
