pub mod config;
pub mod state_cache;

pub use config::TinyModelConfig;
pub use state_cache::StateCache;

use std::collections::HashMap;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::trace;

use crate::backend::{Backend, Batch, BatchEntry, SequenceId, TokenId};
use crate::error::{ModelError, Result};
use crate::logits::Logits;

/// A small deterministic recurrent language model.
///
/// Serves as the reference [`Backend`]: it has real per-sequence state, so
/// forks, truncation and batched evaluation behave like a transformer with a
/// KV cache, while weights come from a seeded RNG instead of a model file.
///
/// For every token: `h_t = tanh(decay * h_{t-1} + E[token_t])`, and the
/// logits of the last position are `W h_t + b`.
pub struct TinyModel {
    /// Model hyperparameters.
    pub config: TinyModelConfig,
    /// Token embeddings, `[vocab_size, hidden_dim]`.
    embeddings: Vec<f32>,
    /// Output projection, `[vocab_size, hidden_dim]`.
    output: Vec<f32>,
    /// Output bias, `[vocab_size]`.
    bias: Vec<f32>,
    /// Hidden states of every live sequence.
    caches: HashMap<SequenceId, StateCache>,
}

impl TinyModel {
    /// Build a model with weights drawn from `config.seed`.
    pub fn new(config: TinyModelConfig) -> Result<TinyModel> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let unit = Uniform::new_inclusive(-1.0f32, 1.0f32);
        let scale = 1.0 / (config.hidden_dim as f32).sqrt();
        let n = config.vocab_size * config.hidden_dim;

        let embeddings = (0..n).map(|_| unit.sample(&mut rng)).collect();
        let output = (0..n).map(|_| unit.sample(&mut rng) * scale).collect();
        let bias = (0..config.vocab_size)
            .map(|_| unit.sample(&mut rng) * 0.1)
            .collect();

        Ok(TinyModel {
            config,
            embeddings,
            output,
            bias,
            caches: HashMap::new(),
        })
    }

    /// Returns a reference to the model configuration.
    pub fn config(&self) -> &TinyModelConfig {
        &self.config
    }

    /// Number of cached positions of `sequence`, if it exists.
    pub fn sequence_len(&self, sequence: SequenceId) -> Option<usize> {
        self.caches.get(&sequence).map(StateCache::len)
    }

    /// Number of sequences currently holding cache state.
    pub fn sequence_count(&self) -> usize {
        self.caches.len()
    }

    /// Drop every sequence's cache.
    pub fn reset_cache(&mut self) {
        self.caches.clear();
    }

    fn check_entry(&self, entry: &BatchEntry) -> Result<()> {
        if entry.tokens.is_empty() {
            return Err(ModelError::EmptyBatchEntry(entry.sequence));
        }
        if let Some(&token) = entry
            .tokens
            .iter()
            .find(|&&t| t as usize >= self.config.vocab_size)
        {
            return Err(ModelError::TokenOutOfRange {
                token,
                vocab_size: self.config.vocab_size,
            });
        }

        let cached = self.sequence_len(entry.sequence).unwrap_or(0);
        if cached != entry.start_pos {
            return Err(ModelError::PositionMismatch {
                sequence: entry.sequence,
                expected: cached,
                got: entry.start_pos,
            });
        }
        if entry.start_pos + entry.tokens.len() > self.config.max_seq_len {
            return Err(ModelError::ContextFull {
                sequence: entry.sequence,
                max_seq_len: self.config.max_seq_len,
            });
        }
        Ok(())
    }

    fn step(&self, prev: &[f32], token: TokenId, out: &mut [f32]) {
        let dim = self.config.hidden_dim;
        let embd = &self.embeddings[token as usize * dim..(token as usize + 1) * dim];
        for i in 0..dim {
            out[i] = (self.config.decay * prev[i] + embd[i]).tanh();
        }
    }

    fn project(&self, hidden: &[f32]) -> Vec<f32> {
        let dim = self.config.hidden_dim;
        self.output
            .chunks_exact(dim)
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(hidden).map(|(w, h)| w * h).sum::<f32>() + b)
            .collect()
    }

    fn evaluate_entry(&mut self, entry: &BatchEntry) -> Logits {
        let dim = self.config.hidden_dim;
        let max_seq_len = self.config.max_seq_len;
        let mut cache = self
            .caches
            .remove(&entry.sequence)
            .unwrap_or_else(|| StateCache::new(dim, max_seq_len));

        let mut hidden = cache.last().map(<[f32]>::to_vec).unwrap_or_else(|| vec![0.0; dim]);
        let mut next = vec![0.0; dim];
        for (offset, &token) in entry.tokens.iter().enumerate() {
            self.step(&hidden, token, &mut next);
            cache.update(entry.start_pos + offset, &next);
            std::mem::swap(&mut hidden, &mut next);
        }

        let logits = self.project(&hidden);
        self.caches.insert(entry.sequence, cache);
        Logits::new(logits)
    }
}

impl Backend for TinyModel {
    fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    fn eos_token(&self) -> TokenId {
        self.config.eos_token
    }

    fn max_batch_tokens(&self) -> usize {
        self.config.max_batch_tokens
    }

    /// Validates the whole batch before touching any cache, so a rejected
    /// batch leaves every sequence unchanged.
    fn evaluate(&mut self, batch: &Batch) -> Result<Vec<Logits>> {
        for entry in batch.entries() {
            self.check_entry(entry)?;
        }
        Ok(batch
            .entries()
            .iter()
            .map(|entry| self.evaluate_entry(entry))
            .collect())
    }

    fn fork_sequence(&mut self, src: SequenceId, dst: SequenceId, len: usize) -> Result<()> {
        if self.caches.contains_key(&dst) {
            return Err(ModelError::SequenceExists(dst));
        }
        let forked = match self.caches.get(&src) {
            Some(cache) if len <= cache.len() => cache.prefix(len),
            Some(cache) => {
                return Err(ModelError::PositionMismatch {
                    sequence: src,
                    expected: cache.len(),
                    got: len,
                })
            }
            // Nothing evaluated yet: the fork starts empty as well.
            None if len == 0 => return Ok(()),
            None => return Err(ModelError::UnknownSequence(src)),
        };
        trace!(src, dst, len, "fork sequence cache");
        self.caches.insert(dst, forked);
        Ok(())
    }

    fn truncate_sequence(&mut self, sequence: SequenceId, len: usize) -> Result<()> {
        match self.caches.get_mut(&sequence) {
            Some(cache) => {
                cache.truncate(len);
                Ok(())
            }
            None if len == 0 => Ok(()),
            None => Err(ModelError::UnknownSequence(sequence)),
        }
    }

    fn remove_sequence(&mut self, sequence: SequenceId) {
        if self.caches.remove(&sequence).is_some() {
            trace!(sequence, "removed sequence cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> TinyModel {
        TinyModel::new(TinyModelConfig::default()).unwrap()
    }

    fn single(seq: SequenceId, start: usize, tokens: &[TokenId]) -> Batch {
        let mut b = Batch::new();
        b.push(seq, start, tokens.to_vec());
        b
    }

    #[test]
    fn test_logits_shape() {
        let mut m = model();
        let out = m.evaluate(&single(1, 0, &[10, 11])).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), m.vocab_size());
        assert_eq!(m.sequence_len(1), Some(2));
    }

    #[test]
    fn test_same_seed_same_logits() {
        let mut a = model();
        let mut b = model();
        let la = a.evaluate(&single(1, 0, &[40, 41, 42])).unwrap();
        let lb = b.evaluate(&single(9, 0, &[40, 41, 42])).unwrap();
        assert_eq!(la, lb);
    }

    #[test]
    fn test_incremental_matches_full() {
        let mut a = model();
        let full = a.evaluate(&single(1, 0, &[5, 6, 7])).unwrap();

        let mut b = model();
        b.evaluate(&single(1, 0, &[5, 6])).unwrap();
        let inc = b.evaluate(&single(1, 2, &[7])).unwrap();

        for (x, y) in full[0].iter().zip(inc[0].iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_batch_matches_individual() {
        let mut batched = model();
        let mut b = Batch::new();
        b.push(1, 0, vec![3, 4]);
        b.push(2, 0, vec![100]);
        let out = batched.evaluate(&b).unwrap();

        let mut solo = model();
        let one = solo.evaluate(&single(2, 0, &[100])).unwrap();
        assert_eq!(out[1], one[0]);
    }

    #[test]
    fn test_position_mismatch_rejects_whole_batch() {
        let mut m = model();
        let mut b = Batch::new();
        b.push(1, 0, vec![3]);
        b.push(2, 5, vec![4]);
        let err = m.evaluate(&b).unwrap_err();
        assert!(matches!(err, ModelError::PositionMismatch { sequence: 2, .. }));
        assert_eq!(m.sequence_count(), 0);
    }

    #[test]
    fn test_token_out_of_range() {
        let mut m = model();
        let vocab = m.vocab_size() as TokenId;
        let err = m.evaluate(&single(1, 0, &[vocab])).unwrap_err();
        assert!(matches!(err, ModelError::TokenOutOfRange { .. }));
    }

    #[test]
    fn test_context_full() {
        let mut m = TinyModel::new(TinyModelConfig::default().with_max_seq_len(2)).unwrap();
        let err = m.evaluate(&single(1, 0, &[1, 2, 3])).unwrap_err();
        assert!(matches!(err, ModelError::ContextFull { .. }));
    }

    #[test]
    fn test_fork_continues_like_parent() {
        let mut m = model();
        m.evaluate(&single(1, 0, &[20, 21])).unwrap();
        m.fork_sequence(1, 2, 2).unwrap();
        assert_eq!(m.sequence_len(2), Some(2));

        let mut b = Batch::new();
        b.push(1, 2, vec![22]);
        b.push(2, 2, vec![22]);
        let out = m.evaluate(&b).unwrap();
        assert_eq!(out[0], out[1]);
    }

    #[test]
    fn test_fork_prefix_and_errors() {
        let mut m = model();
        m.evaluate(&single(1, 0, &[20, 21, 22])).unwrap();
        m.fork_sequence(1, 2, 1).unwrap();
        assert_eq!(m.sequence_len(2), Some(1));
        assert!(matches!(
            m.fork_sequence(1, 2, 1),
            Err(ModelError::SequenceExists(2))
        ));
        assert!(matches!(
            m.fork_sequence(1, 3, 4),
            Err(ModelError::PositionMismatch { .. })
        ));
        assert!(matches!(
            m.fork_sequence(7, 8, 1),
            Err(ModelError::UnknownSequence(7))
        ));
        m.fork_sequence(7, 8, 0).unwrap();
    }

    #[test]
    fn test_truncate_and_remove() {
        let mut m = model();
        m.evaluate(&single(1, 0, &[1, 2, 3])).unwrap();
        m.truncate_sequence(1, 1).unwrap();
        assert_eq!(m.sequence_len(1), Some(1));
        m.evaluate(&single(1, 1, &[9])).unwrap();

        m.remove_sequence(1);
        assert_eq!(m.sequence_len(1), None);
        m.remove_sequence(1);
        assert!(m.truncate_sequence(1, 2).is_err());
    }
}
