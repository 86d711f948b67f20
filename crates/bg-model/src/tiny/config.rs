use crate::backend::TokenId;
use crate::error::{ModelError, Result};
use crate::tokenizer::vocab::BYTE_LEVEL_VOCAB_SIZE;

/// Configuration for the [`TinyModel`](super::TinyModel) reference backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TinyModelConfig {
    /// Vocabulary size (number of output logits).
    pub vocab_size: usize,
    /// Width of the recurrent hidden state.
    pub hidden_dim: usize,
    /// Maximum number of positions one sequence may hold.
    pub max_seq_len: usize,
    /// Maximum number of tokens accepted by one evaluation pass.
    pub max_batch_tokens: usize,
    /// Weight of the previous hidden state in the recurrence, in `[0, 1)`.
    pub decay: f32,
    /// End-of-sequence token id.
    pub eos_token: TokenId,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for TinyModelConfig {
    /// Sized to match the byte-level vocabulary (`</s>` = 2).
    fn default() -> Self {
        Self {
            vocab_size: BYTE_LEVEL_VOCAB_SIZE,
            hidden_dim: 32,
            max_seq_len: 512,
            max_batch_tokens: 512,
            decay: 0.5,
            eos_token: 2,
            seed: 0x5eed,
        }
    }
}

impl TinyModelConfig {
    pub fn with_max_batch_tokens(mut self, max_batch_tokens: usize) -> Self {
        self.max_batch_tokens = max_batch_tokens;
        self
    }

    pub fn with_max_seq_len(mut self, max_seq_len: usize) -> Self {
        self.max_seq_len = max_seq_len;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check that the configuration describes a usable model.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(ModelError::InvalidConfig("vocab_size must be non-zero".into()));
        }
        if self.hidden_dim == 0 {
            return Err(ModelError::InvalidConfig("hidden_dim must be non-zero".into()));
        }
        if self.max_seq_len == 0 || self.max_batch_tokens == 0 {
            return Err(ModelError::InvalidConfig(
                "max_seq_len and max_batch_tokens must be non-zero".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.decay) {
            return Err(ModelError::InvalidConfig(format!(
                "decay must be in [0, 1), got {}",
                self.decay
            )));
        }
        if self.eos_token as usize >= self.vocab_size {
            return Err(ModelError::TokenOutOfRange {
                token: self.eos_token,
                vocab_size: self.vocab_size,
            });
        }
        Ok(())
    }
}
