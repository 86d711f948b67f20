//! Sampling pipelines: turn a conversation's logits into the next token.
//!
//! A pipeline runs in two phases. [`SamplingPipeline::process_logits`]
//! rewrites the dense logit vector in place (penalties, guidance), and
//! [`SamplingPipeline::select_token`] picks one id from the result.

mod default;
mod guided;

pub use default::DefaultSamplingPipeline;
pub use guided::{apply_guidance, GuidedSampler};

use bg_model::TokenId;

use crate::error::{ExecutorError, Result};

/// Model facts a pipeline needs while sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingContext {
    pub vocab_size: usize,
    pub eos_token: TokenId,
}

impl SamplingContext {
    pub(crate) fn check_len(&self, logits: &[f32]) -> Result<()> {
        if logits.len() != self.vocab_size {
            return Err(ExecutorError::LogitsLengthMismatch {
                expected: self.vocab_size,
                got: logits.len(),
            });
        }
        Ok(())
    }
}

/// Strategy that selects the next token from raw logits.
pub trait SamplingPipeline: Send {
    /// Rewrite `logits` in place before selection.
    fn process_logits(
        &mut self,
        ctx: &SamplingContext,
        logits: &mut [f32],
        recent_tokens: &[TokenId],
    ) -> Result<()>;

    /// Pick a token from processed logits.
    fn select_token(
        &mut self,
        ctx: &SamplingContext,
        logits: &[f32],
        recent_tokens: &[TokenId],
    ) -> Result<TokenId>;

    /// Process a copy of `logits`, then select from it.
    fn sample(
        &mut self,
        ctx: &SamplingContext,
        logits: &[f32],
        recent_tokens: &[TokenId],
    ) -> Result<TokenId> {
        let mut processed = logits.to_vec();
        self.process_logits(ctx, &mut processed, recent_tokens)?;
        self.select_token(ctx, &processed, recent_tokens)
    }

    /// Notify the pipeline that `token` was chosen.
    fn accept(&mut self, _token: TokenId) {}

    fn reset(&mut self) {}

    /// Independent copy of this pipeline.
    fn try_clone(&self) -> Result<Box<dyn SamplingPipeline>> {
        Err(ExecutorError::UnsupportedOperation(
            "this sampling pipeline cannot be cloned".into(),
        ))
    }
}
