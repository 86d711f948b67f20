use bg_model::TokenId;
use tracing::trace;

use super::{DefaultSamplingPipeline, SamplingContext, SamplingPipeline};
use crate::config::SamplingParams;
use crate::conversation::Conversation;
use crate::error::{ExecutorError, Result};

/// Classifier-free guidance: push `logits` away from `guidance`.
///
/// `logits[i] += weight * (logits[i] - guidance[i])`. A zero weight leaves
/// `logits` untouched.
pub fn apply_guidance(logits: &mut [f32], guidance: &[f32], weight: f32) -> Result<()> {
    if logits.len() != guidance.len() {
        return Err(ExecutorError::LogitsLengthMismatch {
            expected: logits.len(),
            got: guidance.len(),
        });
    }
    if !weight.is_finite() {
        return Err(ExecutorError::InvalidArgument(format!(
            "guidance weight must be finite, got {weight}"
        )));
    }
    if weight == 0.0 {
        return Ok(());
    }
    for (l, &g) in logits.iter_mut().zip(guidance) {
        *l += weight * (*l - g);
    }
    Ok(())
}

/// Pipeline that steers sampling with a second conversation's logits.
///
/// The guidance conversation is read at every step, so it must be prompted
/// and inferred in lock-step with the guided one. Without a guidance
/// conversation, or with a zero weight, this behaves exactly like
/// [`DefaultSamplingPipeline`] with the same parameters.
pub struct GuidedSampler<'a> {
    guidance: Option<&'a Conversation>,
    weight: f32,
    inner: DefaultSamplingPipeline,
}

impl<'a> GuidedSampler<'a> {
    pub fn new(guidance: Option<&'a Conversation>, weight: f32, params: SamplingParams) -> Self {
        Self {
            guidance,
            weight,
            inner: DefaultSamplingPipeline::new(params),
        }
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    pub fn guidance(&self) -> Option<&'a Conversation> {
        self.guidance
    }
}

impl SamplingPipeline for GuidedSampler<'_> {
    fn process_logits(
        &mut self,
        ctx: &SamplingContext,
        logits: &mut [f32],
        recent_tokens: &[TokenId],
    ) -> Result<()> {
        ctx.check_len(logits)?;
        if let Some(guidance) = self.guidance.filter(|_| self.weight != 0.0) {
            let guidance_logits = guidance.sample()?;
            apply_guidance(logits, &guidance_logits, self.weight)?;
            trace!(guidance = %guidance.id(), weight = self.weight, "applied guidance");
        }
        self.inner.process_logits(ctx, logits, recent_tokens)
    }

    fn select_token(
        &mut self,
        ctx: &SamplingContext,
        logits: &[f32],
        recent_tokens: &[TokenId],
    ) -> Result<TokenId> {
        self.inner.select_token(ctx, logits, recent_tokens)
    }

    fn accept(&mut self, token: TokenId) {
        self.inner.accept(token);
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn try_clone(&self) -> Result<Box<dyn SamplingPipeline>> {
        Err(ExecutorError::UnsupportedOperation(
            "guided sampler borrows its guidance conversation and cannot be cloned".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_formula() {
        let mut logits = [1.0, 2.0, -1.0];
        apply_guidance(&mut logits, &[0.5, 3.0, -1.0], 2.0).unwrap();
        assert_relative_eq!(logits[0], 2.0);
        assert_relative_eq!(logits[1], 0.0);
        assert_relative_eq!(logits[2], -1.0);
    }

    #[test]
    fn test_zero_weight_is_identity() {
        let original = [0.3, -2.0, 7.5, 0.0];
        let mut logits = original;
        apply_guidance(&mut logits, &[100.0, -100.0, 3.0, 1.0], 0.0).unwrap();
        assert_eq!(logits, original);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut logits = [0.0; 3];
        assert!(matches!(
            apply_guidance(&mut logits, &[0.0; 2], 1.0),
            Err(ExecutorError::LogitsLengthMismatch {
                expected: 3,
                got: 2
            })
        ));
        assert!(matches!(
            apply_guidance(&mut logits, &[0.0; 3], f32::NAN),
            Err(ExecutorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_without_guidance_matches_default() {
        let ctx = SamplingContext {
            vocab_size: 5,
            eos_token: 2,
        };
        let logits = [0.2, 1.0, 0.4, 0.9, 0.1];
        let params = SamplingParams::default().with_seed(11);
        let mut guided = GuidedSampler::new(None, 3.0, params.clone());
        let mut plain = DefaultSamplingPipeline::new(params);
        for _ in 0..16 {
            assert_eq!(
                guided.sample(&ctx, &logits, &[]).unwrap(),
                plain.sample(&ctx, &logits, &[]).unwrap()
            );
        }
    }

    #[test]
    fn test_try_clone_unsupported() {
        let sampler = GuidedSampler::new(None, 1.0, SamplingParams::default());
        assert!(matches!(
            sampler.try_clone(),
            Err(ExecutorError::UnsupportedOperation(_))
        ));
    }
}
