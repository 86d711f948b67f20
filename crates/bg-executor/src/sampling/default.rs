use bg_model::TokenId;
use bg_sampler::{
    DistSampler, GreedySampler, RepetitionPenaltySampler, Sampler, SamplerChain,
    TemperatureSampler, TokenLogit, TopKSampler, TopPSampler,
};

use super::{SamplingContext, SamplingPipeline};
use crate::config::SamplingParams;
use crate::error::Result;

/// Repetition penalty, then temperature, top-k, top-p and a seeded draw.
///
/// With `temperature <= 0` the chain collapses to a greedy pick. The
/// repetition window is refilled from the caller's recent tokens on every
/// call, so the pipeline keeps no history of its own besides the RNG.
pub struct DefaultSamplingPipeline {
    params: SamplingParams,
    repetition: RepetitionPenaltySampler,
    chain: SamplerChain,
}

impl DefaultSamplingPipeline {
    pub fn new(params: SamplingParams) -> Self {
        let repetition =
            RepetitionPenaltySampler::new(params.repetition_penalty, params.repeat_last_n);
        let chain = if params.temperature <= 0.0 {
            SamplerChain::new().with(Box::new(GreedySampler::new()))
        } else {
            SamplerChain::new()
                .with(Box::new(TemperatureSampler::new(params.temperature)))
                .with(Box::new(TopKSampler::new(params.top_k)))
                .with(Box::new(TopPSampler::new(params.top_p)))
                .with(Box::new(DistSampler::new(params.seed)))
        };
        Self {
            params,
            repetition,
            chain,
        }
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    /// Stage names of the selection chain, in order.
    pub fn stages(&self) -> Vec<&str> {
        self.chain.names()
    }
}

impl Default for DefaultSamplingPipeline {
    fn default() -> Self {
        Self::new(SamplingParams::default())
    }
}

impl SamplingPipeline for DefaultSamplingPipeline {
    fn process_logits(
        &mut self,
        ctx: &SamplingContext,
        logits: &mut [f32],
        recent_tokens: &[TokenId],
    ) -> Result<()> {
        ctx.check_len(logits)?;
        if self.params.repetition_penalty == 1.0 || recent_tokens.is_empty() {
            return Ok(());
        }

        self.repetition.set_recent_tokens(recent_tokens);
        let mut candidates = TokenLogit::from_dense(logits);
        self.repetition.apply(&mut candidates);
        for c in candidates {
            logits[c.token_id as usize] = c.logit;
        }
        Ok(())
    }

    fn select_token(
        &mut self,
        ctx: &SamplingContext,
        logits: &[f32],
        _recent_tokens: &[TokenId],
    ) -> Result<TokenId> {
        ctx.check_len(logits)?;
        Ok(self.chain.sample(logits))
    }

    fn reset(&mut self) {
        self.repetition.reset();
        self.chain.reset();
    }

    /// A fresh pipeline with the same parameters; its RNG restarts at the seed.
    fn try_clone(&self) -> Result<Box<dyn SamplingPipeline>> {
        Ok(Box::new(Self::new(self.params.clone())))
    }
}
