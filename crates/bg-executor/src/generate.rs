//! Token-by-token generation over one or more lock-stepped conversations.

use bg_model::TokenId;
use tracing::debug;

use crate::conversation::Conversation;
use crate::error::Result;
use crate::executor::BatchedExecutor;
use crate::sampling::SamplingPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The pipeline selected the end-of-sequence token.
    EndOfSequence,
    /// `max_steps` tokens were produced.
    MaxSteps,
}

/// Output of [`generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Selected tokens, excluding a final end-of-sequence token.
    pub tokens: Vec<TokenId>,
    pub stop_reason: StopReason,
}

/// Sample up to `max_steps` tokens from `target` with `pipeline`.
///
/// Every selected token is appended to `target` and to each of `followers`
/// (for example the guidance conversation of a
/// [`GuidedSampler`](crate::GuidedSampler)), and one `infer()` evaluates them
/// together before the next step. The end-of-sequence token stops the loop
/// and is not fed back.
///
/// The pipeline's `recent_tokens` is `target`'s history at each step, read
/// once up front and extended locally.
pub async fn generate(
    executor: &BatchedExecutor,
    target: &Conversation,
    followers: &[&Conversation],
    pipeline: &mut dyn SamplingPipeline,
    max_steps: usize,
) -> Result<Generation> {
    let eos = executor.eos_token();
    let mut tokens = Vec::new();
    let mut recent = target.tokens()?;

    for _ in 0..max_steps {
        executor.infer().await?;

        let token = target.sample_with(pipeline, &recent)?;
        pipeline.accept(token);
        if token == eos {
            debug!(conversation = %target.id(), generated = tokens.len(), "end of sequence");
            return Ok(Generation {
                tokens,
                stop_reason: StopReason::EndOfSequence,
            });
        }

        tokens.push(token);
        recent.push(token);
        target.prompt_token(token)?;
        for follower in followers {
            follower.prompt_token(token)?;
        }
    }

    debug!(conversation = %target.id(), generated = tokens.len(), "step budget exhausted");
    Ok(Generation {
        tokens,
        stop_reason: StopReason::MaxSteps,
    })
}
