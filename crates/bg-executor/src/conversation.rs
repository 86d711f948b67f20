use std::fmt;
use std::sync::{Arc, Weak};

use bg_model::{Logits, TokenId};
use tracing::warn;

use crate::arena::ConversationId;
use crate::error::{ExecutorError, Result};
use crate::executor::{ExecutorState, Shared};
use crate::sampling::SamplingPipeline;

/// Handle to one token sequence inside a [`BatchedExecutor`](crate::BatchedExecutor).
///
/// The handle only stores the sequence's slot id; the tokens, evaluation
/// progress and logits live in the executor. Prompting records tokens for the
/// next `infer()`, and sampling reads the logits that pass produced.
///
/// Dropping the handle releases the slot and the backend cache.
pub struct Conversation {
    executor: Weak<Shared>,
    id: ConversationId,
    disposed: bool,
}

impl Conversation {
    pub(crate) fn new(executor: Weak<Shared>, id: ConversationId) -> Self {
        Self {
            executor,
            id,
            disposed: false,
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    fn shared(&self) -> Result<Arc<Shared>> {
        if self.disposed {
            return Err(ExecutorError::UseAfterDispose);
        }
        self.executor.upgrade().ok_or(ExecutorError::UseAfterDispose)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ExecutorState, &Shared) -> Result<R>) -> Result<R> {
        let shared = self.shared()?;
        let mut state = shared.lock()?;
        f(&mut *state, &*shared)
    }

    /// Append tokens. They are evaluated by the next `infer()`; until then
    /// [`sample`](Self::sample) fails with `StaleState`.
    pub fn prompt(&self, tokens: &[TokenId]) -> Result<()> {
        self.with_state(|state, shared| state.prompt(self.id, tokens, shared.vocab_size()))
    }

    pub fn prompt_token(&self, token: TokenId) -> Result<()> {
        self.prompt(&[token])
    }

    /// Tokenize `text` (without a beginning-of-sequence token) and append it.
    pub fn prompt_text(&self, text: &str) -> Result<()> {
        self.with_state(|state, shared| {
            let tokens = shared.tokenizer().encode(text);
            state.prompt(self.id, &tokens, shared.vocab_size())
        })
    }

    /// Logits produced by the last evaluation of this conversation.
    ///
    /// Fails with `StaleState` while tokens are pending, and before the
    /// first evaluation.
    pub fn sample(&self) -> Result<Logits> {
        self.with_state(|state, _| {
            state
                .sequence(self.id)?
                .logits()
                .cloned()
                .ok_or(ExecutorError::StaleState(self.id))
        })
    }

    /// Select the next token from this conversation's logits with `pipeline`.
    pub fn sample_with(
        &self,
        pipeline: &mut dyn SamplingPipeline,
        recent_tokens: &[TokenId],
    ) -> Result<TokenId> {
        let logits = self.sample()?;
        let ctx = self.shared()?.sampling_context();
        pipeline.sample(&ctx, &logits, recent_tokens)
    }

    /// Duplicate this conversation without re-evaluating its history.
    ///
    /// The fork shares every token and the cached logits (valid or not) of
    /// this conversation. From here on the two evolve independently.
    pub fn fork(&self) -> Result<Conversation> {
        let id = self.with_state(|state, _| state.fork(self.id))?;
        Ok(Conversation::new(self.executor.clone(), id))
    }

    /// Remove the last `count` tokens from the history and backend cache.
    ///
    /// Removing only tokens that were never evaluated keeps the logits
    /// sampleable. Otherwise the new last token is re-evaluated by the next
    /// `infer()`. Rewinding zero tokens changes nothing.
    pub fn rewind(&self, count: usize) -> Result<()> {
        self.with_state(|state, _| state.rewind(self.id, count).map(|_| ()))
    }

    /// Full token history.
    pub fn tokens(&self) -> Result<Vec<TokenId>> {
        self.with_state(|state, _| Ok(state.sequence(self.id)?.history().to_vec()))
    }

    pub fn token_count(&self) -> Result<usize> {
        self.with_state(|state, _| Ok(state.sequence(self.id)?.len()))
    }

    /// True while tokens are waiting for `infer()`.
    pub fn requires_inference(&self) -> Result<bool> {
        self.with_state(|state, _| Ok(state.sequence(self.id)?.requires_inference()))
    }

    /// True if [`sample`](Self::sample) would succeed.
    pub fn can_sample(&self) -> Result<bool> {
        self.with_state(|state, _| Ok(state.sequence(self.id)?.logits_valid()))
    }

    pub fn is_disposed(&self) -> bool {
        self.with_state(|state, _| state.sequence(self.id).map(|_| ()))
            .is_err()
    }

    /// Release this conversation's slot.
    ///
    /// Fails with `UseAfterDispose` if it was already disposed, or if the
    /// executor went away first.
    pub fn dispose(&mut self) -> Result<()> {
        let shared = self.shared()?;
        shared.lock()?.release(self.id)?;
        self.disposed = true;
        Ok(())
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        let Some(shared) = self.executor.upgrade() else {
            return;
        };
        let Ok(mut state) = shared.lock() else {
            warn!(conversation = %self.id, "could not release conversation: state lock poisoned");
            return;
        };
        // An already released slot only happens after executor disposal.
        let _ = state.release(self.id);
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("disposed", &self.disposed)
            .finish()
    }
}
