//! The batched executor.
//!
//! One executor owns the backend and a table of sequences. Conversations
//! prompt their sequence without computing anything; [`BatchedExecutor::infer`]
//! then evaluates every pending sequence in a single backend call.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use bg_model::{Backend, Batch, SequenceId, TokenId, Tokenizer};
use tracing::{debug, info, trace};

use crate::arena::{ConversationId, SlotArena};
use crate::config::ExecutorConfig;
use crate::conversation::Conversation;
use crate::error::{ExecutorError, Result};
use crate::sampling::SamplingContext;
use crate::sequence::SequenceState;

pub struct BatchedExecutor {
    shared: Arc<Shared>,
}

/// State reachable from both the executor and its conversations.
pub(crate) struct Shared {
    state: Mutex<ExecutorState>,
    /// Held for the whole of an `infer()` call.
    infer_gate: tokio::sync::Mutex<()>,
    tokenizer: Arc<dyn Tokenizer>,
    add_bos: bool,
    vocab_size: usize,
    eos_token: TokenId,
}

pub(crate) struct ExecutorState {
    /// `None` once the executor has been disposed.
    backend: Option<Box<dyn Backend>>,
    sequences: SlotArena<SequenceState>,
    next_sequence_id: SequenceId,
    epoch: u64,
    max_batch_tokens: usize,
}

impl BatchedExecutor {
    /// Create an executor over `backend`.
    ///
    /// Fails with `InvalidArgument` if the tokenizer can produce ids the
    /// backend does not know or the effective batch limit is zero.
    pub fn new<B>(backend: B, tokenizer: Arc<dyn Tokenizer>, config: ExecutorConfig) -> Result<Self>
    where
        B: Backend + 'static,
    {
        let vocab_size = backend.vocab_size();
        if tokenizer.vocab_size() > vocab_size {
            return Err(ExecutorError::InvalidArgument(format!(
                "tokenizer vocabulary ({}) is larger than backend vocabulary ({})",
                tokenizer.vocab_size(),
                vocab_size
            )));
        }

        let max_batch_tokens = config
            .max_batch_tokens
            .map_or(backend.max_batch_tokens(), |n| n.min(backend.max_batch_tokens()));
        if max_batch_tokens == 0 {
            return Err(ExecutorError::InvalidArgument(
                "max_batch_tokens must be non-zero".into(),
            ));
        }

        let eos_token = backend.eos_token();
        info!(vocab_size, max_batch_tokens, "batched executor created");

        let state = ExecutorState {
            backend: Some(Box::new(backend)),
            sequences: SlotArena::new(),
            next_sequence_id: 0,
            epoch: 0,
            max_batch_tokens,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                infer_gate: tokio::sync::Mutex::new(()),
                tokenizer,
                add_bos: config.add_bos,
                vocab_size,
                eos_token,
            }),
        })
    }

    /// Tokenize `text` and open a conversation holding it.
    ///
    /// Nothing is evaluated until the next [`infer`](Self::infer).
    pub fn prompt(&self, text: &str) -> Result<Conversation> {
        let mut tokens = Vec::new();
        if self.shared.add_bos {
            tokens.push(self.shared.tokenizer.bos_id());
        }
        tokens.extend(self.shared.tokenizer.encode(text));
        self.prompt_tokens(&tokens)
    }

    /// Open a conversation holding `tokens`.
    pub fn prompt_tokens(&self, tokens: &[TokenId]) -> Result<Conversation> {
        let id = self.shared.lock()?.open(tokens.to_vec(), self.shared.vocab_size)?;
        Ok(Conversation::new(Arc::downgrade(&self.shared), id))
    }

    /// Open an empty conversation.
    pub fn create_conversation(&self) -> Result<Conversation> {
        self.prompt_tokens(&[])
    }

    /// Evaluate every conversation with pending tokens in one combined pass.
    ///
    /// Calls are serialized: a second `infer()` waits for the first to
    /// finish. The forward pass runs on tokio's blocking pool, so the calling
    /// task is suspended rather than blocking its worker thread. With nothing
    /// pending the call returns `Ok(())` without touching the backend.
    pub async fn infer(&self) -> Result<()> {
        let _gate = self.shared.infer_gate.lock().await;
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.run_inference())
            .await
            .map_err(|e| ExecutorError::TaskFailed(e.to_string()))?
    }

    /// Release the backend and every sequence.
    ///
    /// Later executor calls fail with `InvalidModelState`; later
    /// conversation calls fail with `UseAfterDispose`.
    pub fn dispose(&self) -> Result<()> {
        let mut state = self.shared.lock()?;
        let released = state.sequences.drain().len();
        if state.backend.take().is_some() {
            info!(released, "batched executor disposed");
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.shared
            .lock()
            .map(|s| s.backend.is_none())
            .unwrap_or(true)
    }

    /// Number of completed evaluation passes.
    pub fn epoch(&self) -> Result<u64> {
        Ok(self.shared.lock()?.epoch)
    }

    /// Total tokens the next `infer()` would evaluate.
    pub fn pending_token_count(&self) -> Result<usize> {
        Ok(self
            .shared
            .lock()?
            .sequences
            .iter()
            .map(|(_, s)| s.pending())
            .sum())
    }

    /// Number of live conversations.
    pub fn conversation_count(&self) -> Result<usize> {
        Ok(self.shared.lock()?.sequences.len())
    }

    /// Effective per-call token limit.
    pub fn max_batch_tokens(&self) -> Result<usize> {
        Ok(self.shared.lock()?.max_batch_tokens)
    }

    pub fn vocab_size(&self) -> usize {
        self.shared.vocab_size
    }

    pub fn eos_token(&self) -> TokenId {
        self.shared.eos_token
    }

    pub fn tokenizer(&self) -> Arc<dyn Tokenizer> {
        Arc::clone(&self.shared.tokenizer)
    }

    pub fn sampling_context(&self) -> SamplingContext {
        self.shared.sampling_context()
    }
}

impl Shared {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ExecutorState>> {
        self.state
            .lock()
            .map_err(|_| ExecutorError::InvalidModelState("executor state lock poisoned".into()))
    }

    pub(crate) fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub(crate) fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub(crate) fn sampling_context(&self) -> SamplingContext {
        SamplingContext {
            vocab_size: self.vocab_size,
            eos_token: self.eos_token,
        }
    }

    fn run_inference(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let backend = state
            .backend
            .as_mut()
            .ok_or_else(|| ExecutorError::InvalidModelState("executor has been disposed".into()))?;

        let mut batch = Batch::new();
        let mut targets = Vec::new();
        for (id, seq) in state.sequences.iter() {
            if seq.requires_inference() {
                batch.push(seq.id(), seq.evaluated(), seq.pending_tokens());
                targets.push(id);
            }
        }

        if batch.is_empty() {
            debug!(epoch = state.epoch, "infer called with no pending sequences");
            return Ok(());
        }

        let requested = batch.token_count();
        if requested > state.max_batch_tokens {
            return Err(ExecutorError::BatchSizeExceeded {
                requested,
                limit: state.max_batch_tokens,
            });
        }

        let started = Instant::now();
        let outputs = backend.evaluate(&batch)?;
        if outputs.len() != targets.len() {
            return Err(ExecutorError::InvalidModelState(format!(
                "backend returned {} logit vectors for {} sequences",
                outputs.len(),
                targets.len()
            )));
        }
        if let Some(bad) = outputs.iter().find(|l| l.len() != self.vocab_size) {
            return Err(ExecutorError::LogitsLengthMismatch {
                expected: self.vocab_size,
                got: bad.len(),
            });
        }

        for (id, logits) in targets.into_iter().zip(outputs) {
            if let Some(seq) = state.sequences.get_mut(id) {
                seq.mark_evaluated(logits);
            }
        }
        state.epoch += 1;

        debug!(
            epoch = state.epoch,
            sequences = batch.len(),
            tokens = requested,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference pass complete"
        );
        Ok(())
    }
}

impl ExecutorState {
    fn check_tokens(tokens: &[TokenId], vocab_size: usize) -> Result<()> {
        match tokens.iter().find(|&&t| t as usize >= vocab_size) {
            Some(&token) => Err(ExecutorError::TokenOutOfRange { token, vocab_size }),
            None => Ok(()),
        }
    }

    fn next_id(&mut self) -> SequenceId {
        let id = self.next_sequence_id;
        self.next_sequence_id += 1;
        id
    }

    fn open(&mut self, tokens: Vec<TokenId>, vocab_size: usize) -> Result<ConversationId> {
        if self.backend.is_none() {
            return Err(ExecutorError::InvalidModelState(
                "executor has been disposed".into(),
            ));
        }
        Self::check_tokens(&tokens, vocab_size)?;

        let sequence = self.next_id();
        let pending = tokens.len();
        let id = self.sequences.insert(SequenceState::new(sequence, tokens));
        debug!(conversation = %id, sequence, pending, "conversation opened");
        Ok(id)
    }

    pub(crate) fn sequence(&self, id: ConversationId) -> Result<&SequenceState> {
        if self.backend.is_none() {
            return Err(ExecutorError::UseAfterDispose);
        }
        self.sequences.get(id).ok_or(ExecutorError::UseAfterDispose)
    }

    fn sequence_mut(&mut self, id: ConversationId) -> Result<&mut SequenceState> {
        if self.backend.is_none() {
            return Err(ExecutorError::UseAfterDispose);
        }
        self.sequences.get_mut(id).ok_or(ExecutorError::UseAfterDispose)
    }

    pub(crate) fn prompt(
        &mut self,
        id: ConversationId,
        tokens: &[TokenId],
        vocab_size: usize,
    ) -> Result<()> {
        let seq = self.sequence_mut(id)?;
        Self::check_tokens(tokens, vocab_size)?;
        seq.append(tokens);
        trace!(conversation = %id, added = tokens.len(), pending = seq.pending(), "prompted");
        Ok(())
    }

    pub(crate) fn fork(&mut self, id: ConversationId) -> Result<ConversationId> {
        let child = self.next_sequence_id;
        let backend = self.backend.as_mut().ok_or(ExecutorError::UseAfterDispose)?;
        let parent = self
            .sequences
            .get_mut(id)
            .ok_or(ExecutorError::UseAfterDispose)?;

        backend.fork_sequence(parent.id(), child, parent.evaluated())?;
        let forked = parent.fork(child);
        self.next_sequence_id += 1;

        let fork_id = self.sequences.insert(forked);
        debug!(parent = %id, fork = %fork_id, sequence = child, "conversation forked");
        Ok(fork_id)
    }

    pub(crate) fn rewind(&mut self, id: ConversationId, count: usize) -> Result<usize> {
        let backend = self.backend.as_mut().ok_or(ExecutorError::UseAfterDispose)?;
        let seq = self
            .sequences
            .get_mut(id)
            .ok_or(ExecutorError::UseAfterDispose)?;

        if count > seq.len() {
            return Err(ExecutorError::InvalidArgument(format!(
                "cannot rewind {} tokens from a conversation of {}",
                count,
                seq.len()
            )));
        }
        if let Some(keep) = seq.rewind_cache_len(count) {
            backend.truncate_sequence(seq.id(), keep)?;
        }
        Ok(seq.rewind(count))
    }

    pub(crate) fn release(&mut self, id: ConversationId) -> Result<()> {
        let backend = self.backend.as_mut().ok_or(ExecutorError::UseAfterDispose)?;
        let seq = self
            .sequences
            .remove(id)
            .ok_or(ExecutorError::UseAfterDispose)?;
        backend.remove_sequence(seq.id());
        debug!(conversation = %id, sequence = seq.id(), "conversation released");
        Ok(())
    }
}
