//! Per-conversation sequence state tracked by the executor.

use bg_model::{Logits, SequenceId, TokenId};

use crate::history::TokenHistory;

/// Token history of one conversation plus its evaluation progress.
///
/// Invariant: `evaluated <= history.len()`, and logits are only handed out
/// when `evaluated == history.len()`.
#[derive(Debug, Clone)]
pub struct SequenceState {
    id: SequenceId,
    history: TokenHistory,
    /// Number of leading tokens already in the backend cache.
    evaluated: usize,
    /// Logits after the last evaluated token.
    logits: Option<Logits>,
    /// Sequence this one was forked from.
    parent: Option<SequenceId>,
}

impl SequenceState {
    pub fn new(id: SequenceId, tokens: Vec<TokenId>) -> Self {
        Self {
            id,
            history: TokenHistory::from_tokens(tokens),
            evaluated: 0,
            logits: None,
            parent: None,
        }
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn parent(&self) -> Option<SequenceId> {
        self.parent
    }

    pub fn history(&self) -> &TokenHistory {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn evaluated(&self) -> usize {
        self.evaluated
    }

    /// Number of tokens waiting for the next evaluation pass.
    pub fn pending(&self) -> usize {
        self.history.len() - self.evaluated
    }

    pub fn requires_inference(&self) -> bool {
        self.pending() > 0
    }

    pub fn logits_valid(&self) -> bool {
        self.logits.is_some() && !self.requires_inference()
    }

    /// Cached logits, if valid.
    pub fn logits(&self) -> Option<&Logits> {
        if self.requires_inference() {
            return None;
        }
        self.logits.as_ref()
    }

    /// Tokens the next evaluation pass must process.
    pub fn pending_tokens(&self) -> Vec<TokenId> {
        self.history.range(self.evaluated, self.history.len())
    }

    /// Append tokens. The cached logits stay attached to the evaluated
    /// prefix but are not handed out until the new tokens are evaluated.
    pub fn append(&mut self, tokens: &[TokenId]) {
        self.history.extend(tokens);
    }

    /// Record a completed evaluation of every pending token.
    pub fn mark_evaluated(&mut self, logits: Logits) {
        self.evaluated = self.history.len();
        self.logits = Some(logits);
    }

    /// Duplicate this state under a new id, sharing history and logits.
    pub fn fork(&mut self, id: SequenceId) -> SequenceState {
        SequenceState {
            id,
            history: self.history.fork(),
            evaluated: self.evaluated,
            logits: self.logits.clone(),
            parent: Some(self.id),
        }
    }

    /// Position the backend cache must be cut back to when `count` tokens
    /// are rewound, or `None` if the evaluated prefix survives intact.
    pub fn rewind_cache_len(&self, count: usize) -> Option<usize> {
        let len = self.history.len().saturating_sub(count);
        (len < self.evaluated).then(|| len.saturating_sub(1))
    }

    /// Drop the last `count` tokens. Returns the new length.
    ///
    /// Dropping only pending tokens keeps the cached logits. Cutting into the
    /// evaluated prefix marks the new last token pending again, so the next
    /// evaluation pass recomputes its logits.
    pub fn rewind(&mut self, count: usize) -> usize {
        if count == 0 {
            return self.history.len();
        }
        if let Some(keep) = self.rewind_cache_len(count) {
            self.evaluated = keep;
            self.logits = None;
        }
        let len = self.history.len().saturating_sub(count);
        self.history.truncate(len);
        len
    }
}
