use crate::logits::Logits;

/// Index into the vocabulary.
pub type TokenId = u32;

/// Backend-side identifier of one token sequence.
///
/// Identifiers are never reused by the executor, so a backend may treat
/// them as opaque keys.
pub type SequenceId = u64;

/// Pending tokens of one sequence within a combined evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Sequence the tokens belong to.
    pub sequence: SequenceId,
    /// Position of the first token in `tokens`; equals the number of
    /// positions the backend has already cached for this sequence.
    pub start_pos: usize,
    /// Tokens to evaluate, in order.
    pub tokens: Vec<TokenId>,
}

/// Description of one combined forward pass over several sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the pending tokens of one sequence.
    pub fn push(&mut self, sequence: SequenceId, start_pos: usize, tokens: Vec<TokenId>) {
        self.entries.push(BatchEntry {
            sequence,
            start_pos,
            tokens,
        });
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Number of sequences in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of tokens across all entries.
    pub fn token_count(&self) -> usize {
        self.entries.iter().map(|e| e.tokens.len()).sum()
    }
}

/// The forward-evaluation collaborator.
///
/// Implementations own the model weights and a per-sequence cache of
/// evaluated positions. They evaluate many sequences in one call and return
/// next-token logits for the last token of every entry.
pub trait Backend: Send {
    /// Returns the vocabulary size (length of every logit vector).
    fn vocab_size(&self) -> usize;

    /// Returns the designated end-of-sequence token.
    fn eos_token(&self) -> TokenId;

    /// Maximum number of tokens accepted by one `evaluate` call.
    fn max_batch_tokens(&self) -> usize;

    /// Evaluate every entry of `batch`.
    ///
    /// Returns one logit vector per entry, in entry order. Sequences that
    /// the backend has not seen before are created on first use; for those
    /// `start_pos` must be 0.
    fn evaluate(&mut self, batch: &Batch) -> crate::Result<Vec<Logits>>;

    /// Copy the first `len` cached positions of `src` into a new sequence `dst`.
    fn fork_sequence(&mut self, src: SequenceId, dst: SequenceId, len: usize)
        -> crate::Result<()>;

    /// Drop every cached position of `sequence` at or after `len`.
    fn truncate_sequence(&mut self, sequence: SequenceId, len: usize) -> crate::Result<()>;

    /// Release all cached state of `sequence`. Unknown sequences are ignored.
    fn remove_sequence(&mut self, sequence: SequenceId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_counts() {
        let mut batch = Batch::new();
        assert!(batch.is_empty());
        batch.push(1, 0, vec![5, 6, 7]);
        batch.push(2, 4, vec![9]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.token_count(), 4);
        assert_eq!(batch.entries()[1].start_pos, 4);
    }
}
