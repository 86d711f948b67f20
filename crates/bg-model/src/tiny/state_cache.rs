/// Per-sequence cache of recurrent hidden states.
///
/// Stores the hidden state after every evaluated position so a sequence can
/// be extended, truncated or forked without recomputing its history.
///
/// Layout: flat array of shape `[len, hidden_dim]`.
#[derive(Debug, Clone)]
pub struct StateCache {
    states: Vec<f32>,
    hidden_dim: usize,
    max_seq_len: usize,
}

impl StateCache {
    /// Create an empty cache.
    pub fn new(hidden_dim: usize, max_seq_len: usize) -> Self {
        StateCache {
            states: Vec::new(),
            hidden_dim,
            max_seq_len,
        }
    }

    /// Number of positions currently stored.
    pub fn len(&self) -> usize {
        self.states.len() / self.hidden_dim
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    /// Write the hidden state for position `pos`.
    ///
    /// `pos` must be an existing position or the next free one.
    pub fn update(&mut self, pos: usize, state: &[f32]) {
        debug_assert_eq!(state.len(), self.hidden_dim);
        debug_assert!(pos <= self.len());
        let offset = pos * self.hidden_dim;
        if pos == self.len() {
            self.states.extend_from_slice(state);
        } else {
            self.states[offset..offset + self.hidden_dim].copy_from_slice(state);
        }
    }

    /// Hidden state at `pos`, if stored.
    pub fn get(&self, pos: usize) -> Option<&[f32]> {
        let offset = pos * self.hidden_dim;
        self.states.get(offset..offset + self.hidden_dim)
    }

    /// Hidden state of the last stored position.
    pub fn last(&self) -> Option<&[f32]> {
        self.len().checked_sub(1).and_then(|pos| self.get(pos))
    }

    /// Drop every position at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.states.truncate(len * self.hidden_dim);
    }

    /// New cache holding the first `len` positions of `self`.
    pub fn prefix(&self, len: usize) -> StateCache {
        let len = len.min(self.len());
        StateCache {
            states: self.states[..len * self.hidden_dim].to_vec(),
            hidden_dim: self.hidden_dim,
            max_seq_len: self.max_seq_len,
        }
    }

    /// Clear every stored position.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}
