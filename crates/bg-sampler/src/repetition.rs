use std::collections::VecDeque;

use crate::sampler::{Sampler, TokenLogit};

/// Applies a repetition penalty to tokens that have appeared recently.
///
/// For tokens found in the recent window:
/// - Positive logits are divided by `penalty`.
/// - Negative logits are multiplied by `penalty`.
pub struct RepetitionPenaltySampler {
    penalty: f32,
    recent_tokens: VecDeque<u32>,
    max_history: usize,
}

impl RepetitionPenaltySampler {
    /// Create a new repetition penalty stage.
    ///
    /// - `penalty`: the penalty factor (1.0 = no penalty).
    /// - `max_history`: maximum number of recent tokens to track.
    pub fn new(penalty: f32, max_history: usize) -> Self {
        Self {
            penalty,
            recent_tokens: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Record a generated token so it will be penalized in future steps.
    pub fn add_token(&mut self, token: u32) {
        if self.max_history == 0 {
            return;
        }
        if self.recent_tokens.len() == self.max_history {
            self.recent_tokens.pop_front();
        }
        self.recent_tokens.push_back(token);
    }

    /// Replace the window with the tail of `tokens`.
    pub fn set_recent_tokens(&mut self, tokens: &[u32]) {
        self.recent_tokens.clear();
        let start = tokens.len().saturating_sub(self.max_history);
        self.recent_tokens.extend(&tokens[start..]);
    }

    pub fn recent_tokens(&self) -> impl Iterator<Item = &u32> {
        self.recent_tokens.iter()
    }
}

impl Sampler for RepetitionPenaltySampler {
    fn name(&self) -> &str {
        "repetition_penalty"
    }

    fn apply(&mut self, logits: &mut Vec<TokenLogit>) {
        if self.penalty == 1.0 || self.recent_tokens.is_empty() {
            return;
        }
        for token in logits.iter_mut() {
            if self.recent_tokens.contains(&token.token_id) {
                if token.logit > 0.0 {
                    token.logit /= self.penalty;
                } else {
                    token.logit *= self.penalty;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.recent_tokens.clear();
    }
}
