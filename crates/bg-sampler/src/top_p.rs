use crate::sampler::{softmax, sort_descending, Sampler, TokenLogit};

/// Nucleus sampling: keeps the smallest set of tokens whose cumulative
/// probability exceeds the threshold `p`.
pub struct TopPSampler {
    p: f32,
}

impl TopPSampler {
    /// Create a new top-p (nucleus) stage with the given probability threshold.
    pub fn new(p: f32) -> Self {
        Self { p }
    }
}

impl Sampler for TopPSampler {
    fn name(&self) -> &str {
        "top_p"
    }

    fn apply(&mut self, logits: &mut Vec<TokenLogit>) {
        if logits.is_empty() || self.p >= 1.0 {
            return;
        }

        sort_descending(logits);
        let raw: Vec<f32> = logits.iter().map(|t| t.logit).collect();
        let probs = softmax(&raw);

        let mut cumulative = 0.0f32;
        let mut cutoff = logits.len();
        for (i, &prob) in probs.iter().enumerate() {
            cumulative += prob;
            if cumulative > self.p {
                cutoff = i + 1;
                break;
            }
        }

        // Always keep at least one token.
        logits.truncate(cutoff.max(1));
    }
}
