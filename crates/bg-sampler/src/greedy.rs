use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::sampler::{softmax, sort_descending, Sampler, TokenLogit};

/// Greedy selector: keeps the single token with the highest logit.
#[derive(Default)]
pub struct GreedySampler;

impl GreedySampler {
    pub fn new() -> Self {
        Self
    }
}

impl Sampler for GreedySampler {
    fn name(&self) -> &str {
        "greedy"
    }

    fn apply(&mut self, logits: &mut Vec<TokenLogit>) {
        if logits.is_empty() {
            return;
        }

        sort_descending(logits);
        logits.truncate(1);
    }
}

/// Distribution selector: converts the surviving logits to probabilities via
/// softmax, then draws one candidate with a seeded RNG.
///
/// The RNG advances across calls, so a chain built from the same seed replays
/// the same sequence of draws.
#[derive(Clone)]
pub struct DistSampler {
    seed: u64,
    rng: StdRng,
}

impl DistSampler {
    /// Create a new distribution selector with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Sampler for DistSampler {
    fn name(&self) -> &str {
        "dist"
    }

    fn apply(&mut self, logits: &mut Vec<TokenLogit>) {
        if logits.is_empty() {
            return;
        }

        let raw: Vec<f32> = logits.iter().map(|t| t.logit).collect();
        let probs = softmax(&raw);

        let dist = match WeightedIndex::new(&probs) {
            Ok(d) => d,
            Err(_) => {
                // Degenerate weights (NaN or all zero): fall back to greedy.
                sort_descending(logits);
                logits.truncate(1);
                return;
            }
        };

        let selected = logits.swap_remove(dist.sample(&mut self.rng));
        logits.clear();
        logits.push(selected);
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy_picks_max() {
        let mut c = TokenLogit::from_dense(&[0.1, 2.0, -3.0]);
        GreedySampler::new().apply(&mut c);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].token_id, 1);
    }

    #[test]
    fn test_dist_same_seed_same_draws() {
        let dense = [0.5, 0.4, 0.3, 0.2, 0.1];
        let mut a = DistSampler::new(42);
        let mut b = DistSampler::new(42);
        for _ in 0..16 {
            let mut ca = TokenLogit::from_dense(&dense);
            let mut cb = TokenLogit::from_dense(&dense);
            a.apply(&mut ca);
            b.apply(&mut cb);
            assert_eq!(ca, cb);
            assert_eq!(ca.len(), 1);
        }
    }

    #[test]
    fn test_dist_reset_replays() {
        let dense = [0.0; 32];
        let mut s = DistSampler::new(7);
        let first: Vec<u32> = (0..8)
            .map(|_| {
                let mut c = TokenLogit::from_dense(&dense);
                s.apply(&mut c);
                c[0].token_id
            })
            .collect();
        s.reset();
        let second: Vec<u32> = (0..8)
            .map(|_| {
                let mut c = TokenLogit::from_dense(&dense);
                s.apply(&mut c);
                c[0].token_id
            })
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dist_single_dominant_token() {
        let mut c = TokenLogit::from_dense(&[-100.0, 100.0, -100.0]);
        DistSampler::new(3).apply(&mut c);
        assert_eq!(c[0].token_id, 1);
    }
}
