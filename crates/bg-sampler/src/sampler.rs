/// A token ID paired with its logit value.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLogit {
    pub token_id: u32,
    pub logit: f32,
}

impl TokenLogit {
    /// Expand a dense logit vector into candidates, using the index as token ID.
    pub fn from_dense(logits: &[f32]) -> Vec<TokenLogit> {
        logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| TokenLogit {
                token_id: i as u32,
                logit,
            })
            .collect()
    }
}

/// A single stage that filters, rescales or selects among candidate tokens.
pub trait Sampler: Send {
    /// Returns the name of this stage.
    fn name(&self) -> &str;

    /// Modify the candidate list in place.
    ///
    /// Selector stages leave exactly one candidate behind.
    fn apply(&mut self, logits: &mut Vec<TokenLogit>);

    /// Reset any internal state. Default implementation does nothing.
    fn reset(&mut self) {}
}

/// Composes multiple stages into an ordered chain.
/// The last stage in the chain should be a selector (greedy or dist).
#[derive(Default)]
pub struct SamplerChain {
    samplers: Vec<Box<dyn Sampler>>,
}

impl SamplerChain {
    /// Create a new empty chain.
    pub fn new() -> Self {
        Self {
            samplers: Vec::new(),
        }
    }

    /// Add a stage to the end of the chain. Returns self for builder-style usage.
    pub fn with(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.samplers.push(sampler);
        self
    }

    /// Number of stages in the chain.
    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    /// Stage names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.samplers.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over the candidates.
    pub fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        for sampler in self.samplers.iter_mut() {
            sampler.apply(candidates);
        }
    }

    /// Run all stages in order on dense logits and return the selected token ID.
    ///
    /// Returns 0 if the stages discard every candidate.
    pub fn sample(&mut self, logits: &[f32]) -> u32 {
        let mut candidates = TokenLogit::from_dense(logits);
        self.apply(&mut candidates);

        candidates.first().map(|t| t.token_id).unwrap_or(0)
    }

    /// Reset every stage in the chain.
    pub fn reset(&mut self) {
        for sampler in self.samplers.iter_mut() {
            sampler.reset();
        }
    }
}

/// Numerically stable softmax over a slice of logits.
///
/// Returns an empty vector for empty input.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Sort candidates by descending logit.
pub(crate) fn sort_descending(logits: &mut [TokenLogit]) {
    logits.sort_by(|a, b| {
        b.logit
            .partial_cmp(&a.logit)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
