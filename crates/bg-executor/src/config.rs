/// Executor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Upper bound on tokens evaluated by one `infer()` call. The effective
    /// limit is the smaller of this and the backend's own limit.
    pub max_batch_tokens: Option<usize>,
    /// Prepend the tokenizer's beginning-of-sequence token to text prompts.
    pub add_bos: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_batch_tokens: None,
            add_bos: true,
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_batch_tokens(mut self, max_batch_tokens: usize) -> Self {
        self.max_batch_tokens = Some(max_batch_tokens);
        self
    }

    pub fn with_add_bos(mut self, add_bos: bool) -> Self {
        self.add_bos = add_bos;
        self
    }
}

/// Parameters of the default sampling chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Logits are divided by this before the draw; `<= 0` selects greedily.
    pub temperature: f32,
    /// Keep only the `top_k` best candidates; 0 disables.
    pub top_k: usize,
    /// Nucleus threshold; 1.0 disables.
    pub top_p: f32,
    /// Penalty for recently seen tokens; 1.0 disables.
    pub repetition_penalty: f32,
    /// How many trailing tokens the repetition penalty looks at.
    pub repeat_last_n: usize,
    /// Seed of the categorical draw.
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_k: 25,
            top_p: 1.0,
            repetition_penalty: 1.0,
            repeat_last_n: 64,
            seed: 0,
        }
    }
}

impl SamplingParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_repetition_penalty(mut self, penalty: f32, last_n: usize) -> Self {
        self.repetition_penalty = penalty;
        self.repeat_last_n = last_n;
        self
    }
}
