//! `bg-sampler` - Logit stages and token selectors for batched-guidance.
//!
//! Stages operate on a candidate list of [`TokenLogit`] and are composed with
//! [`SamplerChain`]. The last stage of a chain is a selector that leaves a
//! single candidate behind.

pub mod greedy;
pub mod repetition;
pub mod sampler;
pub mod temperature;
pub mod top_k;
pub mod top_p;

pub use greedy::{DistSampler, GreedySampler};
pub use repetition::RepetitionPenaltySampler;
pub use sampler::{softmax, Sampler, SamplerChain, TokenLogit};
pub use temperature::TemperatureSampler;
pub use top_k::TopKSampler;
pub use top_p::TopPSampler;
