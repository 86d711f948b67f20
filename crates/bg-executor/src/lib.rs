//! `bg-executor` - Batched multi-sequence execution with forkable
//! conversations and classifier-free guidance.
//!
//! A [`BatchedExecutor`] owns a [`Backend`](bg_model::Backend) and any number
//! of [`Conversation`]s. Conversations record tokens cheaply; one
//! [`BatchedExecutor::infer`] call then evaluates every pending conversation
//! in a single backend pass. [`Conversation::fork`] branches a conversation
//! without re-evaluating its history, and [`GuidedSampler`] steers one
//! conversation's sampling with another's logits.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use bg_executor::*;
//! # use bg_model::{BpeTokenizer, TinyModel, TinyModelConfig};
//! # async fn run() -> bg_executor::Result<()> {
//! let model = TinyModel::new(TinyModelConfig::default())?;
//! let executor = BatchedExecutor::new(
//!     model,
//!     Arc::new(BpeTokenizer::byte_level()),
//!     ExecutorConfig::default(),
//! )?;
//!
//! let guided = executor.prompt("A cheerful story")?;
//! let guidance = executor.prompt("A story")?;
//! executor.infer().await?;
//!
//! let mut sampler = GuidedSampler::new(Some(&guidance), 1.5, SamplingParams::default());
//! let out = generate(&executor, &guided, &[&guidance], &mut sampler, 32).await?;
//! println!("{:?}", out.tokens);
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod config;
pub mod conversation;
pub mod error;
pub mod executor;
pub mod generate;
pub mod history;
pub mod sampling;
pub mod sequence;

pub use arena::{ConversationId, SlotArena};
pub use config::{ExecutorConfig, SamplingParams};
pub use conversation::Conversation;
pub use error::{ExecutorError, Result};
pub use executor::BatchedExecutor;
pub use generate::{generate, Generation, StopReason};
pub use history::TokenHistory;
pub use sampling::{
    apply_guidance, DefaultSamplingPipeline, GuidedSampler, SamplingContext, SamplingPipeline,
};
pub use sequence::SequenceState;
