//! `bg-model` - Collaborators of the batched executor.
//!
//! This crate provides:
//! - The [`Backend`] trait: combined forward evaluation of many sequences,
//!   plus per-sequence cache fork, truncation and removal
//! - [`Batch`] and [`Logits`], the data crossing that boundary
//! - [`TinyModel`], a deterministic reference backend
//! - A [`Tokenizer`] trait with a byte-fallback BPE implementation
//! - [`StreamingDecoder`] for incremental detokenization

pub mod backend;
pub mod error;
pub mod logits;
pub mod streaming;
pub mod tiny;
pub mod tokenizer;

pub use backend::{Backend, Batch, BatchEntry, SequenceId, TokenId};
pub use error::{ModelError, Result};
pub use logits::Logits;
pub use streaming::StreamingDecoder;
pub use tiny::{TinyModel, TinyModelConfig};
pub use tokenizer::{BpeTokenizer, Tokenizer, Vocab};
