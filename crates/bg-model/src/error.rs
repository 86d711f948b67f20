use thiserror::Error;

use crate::backend::{SequenceId, TokenId};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown sequence: {0}")]
    UnknownSequence(SequenceId),
    #[error("sequence already exists: {0}")]
    SequenceExists(SequenceId),
    #[error("position mismatch for sequence {sequence}: cache holds {expected} positions, batch starts at {got}")]
    PositionMismatch {
        sequence: SequenceId,
        expected: usize,
        got: usize,
    },
    #[error("token id {token} exceeds vocab size {vocab_size}")]
    TokenOutOfRange { token: TokenId, vocab_size: usize },
    #[error("sequence {sequence} exceeds context window of {max_seq_len} positions")]
    ContextFull {
        sequence: SequenceId,
        max_seq_len: usize,
    },
    #[error("batch entry for sequence {0} has no tokens")]
    EmptyBatchEntry(SequenceId),
    #[error("tokenizer error: {0}")]
    TokenizerError(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
