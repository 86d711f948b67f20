use bg_model::{ModelError, TokenId};
use thiserror::Error;

use crate::arena::ConversationId;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("invalid model state: {0}")]
    InvalidModelState(String),
    #[error("batch of {requested} pending tokens exceeds the limit of {limit}")]
    BatchSizeExceeded { requested: usize, limit: usize },
    #[error("conversation {0} has no valid logits; prompt it and run infer() first")]
    StaleState(ConversationId),
    #[error("conversation or executor has been disposed")]
    UseAfterDispose,
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("token id {token} exceeds vocab size {vocab_size}")]
    TokenOutOfRange { token: TokenId, vocab_size: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("logits length mismatch: expected {expected}, got {got}")]
    LogitsLengthMismatch { expected: usize, got: usize },
    #[error("backend error: {0}")]
    Backend(#[from] ModelError),
    #[error("inference task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
