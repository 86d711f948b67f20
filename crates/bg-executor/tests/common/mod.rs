use std::sync::Arc;

use bg_executor::{BatchedExecutor, ExecutorConfig};
use bg_model::{BpeTokenizer, TinyModel, TinyModelConfig};

#[allow(dead_code)]
pub fn executor() -> BatchedExecutor {
    executor_with(TinyModelConfig::default(), ExecutorConfig::default())
}

pub fn executor_with(model: TinyModelConfig, config: ExecutorConfig) -> BatchedExecutor {
    let model = TinyModel::new(model).unwrap();
    BatchedExecutor::new(model, Arc::new(BpeTokenizer::byte_level()), config).unwrap()
}

/// Token id of a single byte in the byte-level vocabulary.
#[allow(dead_code)]
pub fn byte(b: u8) -> u32 {
    3 + b as u32
}
