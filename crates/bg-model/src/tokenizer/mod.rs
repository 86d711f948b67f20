pub mod bpe;
pub mod vocab;

pub use bpe::BpeTokenizer;
pub use vocab::Vocab;

use crate::backend::TokenId;

/// Text to token conversion, consumed by the executor and the streaming decoder.
pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids. Does not add a beginning-of-sequence token.
    fn encode(&self, text: &str) -> Vec<TokenId>;

    /// Raw bytes rendered by a single token. Control tokens render nothing.
    fn token_bytes(&self, token: TokenId) -> Vec<u8>;

    /// Decode token ids into text, replacing invalid UTF-8 lossily.
    fn decode(&self, tokens: &[TokenId]) -> String {
        let bytes: Vec<u8> = tokens.iter().flat_map(|&t| self.token_bytes(t)).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Number of entries in the vocabulary.
    fn vocab_size(&self) -> usize;

    /// Beginning-of-sequence token id.
    fn bos_id(&self) -> TokenId;

    /// End-of-sequence token id.
    fn eos_id(&self) -> TokenId;
}
