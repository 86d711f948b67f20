use std::collections::HashMap;

use crate::backend::TokenId;
use crate::error::{ModelError, Result};

/// Size of the vocabulary built by [`Vocab::byte_level`].
pub const BYTE_LEVEL_VOCAB_SIZE: usize = 3 + 256;

/// Token vocabulary.
#[derive(Debug, Clone)]
pub struct Vocab {
    /// Token strings, indexed by token ID.
    pub tokens: Vec<String>,
    /// Merge priority scores, indexed by token ID.
    pub scores: Vec<f32>,
    /// Reverse mapping from token string to token ID.
    pub token_to_id: HashMap<String, TokenId>,
    /// Unknown-token ID, used for text that has no byte token.
    pub unk_id: TokenId,
    /// Beginning-of-sequence token ID.
    pub bos_id: TokenId,
    /// End-of-sequence token ID.
    pub eos_id: TokenId,
}

impl Vocab {
    /// Build a vocabulary from token strings and their scores.
    pub fn new(
        tokens: Vec<String>,
        scores: Vec<f32>,
        unk_id: TokenId,
        bos_id: TokenId,
        eos_id: TokenId,
    ) -> Result<Vocab> {
        if tokens.len() != scores.len() {
            return Err(ModelError::TokenizerError(format!(
                "tokens length ({}) does not match scores length ({})",
                tokens.len(),
                scores.len()
            )));
        }
        for id in [unk_id, bos_id, eos_id] {
            if id as usize >= tokens.len() {
                return Err(ModelError::TokenOutOfRange {
                    token: id,
                    vocab_size: tokens.len(),
                });
            }
        }

        let mut token_to_id = HashMap::with_capacity(tokens.len());
        for (id, tok) in tokens.iter().enumerate() {
            token_to_id.insert(tok.clone(), id as TokenId);
        }

        Ok(Vocab {
            tokens,
            scores,
            token_to_id,
            unk_id,
            bos_id,
            eos_id,
        })
    }

    /// The minimal vocabulary: `<unk>`, `<s>`, `</s>` followed by one
    /// `<0xHH>` token per byte value.
    pub fn byte_level() -> Vocab {
        let mut tokens = vec!["<unk>".to_string(), "<s>".to_string(), "</s>".to_string()];
        tokens.extend((0..=255u8).map(|b| format!("<0x{:02X}>", b)));
        let scores = vec![0.0; tokens.len()];

        let token_to_id = tokens
            .iter()
            .enumerate()
            .map(|(id, tok)| (tok.clone(), id as TokenId))
            .collect();

        Vocab {
            tokens,
            scores,
            token_to_id,
            unk_id: 0,
            bos_id: 1,
            eos_id: 2,
        }
    }

    /// Number of tokens in the vocabulary.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True for tokens that render no text.
    pub fn is_control(&self, id: TokenId) -> bool {
        id == self.bos_id || id == self.eos_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_level_layout() {
        let v = Vocab::byte_level();
        assert_eq!(v.len(), BYTE_LEVEL_VOCAB_SIZE);
        assert_eq!(v.token_to_id["<0x41>"], 3 + 0x41);
        assert!(v.is_control(2));
        assert!(!v.is_control(0));
    }

    #[test]
    fn test_new_rejects_mismatched_scores() {
        let err = Vocab::new(vec!["a".into()], vec![], 0, 0, 0).unwrap_err();
        assert!(matches!(err, ModelError::TokenizerError(_)));
    }

    #[test]
    fn test_new_rejects_special_out_of_range() {
        let err = Vocab::new(vec!["a".into()], vec![0.0], 0, 0, 1).unwrap_err();
        assert!(matches!(err, ModelError::TokenOutOfRange { token: 1, .. }));
    }
}
