use std::collections::HashMap;

use crate::backend::TokenId;
use crate::error::{ModelError, Result};
use super::vocab::Vocab;
use super::Tokenizer;

/// Byte-Pair Encoding tokenizer with byte fallback.
#[derive(Debug)]
pub struct BpeTokenizer {
    /// The token vocabulary (strings, scores, special token IDs).
    pub vocab: Vocab,
    /// Map from merge pair to priority rank (lower rank = higher priority).
    merge_ranks: HashMap<(String, String), usize>,
}

impl BpeTokenizer {
    /// Build a tokenizer from a vocabulary and ordered merge rules.
    ///
    /// Earlier merges have higher priority. Both halves and the merged
    /// result of every rule must exist in the vocabulary.
    pub fn new(vocab: Vocab, merges: Vec<(String, String)>) -> Result<BpeTokenizer> {
        let mut merge_ranks = HashMap::with_capacity(merges.len());
        for (rank, (left, right)) in merges.into_iter().enumerate() {
            let merged = format!("{}{}", left, right);
            if !vocab.token_to_id.contains_key(&merged) {
                return Err(ModelError::TokenizerError(format!(
                    "merge result {:?} is not in the vocabulary",
                    merged
                )));
            }
            merge_ranks.entry((left, right)).or_insert(rank);
        }

        Ok(BpeTokenizer { vocab, merge_ranks })
    }

    /// Build a tokenizer from merge rules written as `"left right"`.
    pub fn from_merge_strings(vocab: Vocab, merges: &[&str]) -> Result<BpeTokenizer> {
        let pairs = merges
            .iter()
            .map(|entry| {
                // Split on the first space only.
                entry
                    .split_once(' ')
                    .map(|(l, r)| (l.to_string(), r.to_string()))
                    .ok_or_else(|| {
                        ModelError::TokenizerError(format!("invalid merge entry: {:?}", entry))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(vocab, pairs)
    }

    /// A tokenizer over [`Vocab::byte_level`] with no merges: one token per byte.
    pub fn byte_level() -> BpeTokenizer {
        BpeTokenizer {
            vocab: Vocab::byte_level(),
            merge_ranks: HashMap::new(),
        }
    }

    /// Split text into initial symbols: whole characters when the vocabulary
    /// has them, otherwise one `<0xHH>` symbol per UTF-8 byte.
    fn initial_symbols(&self, text: &str) -> Vec<String> {
        let mut symbols = Vec::with_capacity(text.len());
        let mut buf = [0u8; 4];

        for ch in text.chars() {
            let ch_str = ch.to_string();
            if self.vocab.token_to_id.contains_key(&ch_str) {
                symbols.push(ch_str);
                continue;
            }
            for byte in ch.encode_utf8(&mut buf).bytes() {
                symbols.push(format!("<0x{:02X}>", byte));
            }
        }
        symbols
    }

    /// Repeatedly merge the adjacent pair with the best (lowest) rank.
    fn apply_merges(&self, symbols: &mut Vec<String>) {
        if self.merge_ranks.is_empty() {
            return;
        }
        while symbols.len() >= 2 {
            let best = symbols
                .windows(2)
                .enumerate()
                .filter_map(|(i, pair)| {
                    self.merge_ranks
                        .get(&(pair[0].clone(), pair[1].clone()))
                        .map(|&rank| (rank, i))
                })
                .min();

            let Some((_, idx)) = best else {
                break;
            };
            let right = symbols.remove(idx + 1);
            symbols[idx].push_str(&right);
        }
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut symbols = self.initial_symbols(text);
        self.apply_merges(&mut symbols);

        symbols
            .iter()
            .map(|tok| {
                self.vocab
                    .token_to_id
                    .get(tok)
                    .copied()
                    .unwrap_or(self.vocab.unk_id)
            })
            .collect()
    }

    fn token_bytes(&self, token: TokenId) -> Vec<u8> {
        if self.vocab.is_control(token) {
            return Vec::new();
        }
        let Some(tok) = self.vocab.tokens.get(token as usize) else {
            return Vec::new();
        };

        // Byte-level tokens look like <0xHH>.
        if tok.starts_with("<0x") && tok.ends_with('>') && tok.len() == 6 {
            if let Ok(byte_val) = u8::from_str_radix(&tok[3..5], 16) {
                return vec![byte_val];
            }
        }
        tok.as_bytes().to_vec()
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn bos_id(&self) -> TokenId {
        self.vocab.bos_id
    }

    fn eos_id(&self) -> TokenId {
        self.vocab.eos_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged_vocab() -> Vocab {
        let mut tokens: Vec<String> = Vocab::byte_level().tokens;
        tokens.extend(["a", "b", "ab", "abb"].map(String::from));
        let scores = vec![0.0; tokens.len()];
        Vocab::new(tokens, scores, 0, 1, 2).unwrap()
    }

    #[test]
    fn test_byte_level_roundtrip_text() {
        let tok = BpeTokenizer::byte_level();
        let ids = tok.encode("héllo");
        assert_eq!(ids.len(), "héllo".len());
        assert_eq!(ids[0], 3 + b'h' as u32);
        assert_eq!(tok.decode(&ids), "héllo");
    }

    #[test]
    fn test_empty_text() {
        assert!(BpeTokenizer::byte_level().encode("").is_empty());
    }

    #[test]
    fn test_merges_by_rank() {
        let vocab = merged_vocab();
        let ab = vocab.token_to_id["ab"];
        let abb = vocab.token_to_id["abb"];
        let b = vocab.token_to_id["b"];
        let tok = BpeTokenizer::from_merge_strings(vocab, &["a b", "ab b"]).unwrap();

        assert_eq!(tok.encode("ab"), vec![ab]);
        assert_eq!(tok.encode("abbb"), vec![abb, b]);
        assert_eq!(tok.decode(&tok.encode("abbb")), "abbb");
    }

    #[test]
    fn test_control_tokens_render_nothing() {
        let tok = BpeTokenizer::byte_level();
        let mut ids = vec![tok.bos_id()];
        ids.extend(tok.encode("hi"));
        ids.push(tok.eos_id());
        assert_eq!(tok.decode(&ids), "hi");
        assert!(tok.token_bytes(9999).is_empty());
    }

    #[test]
    fn test_rejects_bad_merges() {
        let err = BpeTokenizer::from_merge_strings(merged_vocab(), &["ab"]).unwrap_err();
        assert!(matches!(err, ModelError::TokenizerError(_)));
        let err = BpeTokenizer::from_merge_strings(merged_vocab(), &["b a"]).unwrap_err();
        assert!(matches!(err, ModelError::TokenizerError(_)));
    }
}
