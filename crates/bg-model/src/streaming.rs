use std::sync::Arc;

use crate::backend::TokenId;
use crate::tokenizer::Tokenizer;

/// Incrementally renders generated tokens to text.
///
/// A token may end in the middle of a multi-byte UTF-8 character; those
/// bytes are held back until a later token completes the character.
pub struct StreamingDecoder {
    tokenizer: Arc<dyn Tokenizer>,
    tokens: Vec<TokenId>,
    pending: Vec<u8>,
}

impl StreamingDecoder {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            tokens: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Append one token.
    pub fn add(&mut self, token: TokenId) {
        self.tokens.push(token);
        self.pending.extend(self.tokenizer.token_bytes(token));
    }

    /// Append several tokens.
    pub fn add_all(&mut self, tokens: &[TokenId]) {
        for &token in tokens {
            self.add(token);
        }
    }

    /// Text completed since the previous `read`.
    ///
    /// Invalid byte sequences are replaced with U+FFFD; an incomplete
    /// sequence at the end is kept for the next call.
    pub fn read(&mut self) -> String {
        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // `valid_up_to` marks the end of a valid prefix.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Everything left, including an incomplete trailing sequence.
    pub fn flush(&mut self) -> String {
        let mut out = self.read();
        if !self.pending.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        out
    }

    /// Every token added so far.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Discard all tokens and buffered bytes.
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.pending.clear();
    }
}
