//! Copy-on-write token history.
//!
//! A history is a list of frozen, reference-counted segments followed by a
//! private growable tail. Forking freezes the tail once and then only clones
//! segment handles, so both sides share every token up to the fork point and
//! grow independent tails afterwards.

use std::sync::Arc;

use bg_model::TokenId;

#[derive(Debug, Clone, Default)]
pub struct TokenHistory {
    segments: Vec<Arc<[TokenId]>>,
    frozen_len: usize,
    tail: Vec<TokenId>,
}

impl TokenHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens(tokens: Vec<TokenId>) -> Self {
        Self {
            segments: Vec::new(),
            frozen_len: 0,
            tail: tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.frozen_len + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, token: TokenId) {
        self.tail.push(token);
    }

    pub fn extend(&mut self, tokens: &[TokenId]) {
        self.tail.extend_from_slice(tokens);
    }

    pub fn get(&self, index: usize) -> Option<TokenId> {
        if index >= self.frozen_len {
            return self.tail.get(index - self.frozen_len).copied();
        }
        let mut start = 0;
        for segment in &self.segments {
            if index < start + segment.len() {
                return Some(segment[index - start]);
            }
            start += segment.len();
        }
        None
    }

    pub fn last(&self) -> Option<TokenId> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.segments
            .iter()
            .flat_map(|s| s.iter().copied())
            .chain(self.tail.iter().copied())
    }

    /// Tokens in `start..end`, clamped to the history length.
    pub fn range(&self, start: usize, end: usize) -> Vec<TokenId> {
        let end = end.min(self.len());
        if start >= end {
            return Vec::new();
        }
        if start >= self.frozen_len {
            return self.tail[start - self.frozen_len..end - self.frozen_len].to_vec();
        }
        self.iter().skip(start).take(end - start).collect()
    }

    pub fn to_vec(&self) -> Vec<TokenId> {
        self.iter().collect()
    }

    /// Split off a history sharing every current token with `self`.
    pub fn fork(&mut self) -> TokenHistory {
        self.freeze();
        self.clone()
    }

    /// Move the private tail into a shared segment.
    fn freeze(&mut self) {
        if self.tail.is_empty() {
            return;
        }
        let tail = std::mem::take(&mut self.tail);
        self.frozen_len += tail.len();
        self.segments.push(tail.into());
    }

    /// Keep only the first `len` tokens.
    ///
    /// Shared segments are never mutated: a segment cut in the middle has its
    /// surviving part copied into the private tail.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        if len >= self.frozen_len {
            self.tail.truncate(len - self.frozen_len);
            return;
        }

        let mut kept = 0;
        let mut keep_segments = 0;
        for segment in &self.segments {
            if kept + segment.len() > len {
                break;
            }
            kept += segment.len();
            keep_segments += 1;
        }

        let partial = self
            .segments
            .get(keep_segments)
            .map(|s| s[..len - kept].to_vec())
            .unwrap_or_default();
        self.segments.truncate(keep_segments);
        self.frozen_len = kept;
        self.tail = partial;
    }

    /// True if both histories share their first frozen segment.
    pub fn shares_prefix_storage(&self, other: &TokenHistory) -> bool {
        match (self.segments.first(), other.segments.first()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Number of frozen segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

impl PartialEq for TokenHistory {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for TokenHistory {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_get_range() {
        let mut h = TokenHistory::from_tokens(vec![1, 2, 3]);
        h.push(4);
        h.extend(&[5, 6]);
        assert_eq!(h.len(), 6);
        assert_eq!(h.get(3), Some(4));
        assert_eq!(h.get(6), None);
        assert_eq!(h.range(2, 5), vec![3, 4, 5]);
        assert_eq!(h.range(4, 100), vec![5, 6]);
        assert!(h.range(5, 2).is_empty());
        assert_eq!(h.last(), Some(6));
    }

    #[test]
    fn test_fork_shares_prefix() {
        let mut a = TokenHistory::from_tokens(vec![1, 2, 3]);
        let mut b = a.fork();
        assert!(a.shares_prefix_storage(&b));
        assert_eq!(a, b);

        a.push(10);
        b.extend(&[20, 21]);
        assert_eq!(a.to_vec(), vec![1, 2, 3, 10]);
        assert_eq!(b.to_vec(), vec![1, 2, 3, 20, 21]);
        assert_eq!(b.get(1), Some(2));
        assert_eq!(b.range(1, 4), vec![2, 3, 20]);
    }

    #[test]
    fn test_repeated_forks_do_not_copy() {
        let mut a = TokenHistory::from_tokens(vec![1, 2]);
        let b = a.fork();
        let c = a.fork();
        assert_eq!(a.segment_count(), 1);
        assert!(b.shares_prefix_storage(&c));
    }

    #[test]
    fn test_truncate_inside_shared_segment() {
        let mut a = TokenHistory::from_tokens(vec![1, 2, 3, 4]);
        let b = a.fork();
        a.push(5);

        a.truncate(2);
        assert_eq!(a.to_vec(), vec![1, 2]);
        assert_eq!(b.to_vec(), vec![1, 2, 3, 4]);

        a.push(9);
        assert_eq!(a.to_vec(), vec![1, 2, 9]);
    }

    #[test]
    fn test_truncate_across_segments() {
        let mut a = TokenHistory::from_tokens(vec![1, 2]);
        let _ = a.fork();
        a.extend(&[3, 4]);
        let _ = a.fork();
        a.push(5);
        assert_eq!(a.segment_count(), 2);

        a.truncate(4);
        assert_eq!(a.to_vec(), vec![1, 2, 3, 4]);
        a.truncate(3);
        assert_eq!(a.to_vec(), vec![1, 2, 3]);
        assert_eq!(a.segment_count(), 1);
        a.truncate(0);
        assert!(a.is_empty());
    }
}
