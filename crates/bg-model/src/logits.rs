use std::ops::Deref;
use std::sync::Arc;

/// Next-token scores over the whole vocabulary.
///
/// Backed by shared immutable storage, so cloning (for example when a
/// conversation is forked) never copies the vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Logits(Arc<[f32]>);

impl Logits {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values.into())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Index of the highest score, or `None` for an empty vector.
    pub fn argmax(&self) -> Option<u32> {
        self.0
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i as u32)
    }

    /// True if both handles point at the same storage.
    pub fn shares_storage(&self, other: &Logits) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }
}

impl Deref for Logits {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for Logits {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}
