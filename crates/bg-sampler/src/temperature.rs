use crate::sampler::{Sampler, TokenLogit};

/// Scales all logits by dividing by a temperature value.
///
/// Higher temperatures flatten the distribution, lower temperatures sharpen it.
pub struct TemperatureSampler {
    temperature: f32,
}

impl TemperatureSampler {
    /// Create a new temperature stage with the given temperature.
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

impl Sampler for TemperatureSampler {
    fn name(&self) -> &str {
        "temperature"
    }

    fn apply(&mut self, logits: &mut Vec<TokenLogit>) {
        // Non-positive temperatures collapse toward greedy selection.
        let temp = if self.temperature <= 0.0 {
            1e-7
        } else {
            self.temperature
        };

        for token in logits.iter_mut() {
            token.logit /= temp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scales_logits() {
        let mut c = TokenLogit::from_dense(&[0.8, -1.6]);
        TemperatureSampler::new(0.8).apply(&mut c);
        assert_relative_eq!(c[0].logit, 1.0, epsilon = 1e-6);
        assert_relative_eq!(c[1].logit, -2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unit_temperature_is_identity() {
        let mut c = TokenLogit::from_dense(&[0.25, 3.0]);
        TemperatureSampler::new(1.0).apply(&mut c);
        assert_eq!(c, TokenLogit::from_dense(&[0.25, 3.0]));
    }

    #[test]
    fn test_zero_temperature_keeps_order() {
        let mut c = TokenLogit::from_dense(&[0.1, 0.2]);
        TemperatureSampler::new(0.0).apply(&mut c);
        assert!(c[1].logit > c[0].logit);
        assert!(c[0].logit.is_finite());
    }
}
