//! Single-layer tanh network used as the reference decision function.

use crate::population::Decide;
use anyhow::Result;
use rand::prelude::*;
use rand_distr::{Bernoulli, Normal};
use serde::{Deserialize, Serialize};

/// Number of observation inputs.
pub const N_INPUTS: usize = 3;

/// Fully connected inputs-to-output perceptron with tanh activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    weights: Vec<f64>,
    bias: f64,
}

impl Network {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Create a network with normally distributed weights and bias.
    pub fn random<R: Rng>(rng: &mut R, std_dev: f64) -> Result<Self> {
        let dist = Normal::new(0.0, std_dev)?;
        let weights = (0..N_INPUTS).map(|_| dist.sample(rng)).collect();
        let bias = dist.sample(rng);
        Ok(Self::new(weights, bias))
    }

    /// Perturb each parameter with probability `prob_mut` by Gaussian noise.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R, prob_mut: f64, std_dev_mut: f64) -> Result<()> {
        let mut_dist = Bernoulli::new(prob_mut)?;
        let noise_dist = Normal::new(0.0, std_dev_mut)?;
        for param in self.weights.iter_mut().chain(std::iter::once(&mut self.bias)) {
            if mut_dist.sample(rng) {
                *param += noise_dist.sample(rng);
            }
        }
        Ok(())
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

impl Decide for Network {
    fn activate(&self, inputs: &[f64]) -> Vec<f64> {
        let sum: f64 = self
            .weights
            .iter()
            .zip(inputs)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        vec![sum.tanh()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn activation_is_bounded() {
        let net = Network::new(vec![1.0, -2.0, 0.5], 0.1);
        for inputs in [[0.0, 0.0, 0.0], [700.0, 0.0, 3.0], [-1e9, 1e9, 0.0]] {
            let out = net.activate(&inputs);
            assert_eq!(out.len(), 1);
            assert!((-1.0..=1.0).contains(&out[0]));
        }
        assert_eq!(net.activate(&[0.0; 3]), vec![0.1_f64.tanh()]);
    }

    #[test]
    fn mutation_changes_parameters() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let net = Network::random(&mut rng, 1.0).expect("failed to create network");
        assert_eq!(net.weights().len(), N_INPUTS);

        let mut unchanged = net.clone();
        unchanged
            .mutate(&mut rng, 0.0, 1.0)
            .expect("failed to mutate network");
        assert_eq!(unchanged, net);

        let mut changed = net.clone();
        changed
            .mutate(&mut rng, 1.0, 1.0)
            .expect("failed to mutate network");
        assert!(changed.weights().iter().zip(net.weights()).all(|(a, b)| a != b));
        assert_ne!(changed.bias(), net.bias());
    }
}
