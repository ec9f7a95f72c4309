//! Exploratory perturbation of the bias adjustment
//!
//! Variation is never drawn from ambient randomness. A policy is passed into each
//! evaluation and maps the session's evaluation index to a multiplicative factor,
//! so a replay with the same policy and history reproduces every decision.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Perturbation strategy applied to the bias adjustment factor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerturbationPolicy {
    /// No variation (factor 1.0)
    #[default]
    None,
    /// Factor drawn uniformly from `[1 - amplitude, 1 + amplitude]`
    Seeded { seed: u64, amplitude: f64 },
    /// Factors cycled by evaluation index
    FixedTable { factors: Vec<f64> },
}

impl PerturbationPolicy {
    pub fn seeded(seed: u64, amplitude: f64) -> Self {
        PerturbationPolicy::Seeded { seed, amplitude }
    }

    pub fn fixed_table(factors: Vec<f64>) -> Self {
        PerturbationPolicy::FixedTable { factors }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PerturbationPolicy::None)
    }

    /// Multiplicative factor for the `index`-th evaluation of a session
    pub fn factor(&self, index: u64) -> f64 {
        match self {
            PerturbationPolicy::None => 1.0,
            PerturbationPolicy::Seeded { seed, amplitude } => {
                let amplitude = amplitude.abs();
                if amplitude == 0.0 {
                    return 1.0;
                }
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index));
                rng.gen_range((1.0 - amplitude)..=(1.0 + amplitude))
            }
            PerturbationPolicy::FixedTable { factors } => {
                if factors.is_empty() {
                    return 1.0;
                }
                factors[(index % factors.len() as u64) as usize]
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PerturbationPolicy::None => Ok(()),
            PerturbationPolicy::Seeded { amplitude, .. } => {
                if !amplitude.is_finite() || !(0.0..=0.5).contains(amplitude) {
                    return Err(Error::Config(format!(
                        "perturbation amplitude must be within [0, 0.5], got {}",
                        amplitude
                    )));
                }
                Ok(())
            }
            PerturbationPolicy::FixedTable { factors } => {
                if factors.is_empty() {
                    return Err(Error::Config(
                        "perturbation table must contain at least one factor".into(),
                    ));
                }
                if let Some(bad) = factors.iter().find(|f| !f.is_finite() || **f <= 0.0) {
                    return Err(Error::Config(format!(
                        "perturbation factors must be positive, got {}",
                        bad
                    )));
                }
                Ok(())
            }
        }
    }
}
