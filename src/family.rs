use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use statrs::function::factorial::ln_factorial;

use crate::error::{Error, Result};
use crate::link::Link;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;
// Poisson draws above this rate are not attempted
pub const MAX_POISSON_RATE: f64 = 1e9;

/// Observation distribution tying the mean response to the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Gaussian,
    Bernoulli,
    Poisson,
}

impl Family {
    pub fn canonical_link(&self) -> Link {
        match self {
            Family::Gaussian => Link::Identity,
            Family::Bernoulli => Link::Logit,
            Family::Poisson => Link::Log,
        }
    }

    pub fn supports(&self, link: Link) -> bool {
        matches!(
            (self, link),
            (Family::Gaussian, Link::Identity | Link::Log)
                | (Family::Bernoulli, Link::Logit | Link::Probit)
                | (Family::Poisson, Link::Log | Link::Identity)
        )
    }

    /// Whether the family carries a noise scale parameter (`sigma`).
    pub fn has_scale(&self) -> bool {
        matches!(self, Family::Gaussian)
    }

    pub fn validate_response(&self, y: &Array1<f64>) -> Result<()> {
        if y.is_empty() {
            return Err(Error::Empty("response has no observations".to_string()));
        }
        let bad = y.iter().position(|&v| match self {
            Family::Gaussian => !v.is_finite(),
            Family::Bernoulli => v != 0.0 && v != 1.0,
            Family::Poisson => !(v.is_finite() && v >= 0.0 && v.fract() == 0.0),
        });
        match bad {
            Some(i) => Err(Error::InvalidResponse(format!(
                "value {} at row {} is not valid for the {} family",
                y[i], i, self
            ))),
            None => Ok(()),
        }
    }

    /// Log likelihood of one observation given its mean (and scale for Gaussian).
    pub fn log_likelihood(&self, y: f64, mu: f64, sigma: f64) -> f64 {
        match self {
            Family::Gaussian => {
                if !(sigma > 0.0 && mu.is_finite()) {
                    return f64::NEG_INFINITY;
                }
                let z = (y - mu) / sigma;
                -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            }
            Family::Bernoulli => {
                if !(0.0..=1.0).contains(&mu) {
                    return f64::NEG_INFINITY;
                }
                if y == 1.0 { mu.ln() } else { (1.0 - mu).ln() }
            }
            Family::Poisson => {
                if !(mu > 0.0 && mu.is_finite()) {
                    return if mu == 0.0 && y == 0.0 { 0.0 } else { f64::NEG_INFINITY };
                }
                y * mu.ln() - mu - ln_factorial(y as u64)
            }
        }
    }

    /// Draws one replicate observation.
    pub fn simulate<R: Rng + ?Sized>(&self, mu: f64, sigma: f64, rng: &mut R) -> Result<f64> {
        let invalid = |what: String| Error::InvalidResponse(format!("cannot simulate: {}", what));
        if !mu.is_finite() {
            return Err(invalid(format!("mean response {} is not finite", mu)));
        }
        match self {
            Family::Gaussian => Normal::new(mu, sigma)
                .map(|d| d.sample(rng))
                .map_err(|e| invalid(format!("{} (mu = {}, sigma = {})", e, mu, sigma))),
            Family::Bernoulli => Bernoulli::new(mu)
                .map(|d| if d.sample(rng) { 1.0 } else { 0.0 })
                .map_err(|e| invalid(format!("{} (p = {})", e, mu))),
            Family::Poisson => {
                if mu == 0.0 {
                    return Ok(0.0);
                }
                if mu > MAX_POISSON_RATE {
                    return Err(invalid(format!("rate {} is above {}", mu, MAX_POISSON_RATE)));
                }
                Poisson::new(mu)
                    .map(|d| d.sample(rng))
                    .map_err(|e| invalid(format!("{} (rate = {})", e, mu)))
            }
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Gaussian => "gaussian",
            Family::Bernoulli => "bernoulli",
            Family::Poisson => "poisson",
        };
        f.write_str(name)
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" | "normal" => Ok(Family::Gaussian),
            "bernoulli" | "binary" => Ok(Family::Bernoulli),
            "poisson" => Ok(Family::Poisson),
            other => Err(Error::InvalidConfig(format!("unknown family `{}`", other))),
        }
    }
}
