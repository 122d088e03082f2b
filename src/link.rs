use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{Error, Result};

/// Maps the linear predictor onto the scale of the response mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    Identity,
    Logit,
    Probit,
    Log,
}

fn standard_normal() -> Normal {
    // (0, 1) are always valid parameters
    Normal::new(0.0, 1.0).unwrap_or_else(|_| unreachable!())
}

// Below this the normal cdf is evaluated through its asymptotic tail expansion
const PROBIT_TAIL: f64 = -30.0;
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// ln Phi(x) for the standard normal cdf, finite far into the lower tail.
pub fn log_normal_cdf(x: f64) -> f64 {
    if x > PROBIT_TAIL {
        return standard_normal().cdf(x).ln();
    }
    let inv2 = 1.0 / (x * x);
    -0.5 * x * x - (-x).ln() - LN_SQRT_2PI + (1.0 - inv2 + 3.0 * inv2 * inv2).ln()
}

impl Link {
    /// Mean response for a linear predictor value.
    pub fn inverse(&self, eta: f64) -> f64 {
        match self {
            Link::Identity => eta,
            Link::Logit => {
                if eta >= 0.0 {
                    1.0 / (1.0 + (-eta).exp())
                } else {
                    let e = eta.exp();
                    e / (1.0 + e)
                }
            }
            Link::Probit => standard_normal().cdf(eta),
            Link::Log => eta.exp(),
        }
    }

    /// Linear predictor value for a mean response.
    pub fn apply(&self, mu: f64) -> f64 {
        match self {
            Link::Identity => mu,
            Link::Logit => (mu / (1.0 - mu)).ln(),
            Link::Probit => standard_normal().inverse_cdf(mu),
            Link::Log => mu.ln(),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Link::Identity => "identity",
            Link::Logit => "logit",
            Link::Probit => "probit",
            Link::Log => "log",
        };
        f.write_str(name)
    }
}

impl FromStr for Link {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(Link::Identity),
            "logit" | "logistic" => Ok(Link::Logit),
            "probit" => Ok(Link::Probit),
            "log" => Ok(Link::Log),
            other => Err(Error::InvalidConfig(format!("unknown link `{}`", other))),
        }
    }
}
