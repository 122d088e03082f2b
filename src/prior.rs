//! Prior distributions for regression coefficients and scale parameters.

use std::f64::consts::{LN_2, PI};
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_distr::{Cauchy, Distribution, Exp, Gamma, Normal, StudentT, Uniform};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::error::{Error, Result};

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "lowercase")]
pub enum Prior {
    Normal { mu: f64, sigma: f64 },
    Cauchy { loc: f64, scale: f64 },
    StudentT { nu: f64, mu: f64, sigma: f64 },
    HalfNormal { sigma: f64 },
    HalfCauchy { scale: f64 },
    Exponential { rate: f64 },
    Uniform { lower: f64, upper: f64 },
    InverseGamma { shape: f64, scale: f64 },
    /// Improper constant density; cannot be sampled.
    Flat,
}

impl Prior {
    pub const DEFAULT_INTERCEPT: Prior = Prior::Normal { mu: 0.0, sigma: 10.0 };
    pub const DEFAULT_SLOPE: Prior = Prior::Normal { mu: 0.0, sigma: 2.5 };
    pub const DEFAULT_SCALE: Prior = Prior::HalfNormal { sigma: 10.0 };

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let ok = match *self {
            Prior::Normal { mu, sigma } => mu.is_finite() && positive(sigma),
            Prior::Cauchy { loc, scale } => loc.is_finite() && positive(scale),
            Prior::StudentT { nu, mu, sigma } => positive(nu) && mu.is_finite() && positive(sigma),
            Prior::HalfNormal { sigma } => positive(sigma),
            Prior::HalfCauchy { scale } => positive(scale),
            Prior::Exponential { rate } => positive(rate),
            Prior::Uniform { lower, upper } => lower.is_finite() && upper.is_finite() && lower < upper,
            Prior::InverseGamma { shape, scale } => positive(shape) && positive(scale),
            Prior::Flat => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidPrior(format!("bad parameters in {}", self)))
        }
    }

    /// Support is (0, inf); such priors belong on scale parameters.
    pub fn is_positive(&self) -> bool {
        match *self {
            Prior::HalfNormal { .. }
            | Prior::HalfCauchy { .. }
            | Prior::Exponential { .. }
            | Prior::InverseGamma { .. } => true,
            Prior::Uniform { lower, .. } => lower >= 0.0,
            _ => false,
        }
    }

    /// Normalized log density, `-inf` outside the support.
    pub fn log_density(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return f64::NEG_INFINITY;
        }
        match *self {
            Prior::Normal { mu, sigma } => {
                let z = (x - mu) / sigma;
                -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            }
            Prior::Cauchy { loc, scale } => {
                let z = (x - loc) / scale;
                -(PI * scale).ln() - (1.0 + z * z).ln()
            }
            Prior::StudentT { nu, mu, sigma } => {
                let z = (x - mu) / sigma;
                ln_gamma((nu + 1.0) / 2.0)
                    - ln_gamma(nu / 2.0)
                    - 0.5 * (nu * PI).ln()
                    - sigma.ln()
                    - (nu + 1.0) / 2.0 * (1.0 + z * z / nu).ln()
            }
            Prior::HalfNormal { sigma } => {
                if x < 0.0 {
                    return f64::NEG_INFINITY;
                }
                let z = x / sigma;
                LN_2 - 0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            }
            Prior::HalfCauchy { scale } => {
                if x < 0.0 {
                    return f64::NEG_INFINITY;
                }
                let z = x / scale;
                LN_2 - (PI * scale).ln() - (1.0 + z * z).ln()
            }
            Prior::Exponential { rate } => {
                if x < 0.0 {
                    return f64::NEG_INFINITY;
                }
                rate.ln() - rate * x
            }
            Prior::Uniform { lower, upper } => {
                if (lower..=upper).contains(&x) {
                    -(upper - lower).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            Prior::InverseGamma { shape, scale } => {
                if x <= 0.0 {
                    return f64::NEG_INFINITY;
                }
                shape * scale.ln() - ln_gamma(shape) - (shape + 1.0) * x.ln() - scale / x
            }
            Prior::Flat => 0.0,
        }
    }

    /*
    What it does: Draws one value from the prior

    Inputs: Random number generator
    Outputs: A sample, or an error for an improper or invalid prior

    High-level logic:
    - Uses the rand_distr distributions directly where they exist
    - Half distributions take the absolute value of the symmetric draw
    - Inverse gamma is taken by doing 1 / gamma sample with rate = scale
     */
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.validate()?;
        let invalid = |e: &dyn fmt::Display| Error::InvalidPrior(format!("{}: {}", self, e));
        let value = match *self {
            Prior::Normal { mu, sigma } => Normal::new(mu, sigma).map_err(|e| invalid(&e))?.sample(rng),
            Prior::Cauchy { loc, scale } => Cauchy::new(loc, scale).map_err(|e| invalid(&e))?.sample(rng),
            Prior::StudentT { nu, mu, sigma } => {
                mu + sigma * StudentT::new(nu).map_err(|e| invalid(&e))?.sample(rng)
            }
            Prior::HalfNormal { sigma } => Normal::new(0.0, sigma).map_err(|e| invalid(&e))?.sample(rng).abs(),
            Prior::HalfCauchy { scale } => Cauchy::new(0.0, scale).map_err(|e| invalid(&e))?.sample(rng).abs(),
            Prior::Exponential { rate } => Exp::new(rate).map_err(|e| invalid(&e))?.sample(rng),
            Prior::Uniform { lower, upper } => Uniform::new(lower, upper).sample(rng),
            Prior::InverseGamma { shape, scale } => {
                let gamma = Gamma::new(shape, 1.0 / scale).map_err(|e| invalid(&e))?;
                1.0 / gamma.sample(rng)
            }
            Prior::Flat => {
                return Err(Error::InvalidPrior(
                    "flat prior is improper and cannot be sampled".to_string(),
                ));
            }
        };
        Ok(value)
    }

    /// Mean and standard deviation when the prior is Normal or Flat; used by the Gibbs update.
    pub fn gaussian_moments(&self) -> Option<(f64, f64)> {
        match *self {
            Prior::Normal { mu, sigma } => Some((mu, sigma)),
            Prior::Flat => Some((0.0, f64::INFINITY)),
            _ => None,
        }
    }
}

impl fmt::Display for Prior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Prior::Normal { mu, sigma } => write!(f, "normal({}, {})", mu, sigma),
            Prior::Cauchy { loc, scale } => write!(f, "cauchy({}, {})", loc, scale),
            Prior::StudentT { nu, mu, sigma } => write!(f, "studentt({}, {}, {})", nu, mu, sigma),
            Prior::HalfNormal { sigma } => write!(f, "halfnormal({})", sigma),
            Prior::HalfCauchy { scale } => write!(f, "halfcauchy({})", scale),
            Prior::Exponential { rate } => write!(f, "exponential({})", rate),
            Prior::Uniform { lower, upper } => write!(f, "uniform({}, {})", lower, upper),
            Prior::InverseGamma { shape, scale } => write!(f, "invgamma({}, {})", shape, scale),
            Prior::Flat => write!(f, "flat"),
        }
    }
}

impl FromStr for Prior {
    type Err = Error;

    /// Parses `name(arg, ...)`, e.g. `normal(0, 2.5)` or `halfcauchy(5)`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "flat" {
            return Ok(Prior::Flat);
        }
        let bad = || Error::InvalidPrior(format!("cannot parse `{}`", s));
        let open = s.find('(').ok_or_else(bad)?;
        let inner = s[open + 1..].strip_suffix(')').ok_or_else(bad)?;
        let args: Vec<f64> = inner
            .split(',')
            .map(|a| a.trim().parse::<f64>().map_err(|_| bad()))
            .collect::<Result<_>>()?;

        let prior = match (s[..open].trim(), args.as_slice()) {
            ("normal", &[mu, sigma]) => Prior::Normal { mu, sigma },
            ("cauchy", &[loc, scale]) => Prior::Cauchy { loc, scale },
            ("studentt", &[nu, mu, sigma]) => Prior::StudentT { nu, mu, sigma },
            ("halfnormal", &[sigma]) => Prior::HalfNormal { sigma },
            ("halfcauchy", &[scale]) => Prior::HalfCauchy { scale },
            ("exponential", &[rate]) => Prior::Exponential { rate },
            ("uniform", &[lower, upper]) => Prior::Uniform { lower, upper },
            ("invgamma", &[shape, scale]) => Prior::InverseGamma { shape, scale },
            _ => return Err(bad()),
        };
        prior.validate()?;
        Ok(prior)
    }
}
