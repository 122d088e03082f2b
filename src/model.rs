use ndarray::{Array, Array1, Array2, ArrayView1, Axis, concatenate};
use rand::Rng;

use crate::error::{Error, Result};
use crate::family::Family;
use crate::link::{Link, log_normal_cdf};
use crate::prior::Prior;

pub const INTERCEPT: &str = "intercept";
pub const SIGMA: &str = "sigma";

/*
Explanation of each attribute:
- x: design matrix with the intercept column prepended
- y: observed response
- coefficient_names: intercept followed by one name per predictor column
- family: likelihood of each observation
- link: maps the linear predictor to the mean response
- coefficient_priors: one prior per column of x
- scale_prior: prior on sigma, present only for families with a noise scale

Parameter vectors are laid out as [intercept, slopes..., sigma?]. In the
unconstrained space used by the samplers sigma is replaced by log(sigma).
 */
#[derive(Debug, Clone)]
pub struct Model {
    x: Array2<f64>,
    y: Array1<f64>,
    coefficient_names: Vec<String>,
    family: Family,
    link: Link,
    coefficient_priors: Vec<Prior>,
    scale_prior: Option<Prior>,
}

impl Model {
    /*
    What it does: Assembles a regression model with the canonical link and default priors

    Inputs: Predictor matrix (no intercept), response, predictor names, likelihood family
    Outputs: Model or an error for mismatched shapes and invalid responses

    High-level logic: Checks dimensions, validates the response for the family and
    adds the intercept term
     */
    pub fn new(x: Array2<f64>, y: Array1<f64>, predictor_names: Vec<String>, family: Family) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::Dimension(format!(
                "{} rows of predictors but {} responses",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() != predictor_names.len() {
            return Err(Error::Dimension(format!(
                "{} predictor columns but {} names",
                x.ncols(),
                predictor_names.len()
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig("predictors contain non-finite values".to_string()));
        }
        family.validate_response(&y)?;

        let intercept = Array::ones((x.nrows(), 1));
        let x = concatenate![Axis(1), intercept, x];

        let mut coefficient_names = vec![INTERCEPT.to_string()];
        coefficient_names.extend(predictor_names);

        let mut coefficient_priors = vec![Prior::DEFAULT_SLOPE; x.ncols()];
        coefficient_priors[0] = Prior::DEFAULT_INTERCEPT;

        Ok(Model {
            x,
            y,
            coefficient_names,
            family,
            link: family.canonical_link(),
            coefficient_priors,
            scale_prior: family.has_scale().then_some(Prior::DEFAULT_SCALE),
        })
    }

    pub fn with_link(mut self, link: Link) -> Result<Self> {
        if !self.family.supports(link) {
            return Err(Error::InvalidConfig(format!(
                "the {} family does not support the {} link",
                self.family, link
            )));
        }
        self.link = link;
        Ok(self)
    }

    pub fn with_intercept_prior(self, prior: Prior) -> Result<Self> {
        self.with_prior(INTERCEPT, prior)
    }

    /// Same prior on every slope.
    pub fn with_slope_prior(mut self, prior: Prior) -> Result<Self> {
        check_location_prior("slopes", &prior)?;
        for p in self.coefficient_priors.iter_mut().skip(1) {
            *p = prior;
        }
        Ok(self)
    }

    pub fn with_scale_prior(self, prior: Prior) -> Result<Self> {
        self.with_prior(SIGMA, prior)
    }

    /// Overrides the prior of one named parameter.
    pub fn with_prior(mut self, name: &str, prior: Prior) -> Result<Self> {
        prior.validate()?;
        if name == SIGMA {
            if self.scale_prior.is_none() {
                return Err(Error::InvalidConfig(format!(
                    "the {} family has no `{}` parameter",
                    self.family, SIGMA
                )));
            }
            if !prior.is_positive() {
                return Err(Error::InvalidPrior(format!(
                    "{} on `{}` must have positive support",
                    prior, SIGMA
                )));
            }
            self.scale_prior = Some(prior);
            return Ok(self);
        }
        let index = self
            .coefficient_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown parameter `{}`", name)))?;
        check_location_prior(name, &prior)?;
        self.coefficient_priors[index] = prior;
        Ok(self)
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn coefficient_priors(&self) -> &[Prior] {
        &self.coefficient_priors
    }

    pub fn scale_prior(&self) -> Option<Prior> {
        self.scale_prior
    }

    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_coefficients(&self) -> usize {
        self.x.ncols()
    }

    pub fn n_params(&self) -> usize {
        self.n_coefficients() + usize::from(self.scale_prior.is_some())
    }

    pub fn param_names(&self) -> Vec<String> {
        let mut names = self.coefficient_names.clone();
        if self.scale_prior.is_some() {
            names.push(SIGMA.to_string());
        }
        names
    }

    /// Every prior can be drawn from (no flat priors).
    pub fn priors_are_proper(&self) -> bool {
        self.coefficient_priors
            .iter()
            .chain(self.scale_prior.iter())
            .all(|p| *p != Prior::Flat)
    }

    /// Gaussian likelihood, identity link and Normal/Flat coefficient priors.
    pub fn is_conjugate_gaussian(&self) -> bool {
        self.family == Family::Gaussian
            && self.link == Link::Identity
            && self.coefficient_priors.iter().all(|p| p.gaussian_moments().is_some())
    }

    pub fn linear_predictor(&self, beta: ArrayView1<f64>) -> Array1<f64> {
        self.x.dot(&beta)
    }

    pub fn mean_response(&self, beta: ArrayView1<f64>) -> Array1<f64> {
        let link = self.link;
        self.linear_predictor(beta).mapv(|eta| link.inverse(eta))
    }

    /// Splits a constrained parameter vector into coefficients and sigma.
    pub fn split<'a>(&self, params: &'a [f64]) -> (ArrayView1<'a, f64>, f64) {
        let k = self.n_coefficients();
        let beta = ArrayView1::from(&params[..k]);
        let sigma = if self.scale_prior.is_some() { params[k] } else { 1.0 };
        (beta, sigma)
    }

    /// Log likelihood of the full data set at constrained parameters.
    pub fn log_likelihood(&self, params: &[f64]) -> f64 {
        let (beta, sigma) = self.split(params);
        let eta = self.linear_predictor(beta);
        self.log_likelihood_eta(&eta, sigma)
    }

    /// Log likelihood given a precomputed linear predictor.
    pub fn log_likelihood_eta(&self, eta: &Array1<f64>, sigma: f64) -> f64 {
        if self.family == Family::Bernoulli && self.link == Link::Logit {
            // log p = -softplus(-eta), log(1 - p) = -softplus(eta)
            return eta
                .iter()
                .zip(self.y.iter())
                .map(|(&e, &y)| if y == 1.0 { -softplus(-e) } else { -softplus(e) })
                .sum();
        }
        if self.family == Family::Bernoulli && self.link == Link::Probit {
            // log p = ln Phi(eta), log(1 - p) = ln Phi(-eta)
            return eta
                .iter()
                .zip(self.y.iter())
                .map(|(&e, &y)| if y == 1.0 { log_normal_cdf(e) } else { log_normal_cdf(-e) })
                .sum();
        }
        let link = self.link;
        eta.iter()
            .zip(self.y.iter())
            .map(|(&e, &y)| self.family.log_likelihood(y, link.inverse(e), sigma))
            .sum()
    }

    pub fn log_prior(&self, params: &[f64]) -> f64 {
        let (beta, sigma) = self.split(params);
        let mut lp: f64 = beta
            .iter()
            .zip(&self.coefficient_priors)
            .map(|(&b, prior)| prior.log_density(b))
            .sum();
        if let Some(prior) = self.scale_prior {
            lp += prior.log_density(sigma);
        }
        lp
    }

    pub fn constrain(&self, theta: &[f64]) -> Vec<f64> {
        let mut params = theta.to_vec();
        if self.scale_prior.is_some() {
            let k = self.n_coefficients();
            params[k] = theta[k].exp();
        }
        params
    }

    pub fn unconstrain(&self, params: &[f64]) -> Vec<f64> {
        let mut theta = params.to_vec();
        if self.scale_prior.is_some() {
            let k = self.n_coefficients();
            theta[k] = params[k].ln();
        }
        theta
    }

    /// Log posterior up to a constant in unconstrained space, including the log-Jacobian of sigma = exp(theta).
    pub fn log_posterior_unconstrained(&self, theta: &[f64]) -> f64 {
        let params = self.constrain(theta);
        let mut lp = self.log_prior(&params);
        if self.scale_prior.is_some() {
            lp += theta[self.n_coefficients()];
        }
        if !lp.is_finite() {
            return f64::NEG_INFINITY;
        }
        let ll = self.log_likelihood(&params);
        if ll.is_nan() { f64::NEG_INFINITY } else { lp + ll }
    }

    /// Draws a constrained parameter vector from the priors.
    pub fn sample_prior<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f64>> {
        let mut params = self
            .coefficient_priors
            .iter()
            .map(|p| p.sample(rng))
            .collect::<Result<Vec<f64>>>()?;
        if let Some(prior) = self.scale_prior {
            params.push(prior.sample(rng)?);
        }
        Ok(params)
    }

    /// Simulates one replicate of the response at constrained parameters.
    pub fn simulate<R: Rng + ?Sized>(&self, params: &[f64], rng: &mut R) -> Result<Array1<f64>> {
        let (beta, sigma) = self.split(params);
        let mu = self.mean_response(beta);
        mu.iter()
            .map(|&m| self.family.simulate(m, sigma, rng))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }

    /// Adds the intercept column to new predictor rows.
    pub fn with_intercept(&self, x_new: &Array2<f64>) -> Result<Array2<f64>> {
        if x_new.ncols() + 1 != self.n_coefficients() {
            return Err(Error::Dimension(format!(
                "new data has {} columns, model has {} predictors",
                x_new.ncols(),
                self.n_coefficients() - 1
            )));
        }
        let intercept = Array::ones((x_new.nrows(), 1));
        Ok(concatenate![Axis(1), intercept, x_new.view()])
    }
}

fn check_location_prior(name: &str, prior: &Prior) -> Result<()> {
    prior.validate()?;
    if prior.is_positive() {
        return Err(Error::InvalidPrior(format!(
            "{} restricts `{}` to positive values; use it on `{}` only",
            prior, name, SIGMA
        )));
    }
    Ok(())
}

fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}
