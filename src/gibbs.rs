// Gibbs sampler for Gaussian linear regression with Normal coefficient priors
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::config::McmcConfig;
use crate::error::{Error, Result};
use crate::linalg::{cholesky_lower, inverse_spd};
use crate::model::Model;
use crate::sampler::{AdaptiveStep, ChainDraws, Sampler, accept};

// Random-walk moves of log(sigma) per coefficient draw; each costs O(1) once the SSR is known
const SIGMA_STEPS: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct GibbsSampler;

/*
Quantities that do not change between iterations:
- xt_x, xt_y: cross products of the design matrix and response
- prior_precision: diagonal of the inverse prior covariance (0 for flat priors)
- prior_mean: prior means of the coefficients
 */
struct Conjugate<'a> {
    model: &'a Model,
    xt_x: Array2<f64>,
    xt_y: Array1<f64>,
    prior_precision: Array1<f64>,
    prior_mean: Array1<f64>,
}

impl<'a> Conjugate<'a> {
    fn new(model: &'a Model) -> Result<Self> {
        let x = model.x();
        let y = model.y();
        let moments = model
            .coefficient_priors()
            .iter()
            .map(|p| p.gaussian_moments())
            .collect::<Option<Vec<(f64, f64)>>>()
            .ok_or_else(|| Error::UnsupportedSampler {
                sampler: "gibbs",
                reason: "coefficient priors must be normal or flat".to_string(),
            })?;

        Ok(Conjugate {
            model,
            xt_x: x.t().dot(x),
            xt_y: x.t().dot(y),
            prior_precision: moments.iter().map(|&(_, sd)| 1.0 / (sd * sd)).collect(),
            prior_mean: moments.iter().map(|&(mu, _)| mu).collect(),
        })
    }

    /*
    What it does: Samples the coefficients from their full conditional given sigma

    Inputs: Current variance, random number generator
    Outputs: 1D Array with one value per coefficient

    High-level logic:
    - Posterior covariance is Sigma_n = (X_transpose * X / variance + Sigma_0^-1)^-1
    - Posterior mean is mu_n = Sigma_n * (X_transpose * y / variance + Sigma_0^-1 * mu_0)
    - Draws z from N(0, 1) and transforms it with the Cholesky factor,
      beta = mu_n + L * z
     */
    fn sample_beta(&self, variance: f64, rng: &mut StdRng) -> Result<Array1<f64>> {
        let mut precision = self.xt_x.mapv(|v| v / variance);
        for (i, p) in self.prior_precision.iter().enumerate() {
            precision[[i, i]] += p;
        }
        let sigma_n = inverse_spd(&precision)?;
        let mu_n = sigma_n.dot(&(self.xt_y.mapv(|v| v / variance) + &self.prior_precision * &self.prior_mean));

        let l = cholesky_lower(&sigma_n)?;
        let z: Array1<f64> = (0..mu_n.len()).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        Ok(mu_n + l.dot(&z))
    }

    /// Log conditional density of log(sigma) given the residual sum of squares.
    fn log_sigma_conditional(&self, log_sigma: f64, ssr: f64) -> f64 {
        let sigma = log_sigma.exp();
        let prior = match self.model.scale_prior() {
            Some(p) => p.log_density(sigma),
            None => 0.0,
        };
        let n = self.model.n_obs() as f64;
        prior - n * log_sigma - ssr / (2.0 * sigma * sigma) + log_sigma
    }
}

impl Sampler for GibbsSampler {
    fn name(&self) -> &'static str {
        "gibbs"
    }

    /*
    What it does: Alternates exact coefficient draws with a Metropolis update of log(sigma)

    Inputs: Model, schedule, unconstrained starting point, chain RNG
    Outputs: Retained draws and acceptance rates

    High-level logic:
    - Each iteration draws beta | sigma exactly, then computes the residual sum of
      squares and makes a few random-walk moves of log(sigma)
    - The random-walk step for log(sigma) adapts during warm-up only
    - Retained iterations are pushed as [beta..., sigma]
     */
    fn run_chain(&self, model: &Model, config: &McmcConfig, init: Vec<f64>, rng: &mut StdRng) -> Result<ChainDraws> {
        let conjugate = Conjugate::new(model)?;
        let k = model.n_coefficients();
        let mut log_sigma = init[k];
        let mut step = AdaptiveStep::new(0.1);

        let mut draws = Array2::<f64>::zeros((config.draws, k + 1));
        let mut kept = 0;

        for i in 0..config.iterations() {
            if i == config.warmup {
                step.reset_stats();
            }
            let beta = conjugate.sample_beta((2.0 * log_sigma).exp(), rng)?;
            let residuals = model.y() - &model.x().dot(&beta);
            let ssr = residuals.dot(&residuals);

            for _ in 0..SIGMA_STEPS {
                let proposal = log_sigma + step.scale() * rng.sample::<f64, _>(StandardNormal);
                let log_ratio =
                    conjugate.log_sigma_conditional(proposal, ssr) - conjugate.log_sigma_conditional(log_sigma, ssr);
                let accepted = accept(log_ratio, rng);
                if accepted {
                    log_sigma = proposal;
                }
                step.stats.record(accepted);
                if i < config.warmup {
                    step.adapt(accepted, config.target_accept);
                }
            }

            if config.is_retained(i) {
                let mut row = draws.row_mut(kept);
                for (j, b) in beta.iter().enumerate() {
                    row[j] = *b;
                }
                row[k] = log_sigma.exp();
                kept += 1;
            }
        }

        let mut acceptance = vec![1.0; k];
        acceptance.push(step.stats.acceptance_rate());
        Ok(ChainDraws { draws, acceptance })
    }
}
