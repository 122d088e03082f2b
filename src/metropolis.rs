// Component-wise adaptive random-walk Metropolis, works for any family and link
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::config::McmcConfig;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::sampler::{AdaptiveStep, ChainDraws, Sampler, accept};

const INITIAL_STEP: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetropolisSampler;

/// Chain state with the linear predictor cached so a coefficient update costs one column pass.
struct State<'a> {
    model: &'a Model,
    theta: Vec<f64>,
    eta: Array1<f64>,
    log_prior: Vec<f64>,
    log_likelihood: f64,
}

impl<'a> State<'a> {
    fn new(model: &'a Model, theta: Vec<f64>) -> Result<Self> {
        let params = model.constrain(&theta);
        let (beta, sigma) = model.split(&params);
        let eta = model.linear_predictor(beta);
        let log_likelihood = model.log_likelihood_eta(&eta, sigma);
        let mut state = State {
            model,
            theta,
            eta,
            log_prior: Vec::new(),
            log_likelihood,
        };
        let log_prior = (0..model.n_params())
            .map(|j| state.component_prior(j, state.theta[j]))
            .collect();
        state.log_prior = log_prior;
        if !state.log_density().is_finite() {
            return Err(Error::InvalidConfig(
                "starting point has zero posterior density".to_string(),
            ));
        }
        Ok(state)
    }

    fn sigma(&self) -> f64 {
        if self.model.scale_prior().is_some() {
            self.theta[self.model.n_coefficients()].exp()
        } else {
            1.0
        }
    }

    /// Prior term for one unconstrained component, log-Jacobian included for sigma.
    fn component_prior(&self, j: usize, value: f64) -> f64 {
        let k = self.model.n_coefficients();
        if j < k {
            self.model.coefficient_priors()[j].log_density(value)
        } else {
            match self.model.scale_prior() {
                Some(prior) => prior.log_density(value.exp()) + value,
                None => 0.0,
            }
        }
    }

    fn log_density(&self) -> f64 {
        self.log_prior.iter().sum::<f64>() + self.log_likelihood
    }

    /*
    What it does: Proposes a random-walk move for one component and accepts or rejects it

    Inputs: Component index, step size, RNG
    Outputs: Whether the move was accepted

    High-level logic:
    - Coefficient moves shift the cached linear predictor by delta * column j
    - A sigma move leaves the linear predictor untouched
    - Only the changed prior term and the likelihood enter the acceptance ratio
     */
    fn update(&mut self, j: usize, scale: f64, rng: &mut StdRng) -> bool {
        let k = self.model.n_coefficients();
        let delta = scale * rng.sample::<f64, _>(StandardNormal);
        let proposed = self.theta[j] + delta;
        let prior = self.component_prior(j, proposed);
        if !prior.is_finite() {
            return false;
        }

        let (eta, log_likelihood) = if j < k {
            let eta = &self.eta + &self.model.x().column(j).mapv(|v| v * delta);
            let ll = self.model.log_likelihood_eta(&eta, self.sigma());
            (Some(eta), ll)
        } else {
            (None, self.model.log_likelihood_eta(&self.eta, proposed.exp()))
        };

        let log_ratio = (prior + log_likelihood) - (self.log_prior[j] + self.log_likelihood);
        if !accept(log_ratio, rng) {
            return false;
        }
        self.theta[j] = proposed;
        self.log_prior[j] = prior;
        self.log_likelihood = log_likelihood;
        if let Some(eta) = eta {
            self.eta = eta;
        }
        true
    }
}

impl Sampler for MetropolisSampler {
    fn name(&self) -> &'static str {
        "metropolis"
    }

    fn run_chain(&self, model: &Model, config: &McmcConfig, init: Vec<f64>, rng: &mut StdRng) -> Result<ChainDraws> {
        let d = model.n_params();
        let mut state = State::new(model, init)?;
        let mut steps = vec![AdaptiveStep::new(INITIAL_STEP); d];
        let mut draws = Array2::<f64>::zeros((config.draws, d));
        let mut kept = 0;

        for i in 0..config.iterations() {
            if i == config.warmup {
                steps.iter_mut().for_each(AdaptiveStep::reset_stats);
            }
            for (j, step) in steps.iter_mut().enumerate() {
                let accepted = state.update(j, step.scale(), rng);
                step.stats.record(accepted);
                if i < config.warmup {
                    step.adapt(accepted, config.target_accept);
                }
            }
            if config.is_retained(i) {
                let params = model.constrain(&state.theta);
                draws.row_mut(kept).assign(&Array1::from(params));
                kept += 1;
            }
        }

        Ok(ChainDraws {
            draws,
            acceptance: steps.iter().map(|s| s.stats.acceptance_rate()).collect(),
        })
    }
}
