//! Multi-chain MCMC driver and the pieces shared by the concrete samplers.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::McmcConfig;
use crate::error::{Error, Result};
use crate::gibbs::GibbsSampler;
use crate::metropolis::MetropolisSampler;
use crate::model::Model;
use crate::trace::Trace;

// Half-width of the uniform jitter for initial values in unconstrained space
const INIT_RADIUS: f64 = 2.0;
const MAX_INIT_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    /// Gibbs when the model is conditionally conjugate, Metropolis otherwise.
    #[default]
    Auto,
    Gibbs,
    Metropolis,
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SamplerKind::Auto => "auto",
            SamplerKind::Gibbs => "gibbs",
            SamplerKind::Metropolis => "metropolis",
        };
        f.write_str(name)
    }
}

impl FromStr for SamplerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SamplerKind::Auto),
            "gibbs" => Ok(SamplerKind::Gibbs),
            "metropolis" | "mh" => Ok(SamplerKind::Metropolis),
            other => Err(Error::InvalidConfig(format!("unknown sampler `{}`", other))),
        }
    }
}

/// Retained draws of one chain, constrained space, shape (draw, parameter).
#[derive(Debug, Clone)]
pub struct ChainDraws {
    pub draws: Array2<f64>,
    /// Post warm-up acceptance rate per parameter (1.0 for exact conditional draws).
    pub acceptance: Vec<f64>,
}

pub trait Sampler: Sync {
    fn name(&self) -> &'static str;

    /// Runs warm-up and sampling for one chain starting at `init` (unconstrained).
    fn run_chain(&self, model: &Model, config: &McmcConfig, init: Vec<f64>, rng: &mut StdRng) -> Result<ChainDraws>;
}

/// Proposal counters for one random-walk block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    pub fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/*
What it does: Random-walk step size tuned by stochastic approximation during warm-up

High-level logic:
- The log of the step moves up after an acceptance and down after a rejection,
  weighted so that it settles where the acceptance rate equals the target
- The gain decays as t^-0.6 so the step converges
- Once warm-up ends the step is frozen and the counters restart
 */
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveStep {
    log_scale: f64,
    updates: usize,
    pub stats: ProposalStats,
}

impl AdaptiveStep {
    pub fn new(scale: f64) -> Self {
        AdaptiveStep {
            log_scale: scale.ln(),
            updates: 0,
            stats: ProposalStats::default(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.log_scale.exp()
    }

    pub fn adapt(&mut self, accepted: bool, target: f64) {
        self.updates += 1;
        let gain = (self.updates as f64).powf(-0.6);
        let signal = if accepted { 1.0 - target } else { -target };
        self.log_scale = (self.log_scale + gain * signal).clamp(-12.0, 6.0);
    }

    pub fn reset_stats(&mut self) {
        self.stats = ProposalStats::default();
    }
}

/// Metropolis acceptance test on log densities.
pub fn accept<R: Rng + ?Sized>(log_ratio: f64, rng: &mut R) -> bool {
    if log_ratio.is_nan() {
        return false;
    }
    log_ratio >= 0.0 || rng.sample::<f64, _>(rand_distr::Open01).ln() < log_ratio
}

/// Overdispersed starting point in unconstrained space with finite log posterior.
pub fn initial_point<R: Rng + ?Sized>(model: &Model, rng: &mut R) -> Result<Vec<f64>> {
    let jitter = Uniform::new(-INIT_RADIUS, INIT_RADIUS);
    for _ in 0..MAX_INIT_ATTEMPTS {
        let theta: Vec<f64> = (0..model.n_params()).map(|_| rng.sample(jitter)).collect();
        if model.log_posterior_unconstrained(&theta).is_finite() {
            return Ok(theta);
        }
    }
    Err(Error::InvalidConfig(format!(
        "no initial point with finite log posterior after {} attempts",
        MAX_INIT_ATTEMPTS
    )))
}

fn resolve(model: &Model, kind: SamplerKind) -> Result<Box<dyn Sampler>> {
    match kind {
        SamplerKind::Auto if model.is_conjugate_gaussian() => Ok(Box::new(GibbsSampler)),
        SamplerKind::Auto | SamplerKind::Metropolis => Ok(Box::new(MetropolisSampler)),
        SamplerKind::Gibbs if model.is_conjugate_gaussian() => Ok(Box::new(GibbsSampler)),
        SamplerKind::Gibbs => Err(Error::UnsupportedSampler {
            sampler: "gibbs",
            reason: "requires a gaussian likelihood, identity link and normal or flat coefficient priors"
                .to_string(),
        }),
    }
}

/*
What it does: Draws posterior samples with several independent chains

Inputs: Model, sampling schedule, which sampler to use
Outputs: Trace holding every retained draw

High-level logic:
- Picks the sampler (Gibbs for conjugate Gaussian models when asked for auto)
- Each chain gets its own RNG seeded with seed + chain index so runs are reproducible
  regardless of thread scheduling
- Chains run in parallel on the rayon pool, each from an overdispersed start
 */
pub fn sample(model: &Model, config: &McmcConfig, kind: SamplerKind) -> Result<Trace> {
    config.validate()?;
    let sampler = resolve(model, kind)?;
    info!(
        "sampling {} chains x {} draws ({} warm-up, thin {}) with {}",
        config.chains,
        config.draws,
        config.warmup,
        config.thin,
        sampler.name()
    );
    let started = Instant::now();

    let chains = (0..config.chains)
        .into_par_iter()
        .map(|chain| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(chain as u64));
            let init = initial_point(model, &mut rng)?;
            let draws = sampler.run_chain(model, config, init, &mut rng)?;
            debug!("chain {} done, acceptance {:?}", chain, draws.acceptance);
            Ok(draws)
        })
        .collect::<Result<Vec<ChainDraws>>>()?;

    let trace = Trace::new(model.param_names(), chains, sampler.name())?;
    for (name, rate) in trace.names().iter().zip(trace.mean_acceptance()) {
        if rate < 0.1 {
            warn!("low acceptance rate {:.3} for `{}`", rate, name);
        }
    }
    info!("sampling finished in {:.2?}", started.elapsed());
    Ok(trace)
}
