//! Convergence diagnostics computed across chains.
//!
//! Both statistics use the split-chain formulation: every chain is cut in two
//! halves so that drift within a chain shows up as disagreement between halves.

use log::warn;
use ndarray::{Array2, ArrayView2, s};
use serde::Serialize;

use crate::trace::Trace;

/// R-hat above this value flags a parameter as not converged.
pub const RHAT_THRESHOLD: f64 = 1.01;
const MAX_LAG: usize = 1000;

/// Splits each chain in half; an odd middle draw is dropped.
fn split_chains(draws: ArrayView2<f64>) -> Array2<f64> {
    let (chains, n) = draws.dim();
    let half = n / 2;
    let mut split = Array2::<f64>::zeros((chains * 2, half));
    for c in 0..chains {
        split.row_mut(2 * c).assign(&draws.slice(s![c, ..half]));
        split.row_mut(2 * c + 1).assign(&draws.slice(s![c, n - half..]));
    }
    split
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Within-chain variance W and between-chain variance B / n.
fn variance_components(split: &Array2<f64>) -> (f64, f64, Vec<f64>) {
    let (m, n) = split.dim();
    let chain_means: Vec<f64> = split.rows().into_iter().map(|r| r.sum() / n as f64).collect();
    let grand = mean(&chain_means);
    let within = split
        .rows()
        .into_iter()
        .zip(&chain_means)
        .map(|(row, &mu)| row.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / (n as f64 - 1.0))
        .sum::<f64>()
        / m as f64;
    let between_over_n = chain_means.iter().map(|mu| (mu - grand).powi(2)).sum::<f64>() / (m as f64 - 1.0);
    (within, between_over_n, chain_means)
}

/*
What it does: Potential scale reduction factor comparing within-chain to between-chain variance

Inputs: Draws of one parameter, shape (chain, draw)
Outputs: R-hat, 1.0 at convergence; NaN when there are fewer than 4 draws per chain

High-level logic:
- Splits chains, computes W (mean within-chain variance) and B/n (variance of chain means)
- var_plus = (n - 1) / n * W + B / n
- R-hat = sqrt(var_plus / W); a parameter that never moved gives 1.0
 */
pub fn split_rhat(draws: ArrayView2<f64>) -> f64 {
    if draws.ncols() < 4 {
        return f64::NAN;
    }
    let split = split_chains(draws);
    let n = split.ncols() as f64;
    let (within, between_over_n, _) = variance_components(&split);
    if within <= 0.0 {
        return if between_over_n <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    let var_plus = (n - 1.0) / n * within + between_over_n;
    (var_plus / within).sqrt()
}

/// Split-chain effective sample size with Geyer's initial positive sequence truncation.
pub fn effective_sample_size(draws: ArrayView2<f64>) -> f64 {
    let total = draws.len() as f64;
    if draws.ncols() < 4 {
        return f64::NAN;
    }
    let split = split_chains(draws);
    let (m, n) = split.dim();
    let (within, between_over_n, chain_means) = variance_components(&split);
    let var_plus = (n as f64 - 1.0) / n as f64 * within + between_over_n;
    if var_plus <= 0.0 {
        return total;
    }

    // autocovariance at `lag`, averaged over split chains
    let autocov = |lag: usize| -> f64 {
        split
            .rows()
            .into_iter()
            .zip(&chain_means)
            .map(|(row, &mu)| {
                (0..n - lag).map(|t| (row[t] - mu) * (row[t + lag] - mu)).sum::<f64>() / n as f64
            })
            .sum::<f64>()
            / m as f64
    };

    let rho = |lag: usize| 1.0 - (within - autocov(lag)) / var_plus;
    let max_lag = (n - 1).min(MAX_LAG);
    let mut tau = -1.0;
    let mut lag = 0;
    while lag < max_lag {
        let pair = rho(lag) + rho(lag + 1);
        if !(pair > 0.0) {
            break;
        }
        tau += 2.0 * pair;
        lag += 2;
    }
    let total_split = (m * n) as f64;
    if !(tau.is_finite() && tau > 0.0) {
        return total_split;
    }
    (total_split / tau).min(total_split * (total_split.log10()).max(1.0))
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamConvergence {
    pub name: String,
    pub r_hat: f64,
    pub ess: f64,
    pub acceptance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Convergence {
    pub params: Vec<ParamConvergence>,
    pub max_r_hat: f64,
    pub min_ess: f64,
}

impl Convergence {
    /// Parameters whose R-hat is above the threshold or undefined.
    pub fn unconverged(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| !(p.r_hat <= RHAT_THRESHOLD))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn converged(&self) -> bool {
        self.unconverged().is_empty()
    }
}

/// R-hat and ESS for every parameter; logs a warning for each unconverged one.
pub fn assess(trace: &Trace) -> Convergence {
    let acceptance = trace.mean_acceptance();
    let params: Vec<ParamConvergence> = trace
        .names()
        .iter()
        .enumerate()
        .map(|(i, name)| ParamConvergence {
            name: name.clone(),
            r_hat: split_rhat(trace.param(i)),
            ess: effective_sample_size(trace.param(i)),
            acceptance: acceptance.get(i).copied().unwrap_or(f64::NAN),
        })
        .collect();

    let max_r_hat = params.iter().map(|p| p.r_hat).fold(f64::NEG_INFINITY, f64::max);
    let min_ess = params.iter().map(|p| p.ess).fold(f64::INFINITY, f64::min);
    let convergence = Convergence {
        params,
        max_r_hat,
        min_ess,
    };
    for name in convergence.unconverged() {
        warn!("`{}` has R-hat above {}; the chains disagree", name, RHAT_THRESHOLD);
    }
    convergence
}
