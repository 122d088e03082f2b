use ndarray::{Array2, Axis};
use serde::Serialize;

use crate::diagnostics::{effective_sample_size, split_rhat};
use crate::error::{Error, Result};
use crate::trace::Trace;

/// Marginal posterior summary of one parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub median: f64,
    pub hdi_low: f64,
    pub hdi_high: f64,
    pub ess: f64,
    pub r_hat: f64,
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

fn check_mass(mass: f64) -> Result<()> {
    if mass > 0.0 && mass < 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("credible mass {} must lie in (0, 1)", mass)))
    }
}

/// Linear interpolation quantile of already sorted values.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/*
What it does: Highest density interval, the narrowest interval that holds `mass` of the draws

Inputs: Draws, probability mass in (0, 1)
Outputs: (lower, upper)

High-level logic:
- Sorts the draws and slides a window of ceil(mass * n) draws along them
- Keeps the window with the smallest width
 */
pub fn hdi(values: &[f64], mass: f64) -> Result<(f64, f64)> {
    check_mass(mass)?;
    if values.is_empty() {
        return Err(Error::Empty("no draws for an interval".to_string()));
    }
    let v = sorted(values);
    let n = v.len();
    let window = ((mass * n as f64).ceil() as usize).clamp(1, n);
    let (start, _) = (0..=n - window)
        .map(|i| (i, v[i + window - 1] - v[i]))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0));
    Ok((v[start], v[start + window - 1]))
}

/// Equal-tailed interval leaving (1 - mass) / 2 in each tail.
pub fn quantile_interval(values: &[f64], mass: f64) -> Result<(f64, f64)> {
    check_mass(mass)?;
    if values.is_empty() {
        return Err(Error::Empty("no draws for an interval".to_string()));
    }
    let v = sorted(values);
    let tail = (1.0 - mass) / 2.0;
    Ok((quantile_sorted(&v, tail), quantile_sorted(&v, 1.0 - tail)))
}

pub fn summarize(trace: &Trace, mass: f64) -> Result<Vec<ParamSummary>> {
    trace
        .names()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values = trace.flat(i);
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let sd = if n > 1.0 {
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
            } else {
                0.0
            };
            let (hdi_low, hdi_high) = hdi(&values, mass)?;
            Ok(ParamSummary {
                name: name.clone(),
                mean,
                sd,
                median: quantile_sorted(&sorted(&values), 0.5),
                hdi_low,
                hdi_high,
                ess: effective_sample_size(trace.param(i)),
                r_hat: split_rhat(trace.param(i)),
            })
        })
        .collect()
}

/*
What it does: Empirical covariance matrix of the posterior draws (chains pooled)

Outputs: d x d matrix over every parameter in the trace, sigma included

High-level logic:
- Centers every pooled draw on the posterior mean
- Accumulates the outer products and divides by n - 1
 */
pub fn posterior_covariance(trace: &Trace) -> Array2<f64> {
    let pooled = trace.pooled();
    let n = pooled.nrows();
    let mean = trace.means();
    let centered = &pooled - &mean.insert_axis(Axis(0));
    centered.t().dot(&centered) / (n as f64 - 1.0).max(1.0)
}
