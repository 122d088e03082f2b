use std::fmt::{self, Write as _};

use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::data::DesignColumn;
use crate::diagnostics::Convergence;
use crate::predictive::{PredictiveCheck, Prediction};
use crate::summary::ParamSummary;

const DENSITY_BINS: usize = 20;
const BAR_WIDTH: usize = 40;
const TRACE_WIDTH: usize = 60;
// Eight levels from low to high for trace strips
const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Everything one run produced, printable as text or JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub family: String,
    pub link: String,
    pub sampler: String,
    pub n_obs: usize,
    pub chains: usize,
    pub draws: usize,
    pub hdi_prob: f64,
    pub columns: Vec<DesignColumn>,
    pub summary: Vec<ParamSummary>,
    pub raw_slopes: Vec<RawSlope>,
    /// Posterior correlation matrix, parameters in summary order.
    pub correlation: Vec<Vec<f64>>,
    pub convergence: Option<Convergence>,
    pub r_squared: Option<f64>,
    pub prior_checks: Vec<PredictiveCheck>,
    pub posterior_checks: Vec<PredictiveCheck>,
    pub predictions: Vec<Prediction>,
    #[serde(skip)]
    pub plots: Vec<String>,
}

/// Slope of a standardized predictor per raw unit of that predictor.
#[derive(Debug, Clone, Serialize)]
pub struct RawSlope {
    pub name: String,
    pub mean: f64,
    pub hdi_low: f64,
    pub hdi_high: f64,
}

/// Undoes the standardization of every scaled predictor's slope summary.
pub fn raw_slopes(columns: &[DesignColumn], summary: &[ParamSummary]) -> Vec<RawSlope> {
    columns
        .iter()
        .filter_map(|c| {
            let scaler = c.standardizer?;
            let s = summary.iter().find(|s| s.name == c.name)?;
            Some(RawSlope {
                name: c.name.clone(),
                mean: scaler.rescale_coefficient(s.mean),
                hdi_low: scaler.rescale_coefficient(s.hdi_low),
                hdi_high: scaler.rescale_coefficient(s.hdi_high),
            })
        })
        .collect()
}

/// Correlation matrix from a covariance matrix; zero-variance rows give NaN.
pub fn correlation(covariance: &Array2<f64>) -> Vec<Vec<f64>> {
    let sd: Vec<f64> = covariance.diag().iter().map(|v| v.sqrt()).collect();
    covariance
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| row.iter().enumerate().map(|(j, c)| c / (sd[i] * sd[j])).collect())
        .collect()
}

pub fn render_correlation(names: &[String], correlation: &[Vec<f64>]) -> String {
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0).max(6);
    let mut out = String::new();
    let _ = write!(out, "{:<width$}", "", width = width);
    for name in names {
        let _ = write!(out, " {:>width$}", name, width = width);
    }
    let _ = writeln!(out);
    for (name, row) in names.iter().zip(correlation) {
        let _ = write!(out, "{:<width$}", name, width = width);
        for c in row {
            let _ = write!(out, " {:>width$.2}", c, width = width);
        }
        let _ = writeln!(out);
    }
    out
}

pub fn render_summary(summary: &[ParamSummary], hdi_prob: f64) -> String {
    let width = summary.iter().map(|s| s.name.len()).max().unwrap_or(4).max(9);
    let pct = (hdi_prob * 100.0).round();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$} {:>10} {:>9} {:>10} {:>10} {:>10} {:>8} {:>6}",
        "parameter",
        "mean",
        "sd",
        format!("hdi_{}%", (100.0 - pct) / 2.0),
        format!("hdi_{}%", 100.0 - (100.0 - pct) / 2.0),
        "median",
        "ess",
        "r_hat",
        width = width
    );
    for s in summary {
        let _ = writeln!(
            out,
            "{:<width$} {:>10.3} {:>9.3} {:>10.3} {:>10.3} {:>10.3} {:>8.0} {:>6.3}",
            s.name,
            s.mean,
            s.sd,
            s.hdi_low,
            s.hdi_high,
            s.median,
            s.ess,
            s.r_hat,
            width = width
        );
    }
    out
}

pub fn render_checks(title: &str, checks: &[PredictiveCheck]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(
        out,
        "  {:<10} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "statistic", "observed", "rep_mean", "rep_low", "rep_high", "p"
    );
    for c in checks {
        let _ = writeln!(
            out,
            "  {:<10} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>8.3}",
            c.statistic.to_string(),
            c.observed,
            c.replicated_mean,
            c.replicated_low,
            c.replicated_high,
            c.p_value
        );
    }
    out
}

/*
What it does: Text histogram of posterior draws, the terminal stand-in for a density plot

Inputs: Title, draws
Outputs: One line per bin with the bin centre and a bar proportional to its count

High-level logic:
- Bins span [min, max] of the draws in DENSITY_BINS equal widths
- The tallest bin gets BAR_WIDTH characters
 */
pub fn render_density(title: &str, values: &[f64]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        let _ = writeln!(out, "  (no draws)");
        return out;
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(f64::EPSILON);

    let mut counts = [0usize; DENSITY_BINS];
    for v in &finite {
        let bin = (((v - min) / span) * DENSITY_BINS as f64) as usize;
        counts[bin.min(DENSITY_BINS - 1)] += 1;
    }
    let tallest = counts.iter().copied().max().unwrap_or(1).max(1);
    for (i, &count) in counts.iter().enumerate() {
        let centre = min + span * (i as f64 + 0.5) / DENSITY_BINS as f64;
        let bar = "#".repeat(count * BAR_WIDTH / tallest);
        let _ = writeln!(out, "  {:>10.3} | {}", centre, bar);
    }
    out
}

/// One strip per chain, each character the average of a block of draws; well mixed chains look alike.
pub fn render_trace(title: &str, draws: ArrayView2<f64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let min = draws.iter().copied().fold(f64::INFINITY, f64::min);
    let max = draws.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(f64::EPSILON);
    let n = draws.ncols();
    let width = TRACE_WIDTH.min(n).max(1);

    for (c, chain) in draws.rows().into_iter().enumerate() {
        let strip: String = (0..width)
            .map(|b| {
                let start = b * n / width;
                let end = ((b + 1) * n / width).max(start + 1).min(n);
                let block = chain.slice(ndarray::s![start..end]);
                let avg = block.sum() / block.len() as f64;
                let level = (((avg - min) / span) * (LEVELS.len() - 1) as f64).round() as usize;
                LEVELS[level.min(LEVELS.len() - 1)]
            })
            .collect();
        let _ = writeln!(out, "  chain {} {}", c, strip);
    }
    out
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} regression, {} link, {} observations, sampler {} ({} chains x {} draws)",
            self.family, self.link, self.n_obs, self.sampler, self.chains, self.draws
        )?;
        let scaled: Vec<&DesignColumn> = self.columns.iter().filter(|c| c.standardizer.is_some()).collect();
        if !scaled.is_empty() {
            writeln!(f, "standardized predictors:")?;
            for c in scaled {
                if let Some(s) = c.standardizer {
                    writeln!(f, "  {} (mean {:.3}, sd {:.3})", c.name, s.mean, s.sd)?;
                }
            }
        }
        writeln!(f)?;
        if !self.summary.is_empty() {
            write!(f, "{}", render_summary(&self.summary, self.hdi_prob))?;
        }
        if !self.raw_slopes.is_empty() {
            writeln!(f, "slopes per raw unit:")?;
            for r in &self.raw_slopes {
                writeln!(f, "  {} {:.4} [{:.4}, {:.4}]", r.name, r.mean, r.hdi_low, r.hdi_high)?;
            }
        }
        if !self.correlation.is_empty() {
            let names: Vec<String> = self.summary.iter().map(|s| s.name.clone()).collect();
            writeln!(f, "posterior correlations:")?;
            write!(f, "{}", render_correlation(&names, &self.correlation))?;
        }
        if let Some(convergence) = &self.convergence {
            let unconverged = convergence.unconverged();
            if unconverged.is_empty() {
                writeln!(
                    f,
                    "converged: max r_hat {:.3}, min ess {:.0}",
                    convergence.max_r_hat, convergence.min_ess
                )?;
            } else {
                writeln!(f, "NOT converged: {}", unconverged.join(", "))?;
            }
        }
        if let Some(r2) = self.r_squared {
            writeln!(f, "R^2 at posterior mean: {:.3}", r2)?;
        }
        if !self.prior_checks.is_empty() {
            writeln!(f)?;
            write!(f, "{}", render_checks("prior predictive checks", &self.prior_checks))?;
        }
        if !self.posterior_checks.is_empty() {
            writeln!(f)?;
            write!(f, "{}", render_checks("posterior predictive checks", &self.posterior_checks))?;
        }
        if !self.predictions.is_empty() {
            writeln!(f)?;
            writeln!(f, "predicted mean response ({:.0}% interval)", self.hdi_prob * 100.0)?;
            for (i, p) in self.predictions.iter().enumerate() {
                writeln!(f, "  row {:>4} {:>10.3} [{:.3}, {:.3}]", i, p.mean, p.low, p.high)?;
            }
        }
        for plot in &self.plots {
            writeln!(f)?;
            write!(f, "{}", plot)?;
        }
        Ok(())
    }
}
