//! Prior and posterior predictive simulation, graphical-check statistics and
//! predictions for new rows.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::family::Family;
use crate::model::Model;
use crate::summary::{quantile_interval, quantile_sorted};
use crate::trace::Trace;

/// Summary statistic compared between observed and replicated data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestStatistic {
    Mean,
    Sd,
    Min,
    Max,
    /// Share of observations equal to the value, e.g. the proportion of ones.
    Proportion(f64),
}

impl TestStatistic {
    pub fn compute(&self, y: ArrayView1<f64>) -> f64 {
        let n = y.len() as f64;
        match *self {
            TestStatistic::Mean => y.sum() / n,
            TestStatistic::Sd => {
                let mean = y.sum() / n;
                (y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
            }
            TestStatistic::Min => y.iter().copied().fold(f64::INFINITY, f64::min),
            TestStatistic::Max => y.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            TestStatistic::Proportion(value) => y.iter().filter(|&&v| v == value).count() as f64 / n,
        }
    }

    /// Statistics that make sense for the family when none are requested.
    pub fn defaults_for(family: Family) -> Vec<TestStatistic> {
        match family {
            Family::Gaussian => vec![TestStatistic::Mean, TestStatistic::Sd],
            Family::Bernoulli => vec![TestStatistic::Proportion(1.0)],
            Family::Poisson => vec![TestStatistic::Mean, TestStatistic::Proportion(0.0)],
        }
    }
}

impl fmt::Display for TestStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatistic::Mean => f.write_str("mean"),
            TestStatistic::Sd => f.write_str("sd"),
            TestStatistic::Min => f.write_str("min"),
            TestStatistic::Max => f.write_str("max"),
            TestStatistic::Proportion(v) => write!(f, "prop:{}", v),
        }
    }
}

impl FromStr for TestStatistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "mean" => Ok(TestStatistic::Mean),
            "sd" | "std" => Ok(TestStatistic::Sd),
            "min" => Ok(TestStatistic::Min),
            "max" => Ok(TestStatistic::Max),
            other => other
                .strip_prefix("prop:")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(TestStatistic::Proportion)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown test statistic `{}`", other))),
        }
    }
}

impl Serialize for TestStatistic {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Observed statistic against its predictive distribution.
#[derive(Debug, Clone, Serialize)]
pub struct PredictiveCheck {
    pub statistic: TestStatistic,
    pub observed: f64,
    pub replicated_mean: f64,
    pub replicated_low: f64,
    pub replicated_high: f64,
    /// P(T(y_rep) >= T(y)); values near 0 or 1 signal misfit.
    pub p_value: f64,
    #[serde(skip)]
    pub replicated: Vec<f64>,
}

/// Evenly spaced indices into `total` pooled draws.
fn spread(total: usize, n: usize) -> Vec<usize> {
    if n >= total {
        return (0..total).collect();
    }
    (0..n).map(|i| i * total / n).collect()
}

/*
What it does: Simulates replicate data sets from the posterior

Inputs: Model, trace, number of replicates, RNG
Outputs: (replicate, observation) matrix

High-level logic:
- Picks draws spread evenly over the pooled chains (all of them if fewer exist)
- For each draw computes the mean response through the link and samples the
  observation distribution at every row
 */
pub fn posterior_predictive<R: Rng + ?Sized>(model: &Model, trace: &Trace, n: usize, rng: &mut R) -> Result<Array2<f64>> {
    if trace.n_params() != model.n_params() {
        return Err(Error::Dimension(format!(
            "trace has {} parameters, model has {}",
            trace.n_params(),
            model.n_params()
        )));
    }
    let pooled = trace.pooled();
    let picks = spread(pooled.nrows(), n);
    let mut replicates = Array2::<f64>::zeros((picks.len(), model.n_obs()));
    for (r, &row) in picks.iter().enumerate() {
        let params = pooled.row(row).to_vec();
        replicates.row_mut(r).assign(&model.simulate(&params, rng)?);
    }
    debug!("simulated {} posterior predictive replicates", picks.len());
    Ok(replicates)
}

/*
What it does: Simulates replicate data sets with parameters drawn from the priors

Inputs: Model, number of replicates, RNG
Outputs: (replicate, observation) matrix with at most n rows

High-level logic:
- Draws a parameter vector from the priors and simulates the response from it
- Heavy-tailed priors can push the mean response out of range (e.g. exp of a
  huge linear predictor); such replicates are skipped and counted in a warning
- Fails only when no replicate could be simulated
 */
pub fn prior_predictive<R: Rng + ?Sized>(model: &Model, n: usize, rng: &mut R) -> Result<Array2<f64>> {
    if !model.priors_are_proper() {
        return Err(Error::InvalidPrior(
            "prior predictive simulation needs proper priors; replace flat priors".to_string(),
        ));
    }
    let mut rows = Vec::with_capacity(n);
    let mut skipped = 0;
    for _ in 0..n {
        let params = model.sample_prior(rng)?;
        match model.simulate(&params, rng) {
            Ok(y) => rows.push(y),
            Err(Error::InvalidResponse(reason)) => {
                debug!("prior predictive replicate skipped: {}", reason);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    if skipped > 0 {
        warn!(
            "{} of {} prior predictive replicates had an out-of-range mean response and were skipped",
            skipped, n
        );
    }
    if rows.is_empty() && n > 0 {
        return Err(Error::InvalidPrior(
            "every prior draw gave an out-of-range mean response; tighten the priors".to_string(),
        ));
    }
    let mut replicates = Array2::<f64>::zeros((rows.len(), model.n_obs()));
    for (r, y) in rows.iter().enumerate() {
        replicates.row_mut(r).assign(y);
    }
    debug!("simulated {} prior predictive replicates", rows.len());
    Ok(replicates)
}

/// Compares a statistic of the observed response with its replicated distribution.
pub fn check(statistic: TestStatistic, y: &Array1<f64>, replicates: &Array2<f64>, mass: f64) -> Result<PredictiveCheck> {
    if replicates.nrows() == 0 {
        return Err(Error::Empty("no predictive replicates".to_string()));
    }
    let observed = statistic.compute(y.view());
    let replicated: Vec<f64> = replicates.rows().into_iter().map(|r| statistic.compute(r)).collect();
    let n = replicated.len() as f64;
    let (low, high) = quantile_interval(&replicated, mass)?;
    let p_value = replicated.iter().filter(|&&t| t >= observed).count() as f64 / n;
    Ok(PredictiveCheck {
        statistic,
        observed,
        replicated_mean: replicated.iter().sum::<f64>() / n,
        replicated_low: low,
        replicated_high: high,
        p_value,
        replicated,
    })
}

/// Posterior of the mean response at one new row.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Prediction {
    pub mean: f64,
    pub low: f64,
    pub high: f64,
}

/*
What it does: Predicts the mean response for new rows with a credible interval

Inputs: Model, trace, new predictor rows (already transformed like the training data), mass
Outputs: One Prediction per row

High-level logic:
- Adds the intercept column
- For every pooled draw computes link^-1(x * beta) so the interval reflects
  coefficient uncertainty on the response scale
- Reports the mean and the equal-tailed interval of those values
 */
pub fn predict(model: &Model, trace: &Trace, x_new: &Array2<f64>, mass: f64) -> Result<Vec<Prediction>> {
    let tail = (1.0 - mass) / 2.0;
    if !(tail > 0.0 && tail < 0.5) {
        return Err(Error::InvalidConfig(format!("credible mass {} must lie in (0, 1)", mass)));
    }
    let x = model.with_intercept(x_new)?;
    let k = model.n_coefficients();
    let pooled = trace.pooled();
    let link = model.link();

    // (row, draw) matrix of linear predictors
    let beta = pooled.slice(ndarray::s![.., ..k]);
    let eta = x.dot(&beta.t());

    let predictions = eta
        .rows()
        .into_iter()
        .map(|row| {
            let mut mu: Vec<f64> = row.iter().map(|&e| link.inverse(e)).collect();
            mu.sort_by(|a, b| a.total_cmp(b));
            Prediction {
                mean: mu.iter().sum::<f64>() / mu.len() as f64,
                low: quantile_sorted(&mu, tail),
                high: quantile_sorted(&mu, 1.0 - tail),
            }
        })
        .collect::<Vec<_>>();
    Ok(predictions)
}

/// R^2 of the fitted values at the posterior mean coefficients.
pub fn r_squared(model: &Model, trace: &Trace) -> Result<f64> {
    if model.family() != Family::Gaussian {
        return Err(Error::InvalidConfig("R^2 is only reported for gaussian models".to_string()));
    }
    let means = trace.means();
    let beta = means.slice(ndarray::s![..model.n_coefficients()]);
    let y = model.y();
    let residuals = y - &model.mean_response(beta);
    let ssr = residuals.dot(&residuals);
    let y_mean = y.mean().unwrap_or(0.0);
    let total_sum_of_squares = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>();
    Ok(1.0 - ssr / total_sum_of_squares)
}
