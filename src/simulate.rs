// Synthetic data sets for the continuous-response and binary-response examples
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution, Normal, StandardNormal};

use crate::data::{Column, Table};
use crate::error::{Error, Result};
use crate::link::Link;

/// Predictors `x1..xk` from N(0, 1) scaled per column, so standardization has work to do.
fn predictors(n: usize, k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    (0..k)
        .map(|j| {
            let scale = 1.0 + j as f64;
            let shift = 10.0 * j as f64;
            (0..n).map(|_| shift + scale * rng.sample::<f64, _>(StandardNormal)).collect()
        })
        .collect()
}

fn linear_predictor(xs: &[Vec<f64>], coefficients: &[f64], row: usize) -> f64 {
    coefficients[0]
        + xs.iter()
            .zip(&coefficients[1..])
            .map(|(x, b)| b * x[row])
            .sum::<f64>()
}

fn assemble(xs: Vec<Vec<f64>>, y: Vec<String>) -> Result<Table> {
    let mut columns: Vec<Column> = xs
        .iter()
        .enumerate()
        .map(|(j, x)| Column::from_f64(&format!("x{}", j + 1), x))
        .collect();
    columns.push(Column::new("y", y.into_iter().map(Some).collect()));
    Table::new(columns)
}

fn check(n: usize, coefficients: &[f64]) -> Result<()> {
    if n == 0 {
        return Err(Error::InvalidConfig("at least one row is required".to_string()));
    }
    if coefficients.is_empty() {
        return Err(Error::InvalidConfig("the intercept coefficient is required".to_string()));
    }
    Ok(())
}

/// y = b0 + sum(b_j * x_j) + N(0, sigma); coefficients act on the raw predictors.
pub fn simulate_linear(n: usize, coefficients: &[f64], sigma: f64, seed: u64) -> Result<Table> {
    check(n, coefficients)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, sigma).map_err(|e| Error::InvalidConfig(format!("sigma {}: {}", sigma, e)))?;
    let xs = predictors(n, coefficients.len() - 1, &mut rng);
    let y = (0..n)
        .map(|i| (linear_predictor(&xs, coefficients, i) + noise.sample(&mut rng)).to_string())
        .collect();
    assemble(xs, y)
}

/// y ~ Bernoulli(logistic(b0 + sum(b_j * x_j))), labelled `yes` / `no`.
pub fn simulate_logistic(n: usize, coefficients: &[f64], seed: u64) -> Result<Table> {
    check(n, coefficients)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let xs = predictors(n, coefficients.len() - 1, &mut rng);
    let y = (0..n)
        .map(|i| {
            let p = Link::Logit.inverse(linear_predictor(&xs, coefficients, i));
            let success = Bernoulli::new(p)
                .map(|d| d.sample(&mut rng))
                .map_err(|e| Error::InvalidConfig(format!("probability {}: {}", p, e)))?;
            Ok(if success { "yes" } else { "no" }.to_string())
        })
        .collect::<Result<Vec<String>>>()?;
    assemble(xs, y)
}

/*
What it does: Blanks a random share of the cells so the cleaning step has work to do

Inputs: Table, share of cells to blank in [0, 1), seed
Outputs: Copy of the table with the chosen cells missing

High-level logic: Every cell, response included, is dropped independently with
probability `share`
 */
pub fn with_missing_cells(table: &Table, share: f64, seed: u64) -> Result<Table> {
    if !(0.0..1.0).contains(&share) {
        return Err(Error::InvalidConfig(format!("missing share {} must lie in [0, 1)", share)));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let blank = Bernoulli::new(share).map_err(|e| Error::InvalidConfig(format!("missing share {}: {}", share, e)))?;
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            let values = c
                .values
                .iter()
                .map(|cell| if blank.sample(&mut rng) { None } else { cell.clone() })
                .collect();
            Column::new(&c.name, values)
        })
        .collect();
    Table::new(columns)
}
