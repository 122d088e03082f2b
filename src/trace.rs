use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, s};

use crate::error::{Error, Result};
use crate::sampler::ChainDraws;

/// Retained posterior draws of every chain, shape (chain, draw, parameter).
#[derive(Debug, Clone)]
pub struct Trace {
    names: Vec<String>,
    draws: Array3<f64>,
    acceptance: Array2<f64>,
    sampler: &'static str,
}

impl Trace {
    pub fn new(names: Vec<String>, chains: Vec<ChainDraws>, sampler: &'static str) -> Result<Self> {
        let first = chains
            .first()
            .ok_or_else(|| Error::Empty("no chains to collect".to_string()))?;
        let (n_draws, n_params) = first.draws.dim();
        if n_params != names.len() {
            return Err(Error::Dimension(format!(
                "{} parameter names for {} columns of draws",
                names.len(),
                n_params
            )));
        }
        if let Some(bad) = chains.iter().find(|c| c.draws.dim() != (n_draws, n_params)) {
            return Err(Error::Dimension(format!(
                "chain of shape {:?}, expected {:?}",
                bad.draws.dim(),
                (n_draws, n_params)
            )));
        }

        let mut draws = Array3::<f64>::zeros((chains.len(), n_draws, n_params));
        let mut acceptance = Array2::<f64>::zeros((chains.len(), n_params));
        for (c, chain) in chains.iter().enumerate() {
            draws.slice_mut(s![c, .., ..]).assign(&chain.draws);
            acceptance.row_mut(c).assign(&Array1::from(chain.acceptance.clone()));
        }
        Ok(Trace {
            names,
            draws,
            acceptance,
            sampler,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sampler(&self) -> &'static str {
        self.sampler
    }

    pub fn n_chains(&self) -> usize {
        self.draws.dim().0
    }

    pub fn n_draws(&self) -> usize {
        self.draws.dim().1
    }

    pub fn n_params(&self) -> usize {
        self.draws.dim().2
    }

    pub fn draws(&self) -> &Array3<f64> {
        &self.draws
    }

    pub fn index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::InvalidConfig(format!("no parameter named `{}`", name)))
    }

    /// Draws of one parameter, shape (chain, draw).
    pub fn param(&self, index: usize) -> ArrayView2<'_, f64> {
        self.draws.index_axis(Axis(2), index)
    }

    pub fn param_by_name(&self, name: &str) -> Result<ArrayView2<'_, f64>> {
        Ok(self.param(self.index(name)?))
    }

    /// Draws of one parameter with the chains concatenated.
    pub fn flat(&self, index: usize) -> Vec<f64> {
        self.param(index).iter().copied().collect()
    }

    /// Every draw as one row, chains concatenated, shape (chain * draw, parameter).
    pub fn pooled(&self) -> Array2<f64> {
        let (c, d, p) = self.draws.dim();
        Array2::from_shape_fn((c * d, p), |(row, j)| self.draws[[row / d, row % d, j]])
    }

    /// Posterior mean of every parameter.
    pub fn means(&self) -> Array1<f64> {
        let pooled = self.pooled();
        pooled.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(self.n_params()))
    }

    pub fn acceptance(&self) -> &Array2<f64> {
        &self.acceptance
    }

    /// Acceptance rate per parameter averaged over chains.
    pub fn mean_acceptance(&self) -> Vec<f64> {
        self.acceptance
            .mean_axis(Axis(0))
            .map(|a| a.to_vec())
            .unwrap_or_default()
    }

    /*
    What it does: Exports the draws as a CSV file for plotting or post-processing elsewhere

    Inputs: Reference to self, file path
    Outputs: None but it creates the CSV file

    High-level logic:
    - Header row is chain, draw, then one column per parameter
    - One row per retained draw, chains one after the other
     */
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));

        let mut header = vec!["chain".to_string(), "draw".to_string()];
        header.extend(self.names.iter().cloned());
        writer.write_record(&header)?;

        for c in 0..self.n_chains() {
            for d in 0..self.n_draws() {
                let mut record = vec![c.to_string(), d.to_string()];
                record.extend(self.draws.slice(s![c, d, ..]).iter().map(|v| v.to_string()));
                writer.write_record(&record)?;
            }
        }
        writer.flush().map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
