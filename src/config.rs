use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::family::Family;
use crate::link::Link;
use crate::sampler::SamplerKind;

/// Sampling schedule shared by every sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McmcConfig {
    /// Independent chains, run in parallel.
    pub chains: usize,
    /// Retained draws per chain.
    pub draws: usize,
    /// Warm-up iterations per chain, discarded; proposal scales adapt here.
    pub warmup: usize,
    /// Keep every `thin`-th post warm-up iteration.
    pub thin: usize,
    pub seed: u64,
    /// Acceptance rate the random-walk step sizes are tuned towards.
    pub target_accept: f64,
}

impl Default for McmcConfig {
    fn default() -> Self {
        McmcConfig {
            chains: 4,
            draws: 1000,
            warmup: 1000,
            thin: 1,
            seed: 42,
            target_accept: 0.44,
        }
    }
}

impl McmcConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chains == 0 {
            return Err(Error::InvalidConfig("at least one chain is required".to_string()));
        }
        if self.draws == 0 {
            return Err(Error::InvalidConfig("draws must be positive".to_string()));
        }
        if self.thin == 0 {
            return Err(Error::InvalidConfig("thinning interval must be positive".to_string()));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "target acceptance {} must lie strictly between 0 and 1",
                self.target_accept
            )));
        }
        Ok(())
    }

    /// Iterations each chain runs, warm-up included.
    pub fn iterations(&self) -> usize {
        self.warmup + self.draws * self.thin
    }

    /// Whether iteration `i` (0-based, warm-up included) is retained.
    pub fn is_retained(&self, i: usize) -> bool {
        i >= self.warmup && (i - self.warmup) % self.thin == 0
    }
}

/// Everything one end-to-end run needs, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: PathBuf,
    pub response: String,
    /// For binary responses: the label coded as 1.
    pub positive_label: Option<String>,
    pub predictors: Vec<String>,
    pub categorical: Vec<String>,
    pub standardize: bool,
    pub family: Family,
    pub link: Option<Link>,
    /// Prior overrides by parameter name (`intercept`, `sigma`, a predictor, or `slopes`).
    pub priors: BTreeMap<String, String>,
    pub sampler: SamplerKind,
    pub mcmc: McmcConfig,
    /// Probability mass of the reported credible intervals.
    pub hdi_prob: f64,
    /// Test statistics for predictive checks, e.g. `mean`, `sd`, `prop:1`.
    pub checks: Vec<String>,
    pub predictive_draws: usize,
    pub export_draws: Option<PathBuf>,
    /// CSV of new predictor rows to predict the mean response for.
    pub predict: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            data: PathBuf::new(),
            response: String::new(),
            positive_label: None,
            predictors: Vec::new(),
            categorical: Vec::new(),
            standardize: true,
            family: Family::Gaussian,
            link: None,
            priors: BTreeMap::new(),
            sampler: SamplerKind::Auto,
            mcmc: McmcConfig::default(),
            hdi_prob: 0.94,
            checks: Vec::new(),
            predictive_draws: 500,
            export_draws: None,
            predict: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.response.is_empty() {
            return Err(Error::InvalidConfig("no response column given".to_string()));
        }
        if !(self.hdi_prob > 0.0 && self.hdi_prob < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "credible mass {} must lie strictly between 0 and 1",
                self.hdi_prob
            )));
        }
        if self.predictors.iter().chain(&self.categorical).any(|p| *p == self.response) {
            return Err(Error::InvalidConfig(format!(
                "response `{}` is also listed as a predictor",
                self.response
            )));
        }
        self.mcmc.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retained_iterations_give_exact_draw_count() {
        let config = McmcConfig {
            draws: 7,
            warmup: 5,
            thin: 3,
            ..McmcConfig::default()
        };
        let kept = (0..config.iterations()).filter(|&i| config.is_retained(i)).count();
        assert_eq!(kept, 7);
    }

    #[test]
    fn zero_thin_is_rejected() {
        let config = McmcConfig {
            thin: 0,
            ..McmcConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"response": "y", "family": "bernoulli", "mcmc": {"chains": 2}}"#).unwrap();
        assert_eq!(config.family, Family::Bernoulli);
        assert_eq!(config.mcmc.chains, 2);
        assert_eq!(config.mcmc.draws, 1000);
        assert!(config.standardize);
    }
}
