//! End-to-end runs: load, clean, transform, model, sample, diagnose, check.

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::RunConfig;
use crate::data::{Design, DesignBuilder};
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::family::Family;
use crate::fileio::load_table;
use crate::model::Model;
use crate::predictive::{self, PredictiveCheck, TestStatistic};
use crate::prior::Prior;
use crate::report::{Report, correlation, raw_slopes, render_density, render_trace};
use crate::sampler;
use crate::summary::{posterior_covariance, summarize};
use crate::trace::Trace;

/// Prior override key that applies to every slope.
pub const ALL_SLOPES: &str = "slopes";

fn design_builder(config: &RunConfig) -> DesignBuilder {
    let builder = config
        .predictors
        .iter()
        .fold(DesignBuilder::new(), |b, name| b.numeric(name));
    config
        .categorical
        .iter()
        .fold(builder, |b, name| b.categorical(name, None))
        .standardize(config.standardize)
}

/*
What it does: Turns the configured data file into a model ready for sampling

Inputs: Run configuration
Outputs: Model and the design provenance (standardizers, column names)

High-level logic:
- Loads the CSV and drops rows missing the response or any predictor
- Recodes a labelled binary response, otherwise parses it as numbers
- Builds the design matrix (standardized numeric predictors, dummy coded categoricals)
- Installs link and prior overrides on top of the defaults
 */
pub fn prepare(config: &RunConfig) -> Result<(Model, Design)> {
    config.validate()?;
    let table = load_table(&config.data)?;
    let builder = design_builder(config);

    let mut needed = builder.referenced_columns();
    needed.push(config.response.as_str());
    let clean = table.drop_missing(&needed)?;
    if clean.nrows() == 0 {
        return Err(Error::Empty("every row has a missing value".to_string()));
    }

    let y = match (&config.positive_label, config.family) {
        (Some(label), Family::Bernoulli) => clean.binary(&config.response, label)?,
        (Some(_), family) => {
            return Err(Error::InvalidConfig(format!(
                "a positive label only applies to the bernoulli family, not {}",
                family
            )));
        }
        (None, _) => clean.numeric(&config.response)?,
    };
    let design = builder.build(&clean)?;

    let mut model = Model::new(design.x.clone(), y, design.names(), config.family)?;
    if let Some(link) = config.link {
        model = model.with_link(link)?;
    }
    for (name, spec) in &config.priors {
        let prior: Prior = spec.parse()?;
        model = if name == ALL_SLOPES {
            model.with_slope_prior(prior)?
        } else {
            model.with_prior(name, prior)?
        };
    }
    info!(
        "{} model for `{}` with {} observations and {} parameters",
        model.family(),
        config.response,
        model.n_obs(),
        model.n_params()
    );
    Ok((model, design))
}

fn statistics(config: &RunConfig, family: Family) -> Result<Vec<TestStatistic>> {
    if config.checks.is_empty() {
        return Ok(TestStatistic::defaults_for(family));
    }
    config.checks.iter().map(|s| s.parse()).collect()
}

fn predictive_rng(config: &RunConfig) -> StdRng {
    // offset past the chain seeds
    StdRng::seed_from_u64(config.mcmc.seed.wrapping_add(config.mcmc.chains as u64))
}

fn prior_checks(model: &Model, config: &RunConfig, rng: &mut StdRng) -> Result<Vec<PredictiveCheck>> {
    let stats = statistics(config, model.family())?;
    let replicates = predictive::prior_predictive(model, config.predictive_draws, rng)?;
    stats
        .into_iter()
        .map(|s| predictive::check(s, model.y(), &replicates, config.hdi_prob))
        .collect()
}

fn empty_report(model: &Model, design: &Design, config: &RunConfig) -> Report {
    Report {
        family: model.family().to_string(),
        link: model.link().to_string(),
        sampler: "none".to_string(),
        n_obs: model.n_obs(),
        chains: 0,
        draws: 0,
        hdi_prob: config.hdi_prob,
        columns: design.columns.clone(),
        summary: Vec::new(),
        raw_slopes: Vec::new(),
        correlation: Vec::new(),
        convergence: None,
        r_squared: None,
        prior_checks: Vec::new(),
        posterior_checks: Vec::new(),
        predictions: Vec::new(),
        plots: Vec::new(),
    }
}

/// Prior predictive checks only: does the prior produce plausible data?
pub fn prior_check(config: &RunConfig) -> Result<Report> {
    let (model, design) = prepare(config)?;
    let mut rng = predictive_rng(config);
    let mut report = empty_report(&model, &design, config);
    report.prior_checks = prior_checks(&model, config, &mut rng)?;
    report.plots = report
        .prior_checks
        .iter()
        .map(|c| render_density(&format!("prior predictive {} (observed {:.3})", c.statistic, c.observed), &c.replicated))
        .collect();
    Ok(report)
}

/// Sampling, summaries, diagnostics and predictive checks for a prepared model.
pub fn analyse(model: &Model, design: &Design, config: &RunConfig) -> Result<(Report, Trace)> {
    let trace = sampler::sample(model, &config.mcmc, config.sampler)?;
    if let Some(path) = &config.export_draws {
        trace.export_csv(path)?;
        info!("draws written to {}", path.display());
    }

    let mut rng = predictive_rng(config);
    let mut report = empty_report(model, design, config);
    report.sampler = trace.sampler().to_string();
    report.chains = trace.n_chains();
    report.draws = trace.n_draws();
    report.summary = summarize(&trace, config.hdi_prob)?;
    report.raw_slopes = raw_slopes(&design.columns, &report.summary);
    report.correlation = correlation(&posterior_covariance(&trace));
    report.convergence = Some(diagnostics::assess(&trace));
    if model.family() == Family::Gaussian {
        report.r_squared = Some(predictive::r_squared(model, &trace)?);
    }

    if config.predictive_draws > 0 {
        if model.priors_are_proper() {
            report.prior_checks = prior_checks(model, config, &mut rng)?;
        }
        let replicates = predictive::posterior_predictive(model, &trace, config.predictive_draws, &mut rng)?;
        report.posterior_checks = statistics(config, model.family())?
            .into_iter()
            .map(|s| predictive::check(s, model.y(), &replicates, config.hdi_prob))
            .collect::<Result<_>>()?;
    }

    if let Some(path) = &config.predict {
        let new_rows = load_table(path)?;
        let x_new = design.transform(&new_rows)?;
        report.predictions = predictive::predict(model, &trace, &x_new, config.hdi_prob)?;
        info!("predicted {} new rows from {}", report.predictions.len(), path.display());
    }

    for (i, name) in trace.names().iter().enumerate() {
        report.plots.push(render_trace(&format!("trace: {}", name), trace.param(i)));
        report.plots.push(render_density(&format!("posterior: {}", name), &trace.flat(i)));
    }
    Ok((report, trace))
}

/// The whole workflow from the configured CSV file to a report.
pub fn run(config: &RunConfig) -> Result<Report> {
    let (model, design) = prepare(config)?;
    let (report, _) = analyse(&model, &design, config)?;
    Ok(report)
}
