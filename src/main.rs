use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use bayesreg::config::RunConfig;
use bayesreg::fileio::write_table;
use bayesreg::simulate::{simulate_linear, simulate_logistic, with_missing_cells};
use bayesreg::{Family, Link, Result, SamplerKind, workflow};

#[derive(Parser)]
#[command(name = "bayesreg")]
#[command(about = "Bayesian regression with MCMC: priors, sampling, diagnostics and predictive checks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model and report posterior summaries, diagnostics and predictive checks
    Fit(RunArgs),

    /// Simulate data from the priors only and compare it with the observed response
    PriorCheck(RunArgs),

    /// Write a synthetic data set for trying the workflow
    Simulate {
        #[arg(long, value_enum, default_value = "linear")]
        kind: SimKind,

        #[arg(long, default_value = "200")]
        rows: usize,

        /// Intercept followed by one coefficient per predictor
        #[arg(long, value_delimiter = ',', default_value = "1.0,2.0,-0.5")]
        coefficients: Vec<f64>,

        /// Noise standard deviation (linear only)
        #[arg(long, default_value = "1.0")]
        sigma: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Share of cells to leave empty
        #[arg(long, default_value = "0.0")]
        missing: f64,

        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SimKind {
    Linear,
    Logistic,
}

#[derive(Args)]
struct RunArgs {
    /// JSON run configuration; the flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    data: Option<PathBuf>,

    #[arg(long)]
    response: Option<String>,

    /// Label coded as 1 for a categorical binary response
    #[arg(long)]
    positive: Option<String>,

    /// Numeric predictors
    #[arg(long, value_delimiter = ',')]
    predictors: Vec<String>,

    /// Categorical predictors, dummy coded against their first level
    #[arg(long, value_delimiter = ',')]
    categorical: Vec<String>,

    /// gaussian, bernoulli or poisson
    #[arg(long)]
    family: Option<Family>,

    /// identity, logit, probit or log
    #[arg(long)]
    link: Option<Link>,

    /// Prior override, e.g. `sigma=halfnormal(5)` or `slopes=normal(0,1)`
    #[arg(long = "prior")]
    priors: Vec<String>,

    /// auto, gibbs or metropolis
    #[arg(long)]
    sampler: Option<SamplerKind>,

    #[arg(long)]
    chains: Option<usize>,

    #[arg(long)]
    draws: Option<usize>,

    #[arg(long)]
    warmup: Option<usize>,

    #[arg(long)]
    thin: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Credible interval mass
    #[arg(long)]
    hdi: Option<f64>,

    /// Predictive check statistics, e.g. `mean,sd,prop:1`
    #[arg(long, value_delimiter = ',')]
    ppc: Vec<String>,

    /// Number of predictive replicates
    #[arg(long)]
    replicates: Option<usize>,

    /// Write every retained draw to this CSV file
    #[arg(long)]
    export_draws: Option<PathBuf>,

    /// CSV of new predictor rows to predict the mean response for
    #[arg(long)]
    predict: Option<PathBuf>,

    /// Keep predictors on their raw scale
    #[arg(long)]
    no_standardize: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(data) = self.data {
            config.data = data;
        }
        if let Some(response) = self.response {
            config.response = response;
        }
        if self.positive.is_some() {
            config.positive_label = self.positive;
        }
        if !self.predictors.is_empty() {
            config.predictors = self.predictors;
        }
        if !self.categorical.is_empty() {
            config.categorical = self.categorical;
        }
        if let Some(family) = self.family {
            config.family = family;
        }
        if self.link.is_some() {
            config.link = self.link;
        }
        for spec in self.priors {
            let (name, prior) = spec.split_once('=').ok_or_else(|| {
                bayesreg::Error::InvalidConfig(format!("prior `{}` is not of the form name=prior", spec))
            })?;
            config.priors.insert(name.trim().to_string(), prior.trim().to_string());
        }
        if let Some(sampler) = self.sampler {
            config.sampler = sampler;
        }
        if let Some(chains) = self.chains {
            config.mcmc.chains = chains;
        }
        if let Some(draws) = self.draws {
            config.mcmc.draws = draws;
        }
        if let Some(warmup) = self.warmup {
            config.mcmc.warmup = warmup;
        }
        if let Some(thin) = self.thin {
            config.mcmc.thin = thin;
        }
        if let Some(seed) = self.seed {
            config.mcmc.seed = seed;
        }
        if let Some(hdi) = self.hdi {
            config.hdi_prob = hdi;
        }
        if !self.ppc.is_empty() {
            config.checks = self.ppc;
        }
        if let Some(replicates) = self.replicates {
            config.predictive_draws = replicates;
        }
        if self.export_draws.is_some() {
            config.export_draws = self.export_draws;
        }
        if self.predict.is_some() {
            config.predict = self.predict;
        }
        if self.no_standardize {
            config.standardize = false;
        }
        Ok(config)
    }
}

fn print_report(report: &bayesreg::report::Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fit(args) => {
            let json = args.json;
            let report = workflow::run(&args.into_config()?)?;
            print_report(&report, json)
        }
        Commands::PriorCheck(args) => {
            let json = args.json;
            let report = workflow::prior_check(&args.into_config()?)?;
            print_report(&report, json)
        }
        Commands::Simulate {
            kind,
            rows,
            coefficients,
            sigma,
            seed,
            missing,
            out,
        } => {
            let table = match kind {
                SimKind::Linear => simulate_linear(rows, &coefficients, sigma, seed)?,
                SimKind::Logistic => simulate_logistic(rows, &coefficients, seed)?,
            };
            let table = with_missing_cells(&table, missing, seed.wrapping_add(1))?;
            write_table(&table, &out)?;
            println!("wrote {} rows to {}", table.nrows(), out.display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
