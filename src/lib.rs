//! Bayesian regression workflow.
//!
//! Tabular data goes in, is cleaned and standardized, combined with priors into
//! a generalized linear model, sampled with several MCMC chains and comes out
//! as posterior summaries, convergence diagnostics and predictive checks.

pub mod config;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod family;
pub mod fileio;
pub mod gibbs;
pub mod linalg;
pub mod link;
pub mod metropolis;
pub mod model;
pub mod predictive;
pub mod prior;
pub mod report;
pub mod sampler;
pub mod simulate;
pub mod summary;
pub mod trace;
pub mod workflow;

pub use config::{McmcConfig, RunConfig};
pub use error::{Error, Result};
pub use family::Family;
pub use link::Link;
pub use model::Model;
pub use prior::Prior;
pub use sampler::{SamplerKind, sample};
pub use trace::Trace;

#[cfg(test)]
mod tests;
