use std::fs;

use ndarray::{Array1, Array2, Axis, array};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{McmcConfig, RunConfig};
use crate::data::{Column, DesignBuilder, Standardizer, Table};
use crate::diagnostics::assess;
use crate::error::Error;
use crate::family::Family;
use crate::fileio::{load_table, write_table};
use crate::model::Model;
use crate::predictive::{TestStatistic, check, posterior_predictive, predict, prior_predictive, r_squared};
use crate::prior::Prior;
use crate::sampler::{SamplerKind, sample};
use crate::simulate::{simulate_linear, simulate_logistic, with_missing_cells};
use crate::summary::{posterior_covariance, summarize};
use crate::workflow;

fn quick_config(seed: u64) -> McmcConfig {
    McmcConfig {
        chains: 4,
        draws: 500,
        warmup: 500,
        thin: 1,
        seed,
        ..McmcConfig::default()
    }
}

// Single predictor x1 ~ N(0, 1) with its response, as model inputs
fn linear_inputs(n: usize, coefficients: &[f64], sigma: f64, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let table = simulate_linear(n, coefficients, sigma, seed).unwrap();
    let x = table.numeric("x1").unwrap().insert_axis(Axis(1));
    (x, table.numeric("y").unwrap())
}

fn mean_of(trace: &crate::Trace, name: &str) -> f64 {
    trace.means()[trace.index(name).unwrap()]
}

/*
Testing new() method
    - Dimensions of both data and model parameters
    - Default priors and link
 */
#[test]
fn test_new_with_defaults() {
    let x = array![[1.0, 2.0], [3.0, 4.0]];
    let y = array![1.0, 2.0];

    let model = Model::new(x, y.clone(), vec!["a".into(), "b".into()], Family::Gaussian).unwrap();

    assert_eq!(model.x().nrows(), 2);
    assert_eq!(model.x().ncols(), 3); // With the intercept term
    assert_eq!(model.y(), &y);
    assert_eq!(model.param_names(), vec!["intercept", "a", "b", "sigma"]);
    assert_eq!(model.coefficient_priors()[0], Prior::DEFAULT_INTERCEPT);
    assert_eq!(model.coefficient_priors()[1], Prior::DEFAULT_SLOPE);
    assert_eq!(model.scale_prior(), Some(Prior::DEFAULT_SCALE));
    assert_eq!(model.link(), crate::Link::Identity);
}

#[test]
fn test_new_rejects_mismatched_rows() {
    let x = array![[1.0], [2.0], [3.0]];
    let y = array![1.0, 2.0];
    let result = Model::new(x, y, vec!["a".into()], Family::Gaussian);
    assert!(matches!(result, Err(Error::Dimension(_))));
}

/*
Testing if the inverse gamma prior gives positive variances for every sample
 */
#[test]
fn test_sample_variance_positive() {
    let prior = Prior::InverseGamma { shape: 2.0, scale: 2.0 };
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..100 {
        assert!(prior.sample(&mut rng).unwrap() > 0.0);
    }
}

/*
Test if sampling from the prior provides a positive sigma and the right number
of coefficients
 */
#[test]
fn test_sample_prior_has_model_shape() {
    let x = array![[1.0], [2.0]];
    let y = array![1.0, 2.0];
    let model = Model::new(x, y, vec!["x".into()], Family::Gaussian).unwrap();
    let mut rng = StdRng::seed_from_u64(2);
    let params = model.sample_prior(&mut rng).unwrap();

    assert_eq!(params.len(), 3); // intercept + 1 feature + sigma
    assert!(params[2] > 0.0);
}

/*
Test if the MCMC is working
    - Every chain is populated
    - Exactly `draws` samples per chain, thinning included
    - Sigma draws stay positive
 */
#[test]
fn test_run_mcmc_produces_samples() {
    let x = array![[1.0], [2.0], [3.0], [4.0]];
    let y = array![2.0, 3.9, 6.1, 7.8];
    let model = Model::new(x, y, vec!["x".into()], Family::Gaussian).unwrap();
    let config = McmcConfig {
        chains: 2,
        draws: 100,
        warmup: 10,
        thin: 5,
        ..McmcConfig::default()
    };
    let trace = sample(&model, &config, SamplerKind::Auto).unwrap();

    assert_eq!(trace.sampler(), "gibbs");
    assert_eq!(trace.n_chains(), 2);
    assert_eq!(trace.n_draws(), 100);
    assert!(trace.param_by_name("sigma").unwrap().iter().all(|&s| s > 0.0));
}

/*
Gibbs sampler recovers the coefficients of a simulated linear regression
    - Posterior means close to the truth
    - Chains agree (R-hat)
    - R^2 high for a low-noise problem
 */
#[test]
fn test_gibbs_recovers_linear_coefficients() {
    let (x, y) = linear_inputs(200, &[1.0, 2.0], 0.5, 7);
    let model = Model::new(x, y, vec!["x1".into()], Family::Gaussian).unwrap();
    let trace = sample(&model, &quick_config(11), SamplerKind::Gibbs).unwrap();

    assert!((mean_of(&trace, "intercept") - 1.0).abs() < 0.2);
    assert!((mean_of(&trace, "x1") - 2.0).abs() < 0.2);
    assert!((mean_of(&trace, "sigma") - 0.5).abs() < 0.1);

    let convergence = assess(&trace);
    assert!(convergence.max_r_hat < 1.05, "r_hat {}", convergence.max_r_hat);
    assert!(r_squared(&model, &trace).unwrap() > 0.9);
}

#[test]
fn test_metropolis_recovers_logistic_coefficients() {
    let table = simulate_logistic(500, &[-0.5, 1.5], 5).unwrap();
    let x = table.numeric("x1").unwrap().insert_axis(Axis(1));
    let y = table.binary("y", "yes").unwrap();
    let model = Model::new(x, y, vec!["x1".into()], Family::Bernoulli).unwrap();
    let trace = sample(&model, &quick_config(3), SamplerKind::Auto).unwrap();

    assert_eq!(trace.sampler(), "metropolis");
    assert_eq!(trace.names(), &["intercept".to_string(), "x1".to_string()]);
    assert!((mean_of(&trace, "intercept") + 0.5).abs() < 0.4);
    assert!((mean_of(&trace, "x1") - 1.5).abs() < 0.4);
    assert!(assess(&trace).max_r_hat < 1.1);

    for rate in trace.mean_acceptance() {
        assert!(rate > 0.2 && rate < 0.7, "acceptance {}", rate);
    }
}

#[test]
fn test_samplers_agree_on_gaussian_model() {
    let (x, y) = linear_inputs(100, &[0.5, -1.0], 1.0, 21);
    let model = Model::new(x, y, vec!["x1".into()], Family::Gaussian).unwrap();
    let gibbs = sample(&model, &quick_config(1), SamplerKind::Gibbs).unwrap();
    let metropolis = sample(&model, &quick_config(1), SamplerKind::Metropolis).unwrap();

    for name in ["intercept", "x1", "sigma"] {
        let diff = (mean_of(&gibbs, name) - mean_of(&metropolis, name)).abs();
        assert!(diff < 0.1, "{} differs by {}", name, diff);
    }
}

#[test]
fn test_same_seed_gives_same_draws() {
    let (x, y) = linear_inputs(50, &[0.0, 1.0], 1.0, 4);
    let model = Model::new(x, y, vec!["x1".into()], Family::Gaussian).unwrap();
    let config = McmcConfig {
        draws: 50,
        warmup: 50,
        ..McmcConfig::default()
    };
    let a = sample(&model, &config, SamplerKind::Metropolis).unwrap();
    let b = sample(&model, &config, SamplerKind::Metropolis).unwrap();
    assert_eq!(a.draws(), b.draws());
}

#[test]
fn test_gibbs_refuses_non_conjugate_models() {
    let model = Model::new(array![[0.0], [1.0]], array![0.0, 1.0], vec!["x".into()], Family::Bernoulli).unwrap();
    let result = sample(&model, &McmcConfig::default(), SamplerKind::Gibbs);
    assert!(matches!(result, Err(Error::UnsupportedSampler { .. })));

    let gaussian = Model::new(array![[0.0], [1.0]], array![0.0, 1.0], vec!["x".into()], Family::Gaussian)
        .unwrap()
        .with_slope_prior(Prior::Cauchy { loc: 0.0, scale: 1.0 })
        .unwrap();
    assert!(!gaussian.is_conjugate_gaussian());
}

#[test]
fn test_positive_priors_only_on_sigma() {
    let model = Model::new(array![[0.0], [1.0]], array![0.0, 1.0], vec!["x".into()], Family::Gaussian).unwrap();
    assert!(model.clone().with_prior("x", Prior::HalfNormal { sigma: 1.0 }).is_err());
    assert!(model.clone().with_scale_prior(Prior::Normal { mu: 0.0, sigma: 1.0 }).is_err());
    assert!(model.clone().with_prior("nope", Prior::Flat).is_err());
    assert!(model.with_scale_prior(Prior::Exponential { rate: 1.0 }).is_ok());
}

#[test]
fn test_log_posterior_includes_sigma_jacobian() {
    let model = Model::new(array![[0.0], [1.0]], array![0.5, 1.5], vec!["x".into()], Family::Gaussian).unwrap();
    let params = [0.5, 1.0, 2.0];
    let theta = model.unconstrain(&params);
    let expected = model.log_prior(&params) + model.log_likelihood(&params) + 2.0_f64.ln();
    assert!((model.log_posterior_unconstrained(&theta) - expected).abs() < 1e-10);
}

/*
Testing the data pipeline
    - Missing rows dropped only for the inspected columns
    - Binary recoding and dummy coding
    - Standardization
 */
#[test]
fn test_drop_missing_only_inspects_named_columns() {
    let table = Table::new(vec![
        Column::new("a", vec![Some("1".into()), None, Some("3".into())]),
        Column::new("b", vec![None, Some("2".into()), Some("3".into())]),
    ])
    .unwrap();
    let clean = table.drop_missing(&["a"]).unwrap();
    assert_eq!(clean.nrows(), 2);
    assert_eq!(clean.numeric("a").unwrap(), array![1.0, 3.0]);
    assert_eq!(table.drop_missing(&[]).unwrap().nrows(), 1);
    assert!(matches!(table.drop_missing(&["c"]), Err(Error::MissingColumn(_))));
}

#[test]
fn test_numeric_reports_bad_cell() {
    let table = Table::new(vec![Column::new("a", vec![Some("1".into()), Some("abc".into())])]).unwrap();
    match table.numeric("a") {
        Err(Error::NotNumeric { row, value, .. }) => {
            assert_eq!(row, 1);
            assert_eq!(value, "abc");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_binary_recoding() {
    let labels = |v: &[&str]| Column::new("y", v.iter().map(|s| Some(s.to_string())).collect());
    let table = Table::new(vec![labels(&["yes", "no", "yes"])]).unwrap();
    assert_eq!(table.binary("y", "yes").unwrap(), array![1.0, 0.0, 1.0]);
    assert!(table.binary("y", "maybe").is_err());

    let three = Table::new(vec![labels(&["a", "b", "c"])]).unwrap();
    assert!(matches!(three.binary("y", "a"), Err(Error::InvalidLabels { .. })));
}

#[test]
fn test_dummies_skip_reference_level() {
    let table = Table::new(vec![Column::new(
        "sex",
        ["f", "m", "m", "f"].iter().map(|s| Some(s.to_string())).collect(),
    )])
    .unwrap();
    let dummies = table.dummies("sex", None).unwrap();
    assert_eq!(dummies.len(), 1);
    assert_eq!(dummies[0].0, "sex[m]");
    assert_eq!(dummies[0].1, array![0.0, 1.0, 1.0, 0.0]);

    let other = table.dummies("sex", Some("m")).unwrap();
    assert_eq!(other[0].0, "sex[f]");
}

#[test]
fn test_standardizer() {
    let values = array![1.0, 2.0, 3.0, 4.0, 5.0];
    let scaler = Standardizer::fit("v", &values).unwrap();
    assert_eq!(scaler.mean, 3.0);
    assert!((scaler.sd - 2.5_f64.sqrt()).abs() < 1e-12);

    let z = scaler.transform(&values);
    assert!(z.sum().abs() < 1e-12);
    let back = scaler.inverse(&z);
    assert!(back.iter().zip(values.iter()).all(|(a, b)| (a - b).abs() < 1e-12));

    assert!(matches!(Standardizer::fit("c", &array![2.0, 2.0]), Err(Error::ZeroVariance(_))));
}

#[test]
fn test_design_builder_standardizes_and_dummy_codes() {
    let table = Table::new(vec![
        Column::from_f64("height", &[150.0, 160.0, 170.0, 180.0]),
        Column::new("group", ["a", "b", "c", "a"].iter().map(|s| Some(s.to_string())).collect()),
    ])
    .unwrap();
    let design = DesignBuilder::new()
        .numeric("height")
        .categorical("group", None)
        .build(&table)
        .unwrap();

    assert_eq!(design.names(), vec!["height", "group[b]", "group[c]"]);
    assert_eq!(design.x.dim(), (4, 3));
    assert!(design.x.column(0).sum().abs() < 1e-12);
    assert!(design.columns[0].standardizer.is_some());
    assert_eq!(design.x.column(2).to_vec(), vec![0.0, 0.0, 1.0, 0.0]);
}

/*
New rows go through the fitted design: training standardizers, training levels
 */
#[test]
fn test_design_transforms_new_rows() {
    let table = Table::new(vec![
        Column::from_f64("height", &[150.0, 160.0, 170.0, 180.0]),
        Column::new("group", ["a", "b", "c", "a"].iter().map(|s| Some(s.to_string())).collect()),
    ])
    .unwrap();
    let design = DesignBuilder::new()
        .numeric("height")
        .categorical("group", None)
        .build(&table)
        .unwrap();

    // the training rows come back unchanged
    assert_eq!(design.transform(&table).unwrap(), design.x);

    let new_rows = Table::new(vec![
        Column::from_f64("height", &[165.0]),
        Column::new("group", vec![Some("c".to_string())]),
    ])
    .unwrap();
    let x = design.transform(&new_rows).unwrap();
    // 165 is the training mean of height
    assert_eq!(x.row(0).to_vec(), vec![0.0, 0.0, 1.0]);

    let unseen = Table::new(vec![
        Column::from_f64("height", &[165.0]),
        Column::new("group", vec![Some("d".to_string())]),
    ])
    .unwrap();
    assert!(matches!(design.transform(&unseen), Err(Error::InvalidLabels { .. })));
}

#[test]
fn test_load_table_marks_missing_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    fs::write(&path, "x,y\n1.5,a\nNA,b\n2.5,\n?,a\n").unwrap();

    let table = load_table(&path).unwrap();
    assert_eq!(table.nrows(), 4);
    assert_eq!(table.column("x").unwrap().values[1], None);
    assert_eq!(table.column("y").unwrap().values[2], None);
    assert_eq!(table.drop_missing(&[]).unwrap().nrows(), 2);

    let copy = dir.path().join("copy.csv");
    write_table(&table, &copy).unwrap();
    assert_eq!(load_table(&copy).unwrap(), table);
}

#[test]
fn test_load_table_missing_file() {
    assert!(matches!(load_table("/definitely/not/here.csv"), Err(Error::Io { .. })));
}

/*
Testing summaries and predictive checks on a fitted model
    - Intervals contain the truth
    - Posterior predictive p-values are not extreme for a well specified model
    - Predictions for new rows
 */
#[test]
fn test_summary_and_predictive_checks() {
    let (x, y) = linear_inputs(150, &[3.0, -1.0], 0.8, 9);
    let model = Model::new(x, y, vec!["x1".into()], Family::Gaussian).unwrap();
    let trace = sample(&model, &quick_config(5), SamplerKind::Auto).unwrap();

    let summary = summarize(&trace, 0.94).unwrap();
    assert_eq!(summary.len(), 3);
    let slope = &summary[1];
    assert_eq!(slope.name, "x1");
    assert!(slope.hdi_low < -1.0 && slope.hdi_high > -1.0);
    assert!(slope.sd > 0.0);

    let cov = posterior_covariance(&trace);
    assert_eq!(cov.dim(), (3, 3));
    assert!((cov[[1, 1]].sqrt() - slope.sd).abs() < 1e-6);

    let mut rng = StdRng::seed_from_u64(8);
    let replicates = posterior_predictive(&model, &trace, 200, &mut rng).unwrap();
    assert_eq!(replicates.dim(), (200, 150));
    let result = check(TestStatistic::Mean, model.y(), &replicates, 0.94).unwrap();
    assert!(result.p_value > 0.05 && result.p_value < 0.95, "p = {}", result.p_value);

    let predictions = predict(&model, &trace, &array![[0.0], [1.0]], 0.94).unwrap();
    assert!((predictions[0].mean - 3.0).abs() < 0.3);
    assert!(predictions[1].low < predictions[1].mean && predictions[1].mean < predictions[1].high);
}

#[test]
fn test_prior_predictive_needs_proper_priors() {
    let model = Model::new(array![[0.0], [1.0]], array![0.0, 1.0], vec!["x".into()], Family::Bernoulli).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let replicates = prior_predictive(&model, 30, &mut rng).unwrap();
    assert_eq!(replicates.dim(), (30, 2));
    assert!(replicates.iter().all(|&v| v == 0.0 || v == 1.0));

    let flat = model.with_intercept_prior(Prior::Flat).unwrap();
    assert!(prior_predictive(&flat, 5, &mut rng).is_err());
}

/*
A heavy-tailed prior under the log link can produce rates far beyond what can
be simulated; those replicates are skipped instead of stalling the draw
 */
#[test]
fn test_prior_predictive_skips_out_of_range_means() {
    let x = array![[0.0], [1.0], [2.0]];
    let model = Model::new(x, array![0.0, 1.0, 3.0], vec!["x".into()], Family::Poisson)
        .unwrap()
        .with_intercept_prior(Prior::Cauchy { loc: 0.0, scale: 10.0 })
        .unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let replicates = prior_predictive(&model, 500, &mut rng).unwrap();

    assert!(replicates.nrows() > 0 && replicates.nrows() < 500);
    assert_eq!(replicates.ncols(), 3);
    assert!(replicates.iter().all(|v| v.is_finite() && *v >= 0.0));
}

/*
Probit likelihood stays finite where Phi(eta) rounds to 1
 */
#[test]
fn test_probit_log_likelihood_in_the_tail() {
    let model = Model::new(array![[0.0], [1.0]], array![0.0, 1.0], vec!["x".into()], Family::Bernoulli)
        .unwrap()
        .with_link(crate::Link::Probit)
        .unwrap();
    // eta = 9 on both rows: ln(1 - Phi(9)) + ln Phi(9)
    let ll = model.log_likelihood(&[9.0, 0.0]);
    assert!((ll + 43.628).abs() < 0.01, "ll = {}", ll);
    assert!(model.log_likelihood(&[60.0, 0.0]).is_finite());
}

fn standard_normal_column(n: usize, rng: &mut StdRng) -> Array1<f64> {
    use rand::Rng;
    (0..n).map(|_| rng.sample::<f64, _>(rand_distr::StandardNormal)).collect()
}

/*
Metropolis recovers coefficients for the non-canonical and count models
    - Poisson with log link
    - Bernoulli with probit link
    - Gaussian with log link
 */
#[test]
fn test_metropolis_recovers_poisson_coefficients() {
    use rand_distr::{Distribution, Poisson};
    let mut rng = StdRng::seed_from_u64(31);
    let x = standard_normal_column(300, &mut rng);
    let y = x.mapv(|v| Poisson::new((0.5 + 0.8 * v).exp()).unwrap().sample(&mut rng));

    let model = Model::new(x.insert_axis(Axis(1)), y, vec!["x1".into()], Family::Poisson).unwrap();
    assert_eq!(model.link(), crate::Link::Log);
    let trace = sample(&model, &quick_config(5), SamplerKind::Auto).unwrap();

    assert_eq!(trace.sampler(), "metropolis");
    assert!((mean_of(&trace, "intercept") - 0.5).abs() < 0.2);
    assert!((mean_of(&trace, "x1") - 0.8).abs() < 0.2);
    assert!(assess(&trace).max_r_hat < 1.1);
}

#[test]
fn test_metropolis_recovers_probit_coefficients() {
    use rand::Rng;
    let mut rng = StdRng::seed_from_u64(37);
    let x = standard_normal_column(400, &mut rng);
    let y = x.mapv(|v| {
        let latent = 0.2 + 1.0 * v + rng.sample::<f64, _>(rand_distr::StandardNormal);
        if latent > 0.0 { 1.0 } else { 0.0 }
    });

    let model = Model::new(x.insert_axis(Axis(1)), y, vec!["x1".into()], Family::Bernoulli)
        .unwrap()
        .with_link(crate::Link::Probit)
        .unwrap();
    let trace = sample(&model, &quick_config(9), SamplerKind::Auto).unwrap();

    assert!((mean_of(&trace, "intercept") - 0.2).abs() < 0.3);
    assert!((mean_of(&trace, "x1") - 1.0).abs() < 0.3);
    assert!(assess(&trace).max_r_hat < 1.1);
}

#[test]
fn test_metropolis_recovers_gaussian_log_link() {
    use rand::Rng;
    let mut rng = StdRng::seed_from_u64(41);
    let x = standard_normal_column(200, &mut rng);
    let y = x.mapv(|v| (0.5 + 0.3 * v).exp() + 0.2 * rng.sample::<f64, _>(rand_distr::StandardNormal));

    let model = Model::new(x.insert_axis(Axis(1)), y, vec!["x1".into()], Family::Gaussian)
        .unwrap()
        .with_link(crate::Link::Log)
        .unwrap();
    assert!(!model.is_conjugate_gaussian());
    let trace = sample(&model, &quick_config(13), SamplerKind::Auto).unwrap();

    assert_eq!(trace.sampler(), "metropolis");
    assert!((mean_of(&trace, "intercept") - 0.5).abs() < 0.1);
    assert!((mean_of(&trace, "x1") - 0.3).abs() < 0.1);
    assert!((mean_of(&trace, "sigma") - 0.2).abs() < 0.05);
}

/*
No starting point inside the prior support: sampling reports it instead of looping
 */
#[test]
fn test_initial_point_gives_up() {
    let model = Model::new(array![[0.0], [1.0]], array![0.0, 1.0], vec!["x".into()], Family::Gaussian)
        .unwrap()
        .with_intercept_prior(Prior::Uniform { lower: -20.0, upper: -10.0 })
        .unwrap();
    let mut rng = StdRng::seed_from_u64(8);
    assert!(matches!(
        crate::sampler::initial_point(&model, &mut rng),
        Err(Error::InvalidConfig(_))
    ));
    assert!(sample(&model, &McmcConfig::default(), SamplerKind::Metropolis).is_err());
}

#[test]
fn test_export_draws_csv() {
    let (x, y) = linear_inputs(30, &[0.0, 1.0], 1.0, 2);
    let model = Model::new(x, y, vec!["x1".into()], Family::Gaussian).unwrap();
    let config = McmcConfig {
        chains: 2,
        draws: 20,
        warmup: 20,
        ..McmcConfig::default()
    };
    let trace = sample(&model, &config, SamplerKind::Auto).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("draws.csv");
    trace.export_csv(&path).unwrap();
    let exported = load_table(&path).unwrap();
    assert_eq!(exported.nrows(), 40);
    assert_eq!(exported.ncols(), 5); // chain, draw, intercept, x1, sigma
}

/*
End-to-end workflow runs from a CSV file on disk
 */
#[test]
fn test_workflow_linear_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    let simulated = simulate_linear(120, &[5.0, 0.8, -0.3], 1.0, 13).unwrap();
    let holes = with_missing_cells(&simulated, 0.02, 14).unwrap();
    let complete = holes.drop_missing(&[]).unwrap().nrows();
    assert!(complete < 120);
    write_table(&holes, &path).unwrap();

    // new rows at the training means of x1 (0) and x2 (10), and one sd of x2 above
    let new_rows = dir.path().join("new.csv");
    fs::write(&new_rows, "x1,x2\n0,10\n0,12\n").unwrap();

    let config = RunConfig {
        data: path,
        response: "y".into(),
        predictors: vec!["x1".into(), "x2".into()],
        mcmc: quick_config(17),
        predictive_draws: 100,
        predict: Some(new_rows),
        ..RunConfig::default()
    };
    let report = workflow::run(&config).unwrap();

    assert_eq!(report.n_obs, complete);
    assert_eq!(report.predictions.len(), 2);
    // 5 + 0.8 * 0 - 0.3 * 10
    assert!((report.predictions[0].mean - 2.0).abs() < 0.5);
    assert!(report.predictions[1].mean < report.predictions[0].mean);
    assert_eq!(report.correlation.len(), 4);
    assert!((report.correlation[1][1] - 1.0).abs() < 1e-9);
    assert_eq!(report.sampler, "gibbs");
    assert_eq!(report.summary.len(), 4);
    assert!(report.convergence.as_ref().unwrap().max_r_hat < 1.05);
    assert_eq!(report.posterior_checks.len(), 2);
    assert!(report.r_squared.is_some());
    // x2 is standardized: its coefficient is per standard deviation of x2 (sd ~ 2)
    let x2 = report.columns[1].standardizer.unwrap();
    let slope = report.summary[2].mean;
    assert!((x2.rescale_coefficient(slope) + 0.3).abs() < 0.2);
    assert_eq!(report.raw_slopes.len(), 2);
    assert_eq!(report.raw_slopes[1].mean, x2.rescale_coefficient(slope));

    let text = report.to_string();
    assert!(text.contains("posterior predictive checks"));
    assert!(text.contains("intercept"));
    assert!(text.contains("slopes per raw unit"));
    assert!(text.contains("posterior correlations"));
    assert!(text.contains("predicted mean response"));
}

#[test]
fn test_workflow_logistic_with_labels_and_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logistic.csv");
    write_table(&simulate_logistic(300, &[0.3, 1.2], 19).unwrap(), &path).unwrap();

    let mut config = RunConfig {
        data: path,
        response: "y".into(),
        positive_label: Some("yes".into()),
        predictors: vec!["x1".into()],
        family: Family::Bernoulli,
        checks: vec!["prop:1".into()],
        mcmc: quick_config(23),
        predictive_draws: 100,
        ..RunConfig::default()
    };
    config.priors.insert("slopes".into(), "normal(0, 1)".into());
    config.priors.insert("intercept".into(), "studentt(3, 0, 2.5)".into());

    let report = workflow::run(&config).unwrap();
    assert_eq!(report.link, "logit");
    assert_eq!(report.sampler, "metropolis");
    assert_eq!(report.prior_checks.len(), 1);
    let ppc = &report.posterior_checks[0];
    assert_eq!(ppc.statistic, TestStatistic::Proportion(1.0));
    assert!(ppc.p_value > 0.02 && ppc.p_value < 0.98);

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"prop:1\""));
}

/*
Poisson counts through the whole workflow with a heavy-tailed intercept prior,
which also runs the prior predictive checks
 */
#[test]
fn test_workflow_poisson_with_heavy_tailed_prior() {
    use rand_distr::{Distribution, Poisson};
    let mut rng = StdRng::seed_from_u64(43);
    let x = standard_normal_column(150, &mut rng);
    let y: Vec<f64> = x.iter().map(|v| Poisson::new((1.0 + 0.4 * v).exp()).unwrap().sample(&mut rng)).collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counts.csv");
    let table = Table::new(vec![Column::from_f64("x1", &x.to_vec()), Column::from_f64("count", &y)]).unwrap();
    write_table(&table, &path).unwrap();

    let mut config = RunConfig {
        data: path,
        response: "count".into(),
        predictors: vec!["x1".into()],
        family: Family::Poisson,
        mcmc: quick_config(47),
        predictive_draws: 200,
        ..RunConfig::default()
    };
    config.priors.insert("intercept".into(), "cauchy(0, 10)".into());
    let report = workflow::run(&config).unwrap();

    assert_eq!(report.link, "log");
    assert_eq!(report.summary.len(), 2);
    assert!(report.r_squared.is_none());
    assert!(!report.prior_checks.is_empty());
    assert_eq!(report.posterior_checks.len(), 2); // mean and prop:0
    assert!((report.summary[0].mean - 1.0).abs() < 0.25);
}

#[test]
fn test_workflow_rejects_bad_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    write_table(&simulate_linear(20, &[0.0, 1.0], 1.0, 1).unwrap(), &path).unwrap();

    let base = RunConfig {
        data: path,
        response: "y".into(),
        predictors: vec!["x1".into()],
        ..RunConfig::default()
    };

    let label_on_gaussian = RunConfig {
        positive_label: Some("1".into()),
        ..base.clone()
    };
    assert!(workflow::prepare(&label_on_gaussian).is_err());

    let mut bad_prior = base.clone();
    bad_prior.priors.insert("sigma".into(), "normal(0, 1)".into());
    assert!(matches!(workflow::prepare(&bad_prior), Err(Error::InvalidPrior(_))));

    let unknown = RunConfig {
        predictors: vec!["height".into()],
        ..base
    };
    assert!(matches!(workflow::prepare(&unknown), Err(Error::MissingColumn(_))));
}

#[test]
fn test_prior_check_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    write_table(&simulate_linear(40, &[0.0, 1.0], 1.0, 3).unwrap(), &path).unwrap();

    let config = RunConfig {
        data: path,
        response: "y".into(),
        predictors: vec!["x1".into()],
        checks: vec!["mean".into(), "max".into()],
        predictive_draws: 50,
        ..RunConfig::default()
    };
    let report = workflow::prior_check(&config).unwrap();
    assert!(report.summary.is_empty());
    assert_eq!(report.prior_checks.len(), 2);
    assert_eq!(report.prior_checks[0].replicated.len(), 50);
    assert_eq!(report.plots.len(), 2);
}
