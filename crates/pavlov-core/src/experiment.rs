//! Experiment Driver
//!
//! Runs whole experiment tables. Configuration (rule lookup, parameter
//! layering, rule construction) happens once, before any trial; after that
//! every row is an independent group with its own state and its own RNG, so
//! one diverging group never stops the others.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Result, SimError};
use crate::history::{HistoryRecorder, PhaseHistory};
use crate::params::{ParameterOverrides, Parameters};
use crate::phase::Group;
use crate::rules::{LearningRule, RuleKind};
use crate::schedule::{parse_table, ExperimentSpec};

/// Number of shuffled runs averaged for a randomized phase.
pub const DEFAULT_RANDOM_REPEATS: usize = 100;

/// Everything a table run needs besides the table itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
	/// Registry name of the rule
	pub rule: String,
	/// Caller layer of the parameter resolution, including `xi_hall`
	pub overrides: ParameterOverrides,
	/// Capacity of the surprise window; `None` or 0 disables it
	pub window_size: Option<usize>,
	/// Shuffled runs per randomized phase
	pub random_repeats: usize,
	/// Base seed; experiment `i` uses `seed + i`. Entropy when unset
	pub seed: Option<u64>,
}

impl Default for SimulationConfig {
	fn default() -> Self {
		Self {
			rule: RuleKind::RescorlaWagner.name().to_owned(),
			overrides: ParameterOverrides::default(),
			window_size: None,
			random_repeats: DEFAULT_RANDOM_REPEATS,
			seed: None,
		}
	}
}

impl SimulationConfig {
	/// Resolve the rule and its parameters.
	///
	/// # Errors
	///
	/// Returns [`SimError::UnknownRule`] or [`SimError::MissingParameter`].
	pub fn configure(&self) -> Result<(LearningRule, Parameters)> {
		LearningRule::configure(&self.rule, &self.overrides)
	}

	/// RNG of the experiment at `index`.
	#[must_use]
	pub fn rng_for(&self, index: usize) -> StdRng {
		match self.seed {
			Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
			None => StdRng::from_entropy(),
		}
	}
}

/// Outcome of a table run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationReport {
	/// Series of every experiment that completed
	pub results: HistoryRecorder,
	/// Experiments that failed, with their error
	pub failures: Vec<(String, SimError)>,
}

impl SimulationReport {
	/// Whether every experiment completed.
	#[must_use]
	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Run one experiment row, phase by phase, on a fresh group.
///
/// # Errors
///
/// Configuration errors from [`SimulationConfig::configure`], then the first
/// error of any phase.
pub fn run_experiment<R: Rng + ?Sized>(
	spec: &ExperimentSpec,
	config: &SimulationConfig,
	rng: &mut R,
) -> Result<Vec<PhaseHistory>> {
	let (rule, params) = config.configure()?;
	run_configured(spec, rule, &params, config, rng)
}

#[instrument(skip_all, fields(experiment = %spec.name, phases = spec.phases.len()))]
fn run_configured<R: Rng + ?Sized>(
	spec: &ExperimentSpec,
	rule: LearningRule,
	params: &Parameters,
	config: &SimulationConfig,
	rng: &mut R,
) -> Result<Vec<PhaseHistory>> {
	let mut group = Group::new(
		spec.name.as_str(),
		rule,
		params,
		&config.overrides,
		spec.stimuli(),
		config.window_size,
	);

	spec.phases
		.iter()
		.map(|phase| group.run(phase, config.random_repeats, rng))
		.collect()
}

/// Run every experiment of a table.
///
/// Failed experiments are logged and reported in
/// [`SimulationReport::failures`]; the others still run.
///
/// # Errors
///
/// Returns configuration errors before any experiment runs.
pub fn simulate_table(specs: &[ExperimentSpec], config: &SimulationConfig) -> Result<SimulationReport> {
	let (rule, params) = config.configure()?;
	let mut report = SimulationReport::default();

	for (index, spec) in specs.iter().enumerate() {
		let mut rng = config.rng_for(index);
		match run_configured(spec, rule, &params, config, &mut rng) {
			Ok(phases) => report.results.record_experiment(&spec.name, phases),
			Err(err) => {
				warn!(experiment = %spec.name, error = %err, "experiment failed");
				report.failures.push((spec.name.clone(), err));
			}
		}
	}

	debug!(
		rule = rule.kind().name(),
		experiments = specs.len(),
		failures = report.failures.len(),
		"table complete"
	);
	Ok(report)
}

/// Parse a pipe-delimited table and run it.
///
/// # Errors
///
/// Parse errors from [`parse_table`], then as [`simulate_table`].
pub fn simulate(table: &str, config: &SimulationConfig) -> Result<SimulationReport> {
	let specs = parse_table(table)?;
	simulate_table(&specs, config)
}
