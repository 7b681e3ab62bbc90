//! Trials and Trial Aggregation
//!
//! A trial presents a compound of CS with or without the US. Before any CS
//! is updated, the compound's predictions are summed once:
//!
//! ```text
//! sigma   = Σ assoc
//! sigmaE  = Σ Ve
//! sigmaI  = Σ Vi
//! ```
//!
//! Every CS in the compound then learns against the same pre-trial sums.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Result, SimError};
use crate::params::Hyperparameters;
use crate::stimulus::StimulusState;

/// CS letters presented together, sorted and unique.
pub type Compound = SmallVec<[char; 4]>;

/// Whether the US follows the compound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
	/// US present (`+`)
	Reinforced,
	/// US absent (`-`)
	NonReinforced,
}

impl Outcome {
	/// `+1` for reinforced trials, `-1` otherwise.
	#[must_use]
	pub const fn sign(self) -> i8 {
		match self {
			Self::Reinforced => 1,
			Self::NonReinforced => -1,
		}
	}

	/// Schedule symbol.
	#[must_use]
	pub const fn symbol(self) -> char {
		match self {
			Self::Reinforced => '+',
			Self::NonReinforced => '-',
		}
	}
}

/// One scheduled presentation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trial {
	/// CS present on the trial
	pub compound: Compound,
	/// US present or absent
	pub outcome: Outcome,
}

impl Trial {
	/// Build a trial, sorting and de-duplicating the CS letters.
	#[must_use]
	pub fn new(stimuli: impl IntoIterator<Item = char>, outcome: Outcome) -> Self {
		let mut compound: Compound = stimuli.into_iter().collect();
		compound.sort_unstable();
		compound.dedup();
		Self { compound, outcome }
	}
}

impl fmt::Display for Trial {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for cs in &self.compound {
			write!(f, "{cs}")?;
		}
		write!(f, "{}", self.outcome.symbol())
	}
}

/// Trial-level terms shared by every CS of the compound.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialContext {
	/// US present or absent
	pub outcome: Outcome,
	/// `betap` on reinforced trials, `betan` otherwise
	pub beta: f64,
	/// Asymptote; 0 on non-reinforced trials
	pub lamda: f64,
	/// `+1` / `-1`
	pub sign: i8,
	/// Net compound prediction
	pub sigma: f64,
	/// Excitatory compound prediction
	pub sigma_e: f64,
	/// Inhibitory compound prediction
	pub sigma_i: f64,
	/// 1-based trial number within the phase
	pub count: usize,
	/// `beta * (lamda - sigma)`
	pub delta_v_factor: f64,
}

impl TrialContext {
	/// Build the context for a trial from already summed predictions.
	#[must_use]
	pub fn new(
		outcome: Outcome,
		hyper: &Hyperparameters,
		phase_lamda: Option<f64>,
		sums: (f64, f64, f64),
		count: usize,
	) -> Self {
		let (beta, lamda) = match outcome {
			Outcome::Reinforced => (hyper.betap, phase_lamda.unwrap_or(hyper.lamda)),
			Outcome::NonReinforced => (hyper.betan, 0.0),
		};
		let (sigma, sigma_e, sigma_i) = sums;

		Self {
			outcome,
			beta,
			lamda,
			sign: outcome.sign(),
			sigma,
			sigma_e,
			sigma_i,
			count,
			delta_v_factor: beta * (lamda - sigma),
		}
	}

	/// `lamda - (sigmaE - sigmaI)`, the signed error of the split rules.
	#[inline]
	#[must_use]
	pub fn rho(&self) -> f64 {
		self.lamda - (self.sigma_e - self.sigma_i)
	}
}

/// Sum the compound's predictions before any of its CS is updated.
///
/// # Errors
///
/// Returns [`SimError::UnknownStimulus`] if the compound names a CS with no state.
pub fn aggregate(
	states: &BTreeMap<char, StimulusState>,
	trial: &Trial,
	hyper: &Hyperparameters,
	phase_lamda: Option<f64>,
	count: usize,
) -> Result<TrialContext> {
	let mut sums = (0.0, 0.0, 0.0);

	for cs in &trial.compound {
		let state = states.get(cs).ok_or(SimError::UnknownStimulus(*cs))?;
		sums.0 += state.assoc;
		sums.1 += state.ve;
		sums.2 += state.vi;
	}

	Ok(TrialContext::new(trial.outcome, hyper, phase_lamda, sums, count))
}
