//! Trial Schedules
//!
//! A phase is written as `/`-separated tokens:
//!
//! ```text
//! rand/lamda=0.5/10AB+/5A-/C
//! ```
//!
//! - `[count]LETTERS[sign]`: `count` trials of the compound (count defaults
//!   to 1 and is capped at [`MAX_TRIAL_COUNT`], sign defaults to `+`)
//! - `rand`: shuffle the phase's trials on every run
//! - `lamda=x` (or `lambda=x`): asymptote of reinforced trials in this phase
//!
//! An experiment is one line `name|phase1|phase2|...`; a table is one
//! experiment per line.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::trial::{Outcome, Trial};

/// Token marking a randomized phase.
pub const RANDOM_TOKEN: &str = "rand";

/// Largest trial count a single token may ask for.
pub const MAX_TRIAL_COUNT: usize = 100_000;

/// One parsed phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Phase {
	/// Trials in schedule order, counts expanded
	pub trials: Vec<Trial>,
	/// Whether trial order is shuffled per run
	pub randomized: bool,
	/// Asymptote for reinforced trials, overriding the rule's
	pub lamda: Option<f64>,
	/// Source text
	pub source: String,
}

impl Phase {
	/// Parse a phase string.
	///
	/// # Errors
	///
	/// Returns [`SimError::MalformedToken`] for any token that is not a trial,
	/// `rand` or a `lamda=` assignment.
	pub fn parse(phase: &str) -> Result<Self> {
		let source = phase.trim();
		let mut parsed = Self {
			source: source.to_owned(),
			..Self::default()
		};

		if source.is_empty() {
			return Ok(parsed);
		}

		let malformed = |token: &str| SimError::MalformedToken {
			token: token.to_owned(),
			phase: source.to_owned(),
		};

		for token in source.split('/').map(str::trim) {
			if token == RANDOM_TOKEN {
				parsed.randomized = true;
			} else if let Some(value) = parse_lamda(token) {
				parsed.lamda = Some(value.ok_or_else(|| malformed(token))?);
			} else {
				let (count, trial) = parse_trial(token).ok_or_else(|| malformed(token))?;
				parsed
					.trials
					.extend(std::iter::repeat(trial).take(count));
			}
		}

		Ok(parsed)
	}

	/// Every CS used in the phase.
	#[must_use]
	pub fn stimuli(&self) -> BTreeSet<char> {
		self.trials
			.iter()
			.flat_map(|t| t.compound.iter().copied())
			.collect()
	}

	/// Whether the phase has no trials.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.trials.is_empty()
	}
}

impl FromStr for Phase {
	type Err = SimError;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

/// `lamda=x` / `lambda=x`. Outer `None` if the token is not an assignment,
/// inner `None` if the value is not a number.
fn parse_lamda(token: &str) -> Option<Option<f64>> {
	let rest = token
		.strip_prefix("lambda")
		.or_else(|| token.strip_prefix("lamda"))?;
	let value = rest.trim_start().strip_prefix('=')?.trim();

	Some(value.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0))
}

/// `[count]LETTERS[sign]`
fn parse_trial(token: &str) -> Option<(usize, Trial)> {
	let digits = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
	let (count, rest) = token.split_at(digits);
	let count = if count.is_empty() {
		1
	} else {
		count.parse().ok().filter(|&n| n <= MAX_TRIAL_COUNT)?
	};

	let (letters, outcome) = match rest.strip_suffix('+') {
		Some(letters) => (letters, Outcome::Reinforced),
		None => match rest.strip_suffix('-') {
			Some(letters) => (letters, Outcome::NonReinforced),
			None => (rest, Outcome::Reinforced),
		},
	};

	if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
		return None;
	}

	Some((count, Trial::new(letters.chars(), outcome)))
}

/// One named row of the experiment table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
	/// Group name
	pub name: String,
	/// Phases in order
	pub phases: Vec<Phase>,
}

impl ExperimentSpec {
	/// Parse `name|phase1|phase2|...`.
	///
	/// # Errors
	///
	/// Returns [`SimError::InvalidExperiment`] if the line has no `|` or no name,
	/// or [`SimError::MalformedToken`] from any phase.
	pub fn parse_line(line: &str) -> Result<Self> {
		let mut parts = line.trim().split('|');
		let name = parts.next().map(str::trim).unwrap_or_default();

		let phases = parts.map(Phase::parse).collect::<Result<Vec<_>>>()?;
		if name.is_empty() || phases.is_empty() {
			return Err(SimError::InvalidExperiment(line.trim().to_owned()));
		}

		Ok(Self {
			name: name.to_owned(),
			phases,
		})
	}

	/// Every CS used in any phase.
	#[must_use]
	pub fn stimuli(&self) -> BTreeSet<char> {
		self.phases.iter().flat_map(Phase::stimuli).collect()
	}

	/// Whether no phase has any trial.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.phases.iter().all(Phase::is_empty)
	}
}

/// Parse a whole experiment table, skipping blank lines and rows without trials.
///
/// # Errors
///
/// Returns the first line's error, as in [`ExperimentSpec::parse_line`].
pub fn parse_table(text: &str) -> Result<Vec<ExperimentSpec>> {
	let mut experiments = Vec::new();

	for line in text.lines().filter(|l| !l.trim().is_empty()) {
		let spec = ExperimentSpec::parse_line(line)?;
		if !spec.is_empty() {
			experiments.push(spec);
		}
	}

	Ok(experiments)
}
