//! Phase Runner
//!
//! A [`Group`] owns the state of every CS of one experiment row and advances
//! it one trial at a time:
//!
//! 1. Sum the compound's predictions (before touching any CS)
//! 2. For each CS present: apply the rule against its baseline, refresh
//!    its surprise window, record the new state
//!
//! CS absent from a trial are left untouched and get no record.
//!
//! Randomized phases are replayed several times from the same starting
//! states, each run with its own shuffle; the recorded series and the
//! states carried into the next phase are the means over runs.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::error::{Result, SimError};
use crate::history::{mean_phase, PhaseHistory, StimulusHistory};
use crate::params::{ParameterOverrides, Parameters};
use crate::rules::LearningRule;
use crate::schedule::Phase;
use crate::stimulus::StimulusState;
use crate::trial::{aggregate, Trial};

/// State of every CS of one group, keyed by CS letter.
pub type StimulusMap = BTreeMap<char, StimulusState>;

/// One experiment row's learner.
#[derive(Clone, Debug)]
pub struct Group {
	name: String,
	rule: LearningRule,
	states: StimulusMap,
	window_size: Option<usize>,
}

impl Group {
	/// A fresh group over `stimuli`.
	///
	/// A `window_size` of zero disables the surprise window.
	#[must_use]
	pub fn new(
		name: impl Into<String>,
		rule: LearningRule,
		params: &Parameters,
		overrides: &ParameterOverrides,
		stimuli: impl IntoIterator<Item = char>,
		window_size: Option<usize>,
	) -> Self {
		let states = stimuli
			.into_iter()
			.map(|cs| (cs, StimulusState::new(cs, params, overrides)))
			.collect();

		Self {
			name: name.into(),
			rule,
			states,
			window_size: window_size.filter(|&n| n > 0),
		}
	}

	/// Group name.
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The active rule.
	#[must_use]
	pub const fn rule(&self) -> &LearningRule {
		&self.rule
	}

	/// Current state of every CS.
	#[must_use]
	pub const fn states(&self) -> &StimulusMap {
		&self.states
	}

	/// Current state of one CS.
	#[must_use]
	pub fn state(&self, stimulus: char) -> Option<&StimulusState> {
		self.states.get(&stimulus)
	}

	/// Run a parsed phase, shuffling it `repeats` times if it is randomized.
	///
	/// # Errors
	///
	/// Propagates the first error of any trial.
	pub fn run<R: Rng + ?Sized>(
		&mut self,
		phase: &Phase,
		repeats: usize,
		rng: &mut R,
	) -> Result<PhaseHistory> {
		if phase.randomized {
			self.run_randomized_phase(phase, repeats, rng)
		} else {
			self.run_phase(&phase.trials, phase.lamda)
		}
	}

	/// Run `trials` in order.
	///
	/// # Errors
	///
	/// Returns [`SimError::UnknownStimulus`] for a CS the group does not know,
	/// [`SimError::NumericOverflow`] if a step diverges, or (debug builds)
	/// [`SimError::InvariantViolation`].
	#[instrument(skip_all, fields(group = %self.name, trials = trials.len()))]
	pub fn run_phase(&mut self, trials: &[Trial], phase_lamda: Option<f64>) -> Result<PhaseHistory> {
		let mut history = PhaseHistory::new();

		for (index, trial) in trials.iter().enumerate() {
			self.run_trial(trial, phase_lamda, index + 1, &mut history)?;
		}

		debug!(stimuli = history.len(), "phase complete");
		Ok(history)
	}

	/// Advance every CS of one trial and append their records to `history`.
	///
	/// # Errors
	///
	/// As [`Group::run_phase`].
	pub fn run_trial(
		&mut self,
		trial: &Trial,
		phase_lamda: Option<f64>,
		count: usize,
		history: &mut PhaseHistory,
	) -> Result<()> {
		let ctx = aggregate(
			&self.states,
			trial,
			self.rule.hyperparameters(),
			phase_lamda,
			count,
		)?;
		trace!(%trial, count, sigma = ctx.sigma, "trial");

		for &cs in &trial.compound {
			let state = self
				.states
				.get_mut(&cs)
				.ok_or(SimError::UnknownStimulus(cs))?;
			let series = history
				.entry(cs)
				.or_insert_with(|| StimulusHistory::new(state.record()));

			let previous_assoc = state.assoc;
			let baseline = state.baseline();
			self.rule.run_step(cs, state, &baseline, &ctx)?;

			if let Some(capacity) = self.window_size {
				state.push_window(capacity, previous_assoc);
			}
			if cfg!(debug_assertions) {
				self.rule.check_invariants(cs, state)?;
			}

			series.push(state.record());
		}

		Ok(())
	}

	/// Replay a randomized phase `repeats` times from the current states.
	///
	/// Each run starts from the same states with a fresh shuffle. Returns the
	/// index-wise mean series; the group keeps the mean final states.
	///
	/// # Errors
	///
	/// As [`Group::run_phase`]. On error the group's states are unspecified.
	#[instrument(skip_all, fields(group = %self.name, repeats = repeats))]
	pub fn run_randomized_phase<R: Rng + ?Sized>(
		&mut self,
		phase: &Phase,
		repeats: usize,
		rng: &mut R,
	) -> Result<PhaseHistory> {
		let initial = self.states.clone();
		let repeats = repeats.max(1);
		let mut order = phase.trials.clone();
		let mut runs = Vec::with_capacity(repeats);
		let mut finals = Vec::with_capacity(repeats);

		for _ in 0..repeats {
			order.shuffle(rng);
			self.states = initial.clone();
			runs.push(self.run_phase(&order, phase.lamda)?);
			finals.push(std::mem::take(&mut self.states));
		}

		self.states = mean_states(&initial, &finals);
		debug!(runs = runs.len(), "randomized phase complete");
		Ok(mean_phase(&runs))
	}
}

/// Field-wise mean state of each CS over several runs.
fn mean_states(initial: &StimulusMap, finals: &[StimulusMap]) -> StimulusMap {
	initial
		.iter()
		.map(|(&cs, start)| {
			let states: Vec<StimulusState> =
				finals.iter().filter_map(|m| m.get(&cs)).cloned().collect();
			let mean = StimulusState::mean(&states).unwrap_or_else(|| start.clone());
			(cs, mean)
		})
		.collect()
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
	use super::*;
	use crate::rules::RuleKind;
	use crate::trial::Outcome;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	fn group(kind: RuleKind, stimuli: &str, window_size: Option<usize>) -> Group {
		let overrides = ParameterOverrides {
			xi_hall: Some(0.2),
			..ParameterOverrides::default()
		};
		let (rule, params) = LearningRule::configure(kind.name(), &overrides).expect("valid rule");
		Group::new("G", rule, &params, &overrides, stimuli.chars(), window_size)
	}

	fn phase(text: &str) -> Phase {
		Phase::parse(text).expect("valid phase")
	}

	#[test]
	fn test_absent_stimulus_untouched() {
		let mut g = group(RuleKind::RescorlaWagner, "AB", None);
		let before = g.state('B').cloned();
		let history = g.run_phase(&phase("5A+").trials, None).expect("phase runs");

		assert_eq!(g.state('B').cloned(), before);
		assert!(!history.contains_key(&'B'));
		assert_eq!(history[&'A'].trials.len(), 5);
		assert_eq!(history[&'A'].initial.assoc, 0.0);
	}

	#[test]
	fn test_compound_members_read_pre_trial_sigma() {
		let mut g = group(RuleKind::RescorlaWagner, "AB", None);
		let _ = g.run_phase(&phase("AB+").trials, None).expect("phase runs");

		// Both learn against sigma = 0, not against A's fresh increment
		let a = g.state('A').map(|s| s.assoc);
		let b = g.state('B').map(|s| s.assoc);
		assert_eq!(a, Some(0.1 * 0.3));
		assert_eq!(a, b);
	}

	#[test]
	fn test_unknown_stimulus_fails() {
		let mut g = group(RuleKind::RescorlaWagner, "A", None);
		let result = g.run_phase(&phase("AB+").trials, None);
		assert_eq!(result, Err(SimError::UnknownStimulus('B')));
	}

	#[test]
	fn test_phase_lamda_applies() {
		let mut g = group(RuleKind::RescorlaWagner, "A", None);
		let p = phase("lamda=0.5/A+");
		let _ = g.run_phase(&p.trials, p.lamda).expect("phase runs");
		let assoc = g.state('A').map_or(f64::NAN, |s| s.assoc);
		assert!((assoc - 0.1 * 0.3 * 0.5).abs() < 1e-12);
	}

	#[test]
	fn test_window_feeds_surprise() {
		let mut g = group(RuleKind::RescorlaWagner, "A", Some(3));
		let _ = g.run_phase(&phase("A+").trials, None).expect("phase runs");
		let state = g.state('A').expect("known stimulus");
		// Window holds only the new value: mean - previous = assoc - 0
		assert_eq!(state.delta_ma_hall, Some(state.assoc));

		let mut g = group(RuleKind::RescorlaWagner, "A", None);
		let _ = g.run_phase(&phase("A+").trials, None).expect("phase runs");
		assert_eq!(g.state('A').and_then(|s| s.delta_ma_hall), None);
	}

	#[test]
	fn test_zero_window_disabled() {
		let mut g = group(RuleKind::RescorlaWagner, "A", Some(0));
		let _ = g.run_phase(&phase("2A+").trials, None).expect("phase runs");
		assert_eq!(g.state('A').and_then(|s| s.delta_ma_hall), None);
	}

	#[test]
	fn test_randomized_phase_restarts_each_run() {
		let mut g = group(RuleKind::RescorlaWagner, "AB", None);
		let mut rng = StdRng::seed_from_u64(3);
		let history = g
			.run_randomized_phase(&phase("rand/4A+/4B-"), 10, &mut rng)
			.expect("phase runs");

		// Each run starts from zero; A is only ever reinforced
		assert_eq!(history[&'A'].initial.assoc, 0.0);
		assert_eq!(history[&'A'].trials.len(), 4);
		assert!(history[&'A'].trials.iter().all(|r| r.assoc > 0.0));

		// A alone, reinforced four times, whatever the order
		let expected = 1.0 - (1.0f64 - 0.03).powi(4);
		let assoc = g.state('A').map_or(f64::NAN, |s| s.assoc);
		assert!((assoc - expected).abs() < 1e-12);
	}

	#[test]
	fn test_randomized_phase_is_seeded() {
		let run = |seed| {
			let mut g = group(RuleKind::LePelley, "ABC", None);
			let mut rng = StdRng::seed_from_u64(seed);
			g.run_randomized_phase(&phase("rand/3AB+/3AC-/2B+"), 5, &mut rng)
				.expect("phase runs")
		};
		assert_eq!(run(42), run(42));
	}

	#[test]
	fn test_run_dispatches_on_randomized() {
		let mut rng = StdRng::seed_from_u64(1);
		let mut g = group(RuleKind::RescorlaWagner, "A", None);
		let history = g.run(&phase("3A+"), 50, &mut rng).expect("phase runs");
		assert_eq!(history[&'A'].trials.len(), 3);

		let trial = Trial::new(['A'], Outcome::Reinforced);
		assert_eq!(phase("3A+").trials, vec![trial; 3]);
	}

	#[test]
	fn test_overflow_propagates() {
		let mut g = group(RuleKind::PearceHall, "A", None);
		// |lamda - sigma| * lamda leaves the f64 range on the first trial
		let result = g.run_phase(&phase("A+").trials, Some(1e300));
		assert!(matches!(result, Err(SimError::NumericOverflow { stimulus: 'A', .. })));
	}

	#[test]
	fn test_hybrid_habituation_converges() {
		for kind in [RuleKind::Hybrid, RuleKind::HybridFix] {
			let mut g = group(kind, "A", None);
			let _ = g.run_phase(&phase("100A+").trials, None).expect("phase runs");
			let a = g.state('A').expect("A");

			assert!(a.is_finite(), "{kind}: {a:?}");
			// (habituation_0 - salience_0) / (1 - salience_0)
			assert!((a.habituation - 0.98).abs() < 1e-9, "{kind}: {a:?}");
			assert!(a.assoc.abs() < 2.0, "{kind}: {a:?}");
			assert_eq!(a.baseline().habituation, 0.99);
		}
	}
}
