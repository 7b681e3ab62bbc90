//! Output Series
//!
//! Every phase yields, per CS, the state it entered the phase with followed by
//! one [`StimulusRecord`] per trial it took part in. A [`HistoryRecorder`]
//! gathers these across experiments under `"{experiment} - {cs}"` labels so
//! that a plot of phase *n* can draw every group side by side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stimulus::StimulusRecord;

/// Series of one CS over one phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusHistory {
	/// State when the CS first appeared in the phase
	pub initial: StimulusRecord,
	/// One record per trial the CS took part in
	pub trials: Vec<StimulusRecord>,
}

/// Per-CS series of one group over one phase.
pub type PhaseHistory = BTreeMap<char, StimulusHistory>;

impl StimulusHistory {
	/// Start a series at `initial`.
	#[must_use]
	pub const fn new(initial: StimulusRecord) -> Self {
		Self {
			initial,
			trials: Vec::new(),
		}
	}

	/// Append the post-trial record.
	pub fn push(&mut self, record: StimulusRecord) {
		self.trials.push(record);
	}

	/// `initial` followed by every trial record.
	pub fn records(&self) -> impl Iterator<Item = &StimulusRecord> + '_ {
		std::iter::once(&self.initial).chain(&self.trials)
	}

	/// One field across [`StimulusHistory::records`].
	#[must_use]
	pub fn series(&self, field: impl Fn(&StimulusRecord) -> f64) -> Vec<f64> {
		self.records().map(field).collect()
	}

	/// Last recorded state.
	#[must_use]
	pub fn last(&self) -> &StimulusRecord {
		self.trials.last().unwrap_or(&self.initial)
	}

	/// Index-wise mean of several runs of the same phase.
	///
	/// Runs of unequal length are averaged over the runs that reach each index.
	#[must_use]
	pub fn mean(histories: &[Self]) -> Option<Self> {
		let initials: Vec<StimulusRecord> = histories.iter().map(|h| h.initial).collect();
		let initial = StimulusRecord::mean(&initials)?;

		let longest = histories.iter().map(|h| h.trials.len()).max().unwrap_or(0);
		let trials = (0..longest)
			.filter_map(|i| {
				let at: Vec<StimulusRecord> =
					histories.iter().filter_map(|h| h.trials.get(i)).copied().collect();
				StimulusRecord::mean(&at)
			})
			.collect();

		Some(Self { initial, trials })
	}
}

/// Average the same phase over several randomized runs, CS by CS.
#[must_use]
pub fn mean_phase(runs: &[PhaseHistory]) -> PhaseHistory {
	let mut by_stimulus: BTreeMap<char, Vec<StimulusHistory>> = BTreeMap::new();
	for run in runs {
		for (&cs, history) in run {
			by_stimulus.entry(cs).or_default().push(history.clone());
		}
	}

	by_stimulus
		.into_iter()
		.filter_map(|(cs, histories)| StimulusHistory::mean(&histories).map(|h| (cs, h)))
		.collect()
}

/// Label of one CS of one experiment in the merged output.
#[must_use]
pub fn label(experiment: &str, stimulus: char) -> String {
	format!("{experiment} - {stimulus}")
}

/// Per-phase series of every experiment, keyed by label.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecorder {
	phases: Vec<BTreeMap<String, StimulusHistory>>,
}

impl HistoryRecorder {
	/// An empty recorder.
	#[must_use]
	pub const fn new() -> Self {
		Self { phases: Vec::new() }
	}

	/// Store one series. Phases are created on demand; an equal label is replaced.
	pub fn record(&mut self, phase: usize, label: String, history: StimulusHistory) {
		if self.phases.len() <= phase {
			self.phases.resize_with(phase + 1, BTreeMap::new);
		}
		let _ = self.phases[phase].insert(label, history);
	}

	/// Store every phase of one experiment.
	pub fn record_experiment(&mut self, experiment: &str, phases: Vec<PhaseHistory>) {
		for (index, phase) in phases.into_iter().enumerate() {
			if self.phases.len() <= index {
				self.phases.resize_with(index + 1, BTreeMap::new);
			}
			for (cs, history) in phase {
				self.record(index, label(experiment, cs), history);
			}
		}
	}

	/// Union with `other`, phase by phase. Labels from `other` win.
	pub fn merge(&mut self, other: Self) {
		for (index, phase) in other.phases.into_iter().enumerate() {
			if self.phases.len() <= index {
				self.phases.resize_with(index + 1, BTreeMap::new);
			}
			self.phases[index].extend(phase);
		}
	}

	/// Keep only labels whose CS is in `stimuli`.
	pub fn retain_stimuli(&mut self, stimuli: &[char]) {
		for phase in &mut self.phases {
			phase.retain(|label, _| {
				label
					.rsplit(" - ")
					.next()
					.and_then(|cs| cs.chars().next())
					.is_some_and(|cs| stimuli.contains(&cs))
			});
		}
	}

	/// Series of every phase, in phase order.
	#[must_use]
	pub fn phases(&self) -> &[BTreeMap<String, StimulusHistory>] {
		&self.phases
	}

	/// Series of one label in one phase.
	#[must_use]
	pub fn series(&self, phase: usize, label: &str) -> Option<&StimulusHistory> {
		self.phases.get(phase)?.get(label)
	}

	/// Whether nothing was recorded.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.phases.iter().all(BTreeMap::is_empty)
	}
}
