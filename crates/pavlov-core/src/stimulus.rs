//! Per-Stimulus State
//!
//! Each conditioned stimulus carries one [`StimulusState`] for the whole
//! lifetime of a group run. Rules mutate it in place. The [`Baseline`]
//! holds the values the CS started with; hybrid equations that decay toward
//! them read the baseline, never the live field.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::params::{Param, ParameterOverrides, Parameters};

/// Mutable learning state of one CS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StimulusState {
	/// Net associative strength
	pub assoc: f64,
	/// Attentional weight
	pub alpha: f64,
	/// Mackintosh component of alpha
	pub alpha_mack: f64,
	/// Hall component of alpha
	pub alpha_hall: f64,
	/// Excitatory strength
	pub ve: f64,
	/// Inhibitory strength
	pub vi: f64,
	/// Habituation (hybrid rules)
	pub habituation: f64,
	/// Salience
	pub salience: f64,
	/// Hybrid constant
	pub nu: f64,
	/// Hybrid constant
	pub rho: f64,
	/// Moving-average surprise, written by the phase runner
	pub delta_ma_hall: Option<f64>,
	/// Starting values the `_0` terms refer to
	pub initial: Baseline,
	/// Recent `assoc` values backing `delta_ma_hall`
	#[serde(skip)]
	pub(crate) window: VecDeque<f64>,
}

/// Starting values of the fields a hybrid step both reads and overwrites.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
	/// `habituation_0`
	pub habituation: f64,
	/// `salience_0`
	pub salience: f64,
	/// `alpha_hall_0`
	pub alpha_hall: f64,
}

/// The plotted tuple for one CS at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusRecord {
	/// Net associative strength
	pub assoc: f64,
	/// Attentional weight
	pub alpha: f64,
	/// Mackintosh component of alpha
	pub alpha_mack: f64,
	/// Hall component of alpha
	pub alpha_hall: f64,
}

impl StimulusState {
	/// Initial state of `stimulus`, honouring per-CS overrides.
	#[must_use]
	pub fn new(stimulus: char, params: &Parameters, overrides: &ParameterOverrides) -> Self {
		let initial = |param: Param| {
			overrides
				.for_stimulus(stimulus, param)
				.unwrap_or_else(|| params.get(param))
		};

		let alpha_hall = initial(Param::AlphaHall);
		let salience = initial(Param::Salience);

		Self {
			assoc: 0.0,
			alpha: initial(Param::Alpha),
			alpha_mack: initial(Param::AlphaMack),
			alpha_hall,
			ve: 0.0,
			vi: 0.0,
			habituation: params.habituation,
			salience,
			nu: params.nu,
			rho: params.rho,
			delta_ma_hall: None,
			initial: Baseline {
				habituation: params.habituation,
				salience,
				alpha_hall,
			},
			window: VecDeque::new(),
		}
	}

	/// The fields rules reference with a `_0` suffix.
	///
	/// Fixed when the CS is created; later steps and phases never move it.
	#[inline]
	#[must_use]
	pub const fn baseline(&self) -> Baseline {
		self.initial
	}

	/// The plotted tuple for the current state.
	#[inline]
	#[must_use]
	pub const fn record(&self) -> StimulusRecord {
		StimulusRecord {
			assoc: self.assoc,
			alpha: self.alpha,
			alpha_mack: self.alpha_mack,
			alpha_hall: self.alpha_hall,
		}
	}

	/// Whether every numeric field is finite.
	#[must_use]
	pub fn is_finite(&self) -> bool {
		[
			self.assoc,
			self.alpha,
			self.alpha_mack,
			self.alpha_hall,
			self.ve,
			self.vi,
			self.habituation,
			self.salience,
		]
		.iter()
		.all(|x| x.is_finite())
	}

	/// Push the post-step `assoc` into the sliding window and refresh `delta_ma_hall`.
	///
	/// `delta_ma_hall = mean(window) - previous_assoc`
	pub(crate) fn push_window(&mut self, capacity: usize, previous_assoc: f64) {
		if self.window.len() >= capacity {
			let _ = self.window.pop_front();
		}
		self.window.push_back(self.assoc);

		#[allow(clippy::cast_precision_loss)]
		let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;
		self.delta_ma_hall = Some(mean - previous_assoc);
	}

	/// Field-wise mean of several states of the same CS.
	///
	/// The sliding window is taken from the first state. Returns `None` for
	/// an empty slice.
	#[must_use]
	pub fn mean(states: &[Self]) -> Option<Self> {
		let first = states.first()?;
		#[allow(clippy::cast_precision_loss)]
		let n = states.len() as f64;
		let avg = |field: fn(&Self) -> f64| states.iter().map(field).sum::<f64>() / n;

		let surprises: Vec<f64> = states.iter().filter_map(|s| s.delta_ma_hall).collect();
		#[allow(clippy::cast_precision_loss)]
		let delta_ma_hall = (!surprises.is_empty())
			.then(|| surprises.iter().sum::<f64>() / surprises.len() as f64);

		Some(Self {
			assoc: avg(|s| s.assoc),
			alpha: avg(|s| s.alpha),
			alpha_mack: avg(|s| s.alpha_mack),
			alpha_hall: avg(|s| s.alpha_hall),
			ve: avg(|s| s.ve),
			vi: avg(|s| s.vi),
			habituation: avg(|s| s.habituation),
			salience: avg(|s| s.salience),
			nu: avg(|s| s.nu),
			rho: avg(|s| s.rho),
			delta_ma_hall,
			initial: first.initial,
			window: first.window.clone(),
		})
	}
}

impl StimulusRecord {
	/// Field-wise mean. Returns `None` for an empty slice.
	#[must_use]
	pub fn mean(records: &[Self]) -> Option<Self> {
		if records.is_empty() {
			return None;
		}

		#[allow(clippy::cast_precision_loss)]
		let n = records.len() as f64;
		let sum = records.iter().fold(Self::default(), |acc, r| Self {
			assoc: acc.assoc + r.assoc,
			alpha: acc.alpha + r.alpha,
			alpha_mack: acc.alpha_mack + r.alpha_mack,
			alpha_hall: acc.alpha_hall + r.alpha_hall,
		});

		Some(Self {
			assoc: sum.assoc / n,
			alpha: sum.alpha / n,
			alpha_mack: sum.alpha_mack / n,
			alpha_hall: sum.alpha_hall / n,
		})
	}
}
