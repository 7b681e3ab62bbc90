//! Parameter Vocabulary and Layered Configuration
//!
//! Every rule draws its constants from one fixed vocabulary. Values are
//! resolved once per run, in three layers:
//!
//! ```text
//! global defaults  <  rule defaults  <  caller overrides
//! ```
//!
//! The result is a plain [`Parameters`] record. The rule keeps only the
//! [`Hyperparameters`] subset; the per-stimulus fields seed each
//! [`StimulusState`](crate::stimulus::StimulusState).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::rules::RuleKind;

/// A name from the global parameter vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
	/// Initial attentional weight
	Alpha,
	/// Initial Mackintosh component of alpha
	AlphaMack,
	/// Initial Hall component of alpha
	AlphaHall,
	/// Learning rate on reinforced trials
	Beta,
	/// Learning rate on non-reinforced trials
	Betan,
	/// Asymptote of learning
	Lamda,
	/// Weight of recent surprise in Pearce-Kaye-Hall style updates
	Gamma,
	/// LePelley excitatory attention rate
	#[serde(rename = "thetaE")]
	ThetaE,
	/// LePelley inhibitory attention rate
	#[serde(rename = "thetaI")]
	ThetaI,
	/// Stimulus salience
	Salience,
	/// Habituation carried by hybrid rules
	Habituation,
	/// Hybrid rule constant copied onto state
	Rho,
	/// Hybrid rule constant copied onto state
	Nu,
}

impl Param {
	/// The full vocabulary, in display order.
	pub const ALL: [Self; 13] = [
		Self::Alpha,
		Self::AlphaMack,
		Self::AlphaHall,
		Self::Beta,
		Self::Betan,
		Self::Lamda,
		Self::Gamma,
		Self::ThetaE,
		Self::ThetaI,
		Self::Salience,
		Self::Habituation,
		Self::Rho,
		Self::Nu,
	];

	/// Name used on the command line and in rule declarations.
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Alpha => "alpha",
			Self::AlphaMack => "alpha_mack",
			Self::AlphaHall => "alpha_hall",
			Self::Beta => "beta",
			Self::Betan => "betan",
			Self::Lamda => "lamda",
			Self::Gamma => "gamma",
			Self::ThetaE => "thetaE",
			Self::ThetaI => "thetaI",
			Self::Salience => "salience",
			Self::Habituation => "habituation",
			Self::Rho => "rho",
			Self::Nu => "nu",
		}
	}

	/// Whether the parameter may be set separately for each CS.
	#[must_use]
	pub const fn is_per_stimulus(self) -> bool {
		matches!(
			self,
			Self::Alpha | Self::AlphaMack | Self::AlphaHall | Self::Salience
		)
	}
}

impl fmt::Display for Param {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Param {
	type Err = SimError;

	fn from_str(s: &str) -> Result<Self> {
		let s = s.trim();
		match s {
			"lambda" => return Ok(Self::Lamda),
			"beta_neg" => return Ok(Self::Betan),
			_ => {}
		}

		Self::ALL
			.into_iter()
			.find(|p| p.name() == s)
			.ok_or_else(|| SimError::UnknownParameter(s.to_owned()))
	}
}

/// Fully resolved parameter values for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
	/// Initial attentional weight
	pub alpha: f64,
	/// Initial Mackintosh component of alpha
	pub alpha_mack: f64,
	/// Initial Hall component of alpha
	pub alpha_hall: f64,
	/// Learning rate on reinforced trials (`betap`)
	pub beta: f64,
	/// Learning rate on non-reinforced trials
	pub betan: f64,
	/// Asymptote of learning
	pub lamda: f64,
	/// Surprise weighting
	pub gamma: f64,
	/// LePelley excitatory attention rate
	pub theta_e: f64,
	/// LePelley inhibitory attention rate
	pub theta_i: f64,
	/// Stimulus salience
	pub salience: f64,
	/// Initial habituation
	pub habituation: f64,
	/// Hybrid constant
	pub rho: f64,
	/// Hybrid constant
	pub nu: f64,
	/// Hall error term; no global default
	pub xi_hall: Option<f64>,
}

impl Default for Parameters {
	fn default() -> Self {
		Self {
			alpha: 0.1,
			alpha_mack: 0.1,
			alpha_hall: 0.1,
			beta: 0.3,
			betan: 0.2,
			lamda: 1.0,
			gamma: 0.5,
			theta_e: 0.3,
			theta_i: 0.1,
			salience: 0.5,
			habituation: 0.99,
			rho: 0.2,
			nu: 0.25,
			xi_hall: None,
		}
	}
}

impl Parameters {
	/// Resolve the three configuration layers for `kind`.
	#[must_use]
	pub fn resolve(kind: RuleKind, overrides: &ParameterOverrides) -> Self {
		let mut params = Self::default();

		for &(param, value) in kind.defaults() {
			params.set(param, value);
		}

		for (&param, &value) in &overrides.values {
			params.set(param, value);
		}
		if overrides.xi_hall.is_some() {
			params.xi_hall = overrides.xi_hall;
		}

		params
	}

	/// Read a vocabulary value.
	#[must_use]
	pub const fn get(&self, param: Param) -> f64 {
		match param {
			Param::Alpha => self.alpha,
			Param::AlphaMack => self.alpha_mack,
			Param::AlphaHall => self.alpha_hall,
			Param::Beta => self.beta,
			Param::Betan => self.betan,
			Param::Lamda => self.lamda,
			Param::Gamma => self.gamma,
			Param::ThetaE => self.theta_e,
			Param::ThetaI => self.theta_i,
			Param::Salience => self.salience,
			Param::Habituation => self.habituation,
			Param::Rho => self.rho,
			Param::Nu => self.nu,
		}
	}

	/// Overwrite a vocabulary value.
	pub fn set(&mut self, param: Param, value: f64) {
		let slot = match param {
			Param::Alpha => &mut self.alpha,
			Param::AlphaMack => &mut self.alpha_mack,
			Param::AlphaHall => &mut self.alpha_hall,
			Param::Beta => &mut self.beta,
			Param::Betan => &mut self.betan,
			Param::Lamda => &mut self.lamda,
			Param::Gamma => &mut self.gamma,
			Param::ThetaE => &mut self.theta_e,
			Param::ThetaI => &mut self.theta_i,
			Param::Salience => &mut self.salience,
			Param::Habituation => &mut self.habituation,
			Param::Rho => &mut self.rho,
			Param::Nu => &mut self.nu,
		};
		*slot = value;
	}

	/// The read-only subset a rule holds.
	#[must_use]
	pub const fn hyperparameters(&self) -> Hyperparameters {
		Hyperparameters {
			betan: self.betan,
			betap: self.beta,
			lamda: self.lamda,
			xi_hall: self.xi_hall,
			gamma: self.gamma,
			theta_e: self.theta_e,
			theta_i: self.theta_i,
		}
	}
}

/// Caller-supplied values, the top configuration layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
	/// Values applied to every CS
	pub values: BTreeMap<Param, f64>,
	/// Hall error term
	pub xi_hall: Option<f64>,
	/// Initial values for individual CS
	pub per_stimulus: BTreeMap<char, BTreeMap<Param, f64>>,
}

impl ParameterOverrides {
	/// Override a value for every CS.
	pub fn set(&mut self, param: Param, value: f64) -> &mut Self {
		let _ = self.values.insert(param, value);
		self
	}

	/// Override a value by vocabulary name.
	///
	/// # Errors
	///
	/// Returns [`SimError::UnknownParameter`] if `name` is not in the vocabulary.
	pub fn set_named(&mut self, name: &str, value: f64) -> Result<&mut Self> {
		let param = name.parse()?;
		Ok(self.set(param, value))
	}

	/// Override the initial value of `param` for a single CS.
	///
	/// # Errors
	///
	/// Returns [`SimError::UnknownParameter`] if `param` cannot vary per CS.
	pub fn set_for(&mut self, stimulus: char, param: Param, value: f64) -> Result<&mut Self> {
		if !param.is_per_stimulus() {
			return Err(SimError::UnknownParameter(format!("{param}_{stimulus}")));
		}

		let _ = self
			.per_stimulus
			.entry(stimulus)
			.or_default()
			.insert(param, value);
		Ok(self)
	}

	/// Initial value of `param` for `stimulus`, if one was given.
	#[must_use]
	pub fn for_stimulus(&self, stimulus: char, param: Param) -> Option<f64> {
		self.per_stimulus
			.get(&stimulus)
			.and_then(|values| values.get(&param))
			.copied()
	}
}

/// Rule constants, immutable once a rule is built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
	/// Learning rate on non-reinforced trials
	pub betan: f64,
	/// Learning rate on reinforced trials
	pub betap: f64,
	/// Default asymptote of reinforced trials
	pub lamda: f64,
	/// Hall error term
	pub xi_hall: Option<f64>,
	/// Surprise weighting
	pub gamma: f64,
	/// LePelley excitatory attention rate
	pub theta_e: f64,
	/// LePelley inhibitory attention rate
	pub theta_i: f64,
}

impl Default for Hyperparameters {
	fn default() -> Self {
		Parameters::default().hyperparameters()
	}
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
	use super::*;

	#[test]
	fn test_param_names_roundtrip() {
		for param in Param::ALL {
			assert_eq!(param.name().parse::<Param>(), Ok(param));
		}
		assert_eq!("lambda".parse::<Param>(), Ok(Param::Lamda));
		assert!(matches!(
			"sigma".parse::<Param>(),
			Err(SimError::UnknownParameter(_))
		));
	}

	#[test]
	fn test_global_defaults() {
		let params = Parameters::resolve(RuleKind::RescorlaWagner, &ParameterOverrides::default());
		assert_eq!(params.alpha, 0.1);
		assert_eq!(params.beta, 0.3);
		assert_eq!(params.betan, 0.2);
		assert_eq!(params.lamda, 1.0);
		assert_eq!(params.xi_hall, None);
	}

	#[test]
	fn test_rule_defaults_over_global() {
		let params = Parameters::resolve(RuleKind::LePelleyHybrid, &ParameterOverrides::default());
		assert_eq!(params.alpha_mack, 0.9);
		assert_eq!(params.alpha_hall, 0.9);
		// Untouched by the rule layer
		assert_eq!(params.alpha, 0.1);
	}

	#[test]
	fn test_caller_over_rule_defaults() {
		let mut overrides = ParameterOverrides::default();
		let _ = overrides.set(Param::AlphaHall, 0.6).set(Param::Beta, 0.5);

		let params = Parameters::resolve(RuleKind::Hybrid, &overrides);
		assert_eq!(params.alpha_hall, 0.6);
		assert_eq!(params.beta, 0.5);
		// Rule default still applies where the caller is silent
		assert_eq!(params.alpha_mack, 0.1);
	}

	#[test]
	fn test_hyperparameters_map_beta_to_betap() {
		let mut overrides = ParameterOverrides::default();
		let _ = overrides.set(Param::Beta, 0.7);
		overrides.xi_hall = Some(0.2);

		let hyper = Parameters::resolve(RuleKind::Hall, &overrides).hyperparameters();
		assert_eq!(hyper.betap, 0.7);
		assert_eq!(hyper.betan, 0.2);
		assert_eq!(hyper.xi_hall, Some(0.2));
	}

	#[test]
	fn test_per_stimulus_overrides() {
		let mut overrides = ParameterOverrides::default();
		assert!(overrides.set_for('A', Param::Alpha, 0.4).is_ok());
		assert!(overrides.set_for('A', Param::Beta, 0.4).is_err());

		assert_eq!(overrides.for_stimulus('A', Param::Alpha), Some(0.4));
		assert_eq!(overrides.for_stimulus('B', Param::Alpha), None);
	}
}
