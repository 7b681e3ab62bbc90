//! Learning Rules
//!
//! The closed family of associative update laws. Every rule consumes the
//! same inputs: one CS's [`StimulusState`], its pre-step [`Baseline`], and the
//! shared [`TrialContext`] of the trial. The common error term is
//!
//! ```text
//! ΔV factor = β (λ - Σ V)
//! ```
//!
//! and the split rules (Pearce-Kaye-Hall, LePelley and relatives) route
//! learning into separate excitatory and inhibitory strengths using
//!
//! ```text
//! ρ = λ - (ΣVe - ΣVi)        assoc = Ve - Vi
//! ```
//!
//! Rules are selected by name from [`RuleKind`]. A [`LearningRule`] is just a
//! kind plus immutable [`Hyperparameters`]; it holds no per-trial state.
//!
//! ## References
//!
//! - Rescorla, R. A. & Wagner, A. R. (1972). *A theory of Pavlovian conditioning*
//! - Pearce, J. M. & Hall, G. (1980). *A model for Pavlovian learning*
//! - Kaye, H. & Pearce, J. M. (1984). *The strength of the orienting response*
//! - Le Pelley, M. E. (2004). *The role of associative history in models of
//!   associative learning*
//! - Mackintosh, N. J. (1975). *A theory of attention*

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{Result, SimError};
use crate::params::{Hyperparameters, Param, ParameterOverrides, Parameters};
use crate::stimulus::{Baseline, StimulusState};
use crate::trial::TrialContext;

/// Lower clamp of alpha (and `alpha_mack`) for attention rules.
pub const ALPHA_FLOOR: f64 = 0.05;
/// Lower clamp of `alpha_hall` in the LePelley hybrid.
pub const ALPHA_HALL_FLOOR: f64 = 0.5;
/// Per-trial multiplicative drift of the linear Rescorla-Wagner alpha.
pub const LINEAR_DRIFT: f64 = 0.05;
/// Exponent of the exponential Rescorla-Wagner alpha drift.
pub const EXPONENTIAL_DRIFT: f64 = 0.05;
/// Weight of the current surprise in the Hall alpha.
pub const HALL_SURPRISE_WEIGHT: f64 = 0.99;

/// Tolerance of the `assoc == Ve - Vi` identity.
const SPLIT_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Registry
// ============================================================================

/// Every registered learning rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
	/// Fixed-alpha Rescorla-Wagner
	RescorlaWagner,
	/// Rescorla-Wagner with alpha drifting ±5% per trial
	RescorlaWagnerLinear,
	/// Rescorla-Wagner with alpha drifting by a power of itself on reinforced trials
	RescorlaWagnerExponential,
	/// Pearce-Hall, alpha equal to the last absolute error
	PearceHall,
	/// Pearce-Kaye-Hall with split excitatory/inhibitory strengths
	PearceKayeHall,
	/// LePelley attention with counterfactual prediction
	LePelley,
	/// LePelley with alpha factored into Mack and Hall components
	LePelleyHybrid,
	/// Mackintosh-style alpha
	Mack,
	/// Hall-style alpha
	Hall,
	/// Mack and Hall alphas combined
	MackHall,
	/// Pearce-Kaye-Hall with surprise-driven gamma
	DualV,
	/// Split strengths with a Mackintosh alpha
	DualMack,
	/// Habituation-driven hybrid, additive composition
	Hybrid,
	/// Habituation-driven hybrid, multiplicative composition
	HybridFix,
}

/// A field a rule keeps inside a fixed range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClampedField {
	/// `alpha`
	Alpha,
	/// `alpha_mack`
	AlphaMack,
	/// `alpha_hall`
	AlphaHall,
}

impl ClampedField {
	/// Read the field from a state.
	#[must_use]
	pub const fn get(self, state: &StimulusState) -> f64 {
		match self {
			Self::Alpha => state.alpha,
			Self::AlphaMack => state.alpha_mack,
			Self::AlphaHall => state.alpha_hall,
		}
	}

	/// Vocabulary name of the field.
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Alpha => "alpha",
			Self::AlphaMack => "alpha_mack",
			Self::AlphaHall => "alpha_hall",
		}
	}
}

/// Closed range a rule guarantees for one field after every step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clamp {
	/// Clamped field
	pub field: ClampedField,
	/// Inclusive lower bound
	pub lo: f64,
	/// Inclusive upper bound
	pub hi: f64,
}

const ALPHA_CLAMPS: &[Clamp] = &[Clamp {
	field: ClampedField::Alpha,
	lo: ALPHA_FLOOR,
	hi: 1.0,
}];
const MACK_HALL_CLAMPS: &[Clamp] = &[
	Clamp {
		field: ClampedField::AlphaMack,
		lo: ALPHA_FLOOR,
		hi: 1.0,
	},
	Clamp {
		field: ClampedField::AlphaHall,
		lo: ALPHA_HALL_FLOOR,
		hi: 1.0,
	},
];

const RW_PARAMS: &[Param] = &[Param::Alpha, Param::Beta, Param::Betan, Param::Lamda];
const HYBRID_PARAMS: &[Param] = &[
	Param::AlphaMack,
	Param::AlphaHall,
	Param::Salience,
	Param::Habituation,
	Param::Lamda,
];
const HYBRID_DEFAULTS: &[(Param, f64)] = &[
	(Param::Salience, 0.5),
	(Param::Habituation, 0.99),
	(Param::AlphaMack, 0.1),
	(Param::AlphaHall, 0.3),
	(Param::Lamda, 1.0),
];

impl RuleKind {
	/// All registered rules, in menu order.
	pub const ALL: [Self; 14] = [
		Self::RescorlaWagner,
		Self::RescorlaWagnerLinear,
		Self::RescorlaWagnerExponential,
		Self::PearceHall,
		Self::PearceKayeHall,
		Self::LePelley,
		Self::LePelleyHybrid,
		Self::Mack,
		Self::Hall,
		Self::MackHall,
		Self::DualV,
		Self::DualMack,
		Self::Hybrid,
		Self::HybridFix,
	];

	/// Registry name.
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::RescorlaWagner => "Rescorla Wagner",
			Self::RescorlaWagnerLinear => "Rescorla Wagner Linear",
			Self::RescorlaWagnerExponential => "Rescorla Wagner Exponential",
			Self::PearceHall => "Pearce Hall",
			Self::PearceKayeHall => "Pearce Kaye Hall",
			Self::LePelley => "LePelley",
			Self::LePelleyHybrid => "LePelley Hybrid",
			Self::Mack => "Mack",
			Self::Hall => "Hall",
			Self::MackHall => "Mack Hall",
			Self::DualV => "Dual V",
			Self::DualMack => "Dual Mack",
			Self::Hybrid => "PALMS Hybrid",
			Self::HybridFix => "PALMS HybridFix",
		}
	}

	/// Vocabulary entries the rule reads.
	#[must_use]
	pub const fn parameters(self) -> &'static [Param] {
		match self {
			Self::RescorlaWagner
			| Self::RescorlaWagnerLinear
			| Self::RescorlaWagnerExponential
			| Self::Mack
			| Self::Hall
			| Self::MackHall
			| Self::DualV
			| Self::DualMack => RW_PARAMS,
			Self::PearceHall => &[Param::Alpha, Param::Lamda, Param::Salience],
			Self::PearceKayeHall => &[
				Param::Alpha,
				Param::Beta,
				Param::Betan,
				Param::Lamda,
				Param::Gamma,
			],
			Self::LePelley => &[
				Param::Alpha,
				Param::Beta,
				Param::Betan,
				Param::Lamda,
				Param::ThetaE,
				Param::ThetaI,
			],
			Self::LePelleyHybrid => &[
				Param::AlphaMack,
				Param::AlphaHall,
				Param::Beta,
				Param::Betan,
				Param::Lamda,
				Param::Gamma,
				Param::ThetaE,
				Param::ThetaI,
			],
			Self::Hybrid | Self::HybridFix => HYBRID_PARAMS,
		}
	}

	/// Rule-specific defaults, layered over the global ones.
	#[must_use]
	pub const fn defaults(self) -> &'static [(Param, f64)] {
		match self {
			Self::LePelleyHybrid => &[(Param::AlphaMack, 0.9), (Param::AlphaHall, 0.9)],
			Self::Hybrid | Self::HybridFix => HYBRID_DEFAULTS,
			_ => &[],
		}
	}

	/// Ranges the rule enforces after every step.
	#[must_use]
	pub const fn clamps(self) -> &'static [Clamp] {
		match self {
			Self::RescorlaWagnerLinear | Self::LePelley => ALPHA_CLAMPS,
			Self::LePelleyHybrid => MACK_HALL_CLAMPS,
			_ => &[],
		}
	}

	/// Whether the rule needs `xi_hall` to be set.
	#[must_use]
	pub const fn requires_xi_hall(self) -> bool {
		matches!(self, Self::Hall | Self::MackHall)
	}

	/// Whether the rule keeps `assoc = Ve - Vi`.
	#[must_use]
	pub const fn tracks_split_strength(self) -> bool {
		matches!(
			self,
			Self::PearceKayeHall
				| Self::LePelley
				| Self::LePelleyHybrid
				| Self::DualV
				| Self::DualMack
		)
	}

	/// Whether the Mack and Hall components are worth plotting separately.
	#[must_use]
	pub fn plots_mack_and_hall(self) -> bool {
		let params = self.parameters();
		params.contains(&Param::AlphaMack) && params.contains(&Param::AlphaHall)
	}
}

impl fmt::Display for RuleKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for RuleKind {
	type Err = SimError;

	fn from_str(s: &str) -> Result<Self> {
		let wanted = s.trim();
		Self::ALL
			.into_iter()
			.find(|kind| kind.name().eq_ignore_ascii_case(wanted))
			.ok_or_else(|| SimError::UnknownRule(wanted.to_owned()))
	}
}

// ============================================================================
// Rule
// ============================================================================

/// A registered rule bound to its hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningRule {
	kind: RuleKind,
	hyper: Hyperparameters,
}

impl LearningRule {
	/// Bind `kind` to `hyper`.
	///
	/// # Errors
	///
	/// Returns [`SimError::MissingParameter`] if the rule needs `xi_hall` and it is unset.
	pub const fn new(kind: RuleKind, hyper: Hyperparameters) -> Result<Self> {
		if kind.requires_xi_hall() && hyper.xi_hall.is_none() {
			return Err(SimError::MissingParameter {
				rule: kind.name(),
				parameter: "xi_hall",
			});
		}

		Ok(Self { kind, hyper })
	}

	/// Look up `name`, resolve its parameters and build the rule.
	///
	/// # Errors
	///
	/// Returns [`SimError::UnknownRule`] for names outside the registry, or
	/// [`SimError::MissingParameter`] as in [`LearningRule::new`].
	pub fn configure(name: &str, overrides: &ParameterOverrides) -> Result<(Self, Parameters)> {
		let kind: RuleKind = name.parse()?;
		let params = Parameters::resolve(kind, overrides);
		let rule = Self::new(kind, params.hyperparameters())?;
		Ok((rule, params))
	}

	/// The registered variant.
	#[must_use]
	pub const fn kind(&self) -> RuleKind {
		self.kind
	}

	/// The rule constants.
	#[must_use]
	pub const fn hyperparameters(&self) -> &Hyperparameters {
		&self.hyper
	}

	/// Apply one trial's update to one CS.
	///
	/// # Errors
	///
	/// Returns [`SimError::NumericOverflow`] if the update leaves a non-finite value
	/// in the state. The offending `(lamda, sigma)` pair is logged.
	pub fn run_step(
		&self,
		stimulus: char,
		state: &mut StimulusState,
		baseline: &Baseline,
		ctx: &TrialContext,
	) -> Result<()> {
		self.step(state, baseline, ctx);

		if state.is_finite() {
			return Ok(());
		}

		error!(
			rule = self.kind.name(),
			stimulus = %stimulus,
			lamda = ctx.lamda,
			sigma = ctx.sigma,
			"learning rule diverged"
		);
		Err(SimError::NumericOverflow {
			rule: self.kind.name(),
			stimulus,
			lamda: ctx.lamda,
			sigma: ctx.sigma,
		})
	}

	fn step(&self, s: &mut StimulusState, b: &Baseline, ctx: &TrialContext) {
		let h = &self.hyper;
		match self.kind {
			RuleKind::RescorlaWagner => s.assoc += s.alpha * ctx.delta_v_factor,
			RuleKind::RescorlaWagnerLinear => {
				s.alpha *= LINEAR_DRIFT.mul_add(f64::from(ctx.sign), 1.0);
				s.alpha = s.alpha.clamp(ALPHA_FLOOR, 1.0);
				s.assoc += s.alpha * ctx.delta_v_factor;
			}
			RuleKind::RescorlaWagnerExponential => {
				if ctx.sign == 1 {
					s.alpha *= s.alpha.powf(EXPONENTIAL_DRIFT);
				}
				s.assoc += s.alpha * ctx.delta_v_factor;
			}
			RuleKind::PearceHall => {
				s.alpha = (ctx.lamda - ctx.sigma).abs();
				s.assoc += s.salience * s.alpha * ctx.lamda.abs();
			}
			RuleKind::PearceKayeHall => pearce_kaye_hall(h, s, ctx, h.gamma),
			RuleKind::LePelley => le_pelley(h, s, ctx),
			RuleKind::LePelleyHybrid => le_pelley_hybrid(h, s, ctx),
			RuleKind::Mack => {
				s.alpha_mack = mack_alpha(s, ctx);
				s.alpha = s.alpha_mack;
				s.assoc = (s.assoc * ctx.delta_v_factor) + ctx.delta_v_factor / 2.0 * ctx.beta;
			}
			RuleKind::Hall => {
				s.alpha_hall = hall_alpha(s, ctx);
				s.alpha = s.alpha_hall;
				s.assoc += s.alpha * ctx.beta * (ctx.lamda - ctx.sigma);
			}
			RuleKind::MackHall => {
				s.alpha_mack = mack_alpha(s, ctx);
				s.alpha_hall = hall_alpha(s, ctx);
				s.alpha = (1.0 - (ctx.lamda - ctx.sigma).abs()).mul_add(s.alpha_mack, s.alpha_hall);
				s.assoc += s.alpha * ctx.delta_v_factor;
			}
			RuleKind::DualV => {
				let surprise = s.delta_ma_hall.unwrap_or(0.0);
				let gamma = 1.0 - (-surprise.powi(2)).exp();
				pearce_kaye_hall(h, s, ctx, gamma);
			}
			RuleKind::DualMack => dual_mack(h, s, ctx),
			RuleKind::Hybrid => {
				let dv = habituate(s, b, ctx);
				s.assoc += dv * s.alpha_mack;
			}
			RuleKind::HybridFix => {
				let dv = habituate(s, b, ctx);
				s.assoc = s.assoc.mul_add(s.alpha_mack, dv);
			}
		}
	}

	/// Verify the rule's guarantees on a freshly updated state.
	///
	/// # Errors
	///
	/// Returns [`SimError::InvariantViolation`] if a clamped field is out of range or
	/// a split rule's `assoc` disagrees with `Ve - Vi`.
	pub fn check_invariants(&self, stimulus: char, state: &StimulusState) -> Result<()> {
		let violation = |detail: String| SimError::InvariantViolation {
			rule: self.kind.name(),
			stimulus,
			detail,
		};

		for clamp in self.kind.clamps() {
			let value = clamp.field.get(state);
			if !(clamp.lo..=clamp.hi).contains(&value) {
				return Err(violation(format!(
					"{} = {value} outside [{}, {}]",
					clamp.field.name(),
					clamp.lo,
					clamp.hi
				)));
			}
		}

		if self.kind.tracks_split_strength() {
			let drift = (state.assoc - (state.ve - state.vi)).abs();
			let scale = state.ve.abs().max(state.vi.abs()).max(1.0);
			if drift > SPLIT_TOLERANCE * scale {
				return Err(violation(format!(
					"assoc = {} but Ve - Vi = {}",
					state.assoc,
					state.ve - state.vi
				)));
			}
		}

		Ok(())
	}
}

// ============================================================================
// Update laws
// ============================================================================

/// `α_mack = ½ (1 + 2V - ΣV)`
#[inline]
fn mack_alpha(s: &StimulusState, ctx: &TrialContext) -> f64 {
	0.5 * (1.0 + 2.0f64.mul_add(s.assoc, -ctx.sigma))
}

/// `α_hall = w |λ - ΣV| + (1 - w) α_hall`
#[inline]
fn hall_alpha(s: &StimulusState, ctx: &TrialContext) -> f64 {
	let surprise = (ctx.lamda - ctx.sigma).abs();
	HALL_SURPRISE_WEIGHT.mul_add(surprise, (1.0 - HALL_SURPRISE_WEIGHT) * s.alpha_hall)
}

fn pearce_kaye_hall(h: &Hyperparameters, s: &mut StimulusState, ctx: &TrialContext, gamma: f64) {
	let rho = ctx.rho();

	if rho >= 0.0 {
		s.ve += h.betap * s.alpha * ctx.lamda;
	} else {
		s.vi += h.betan * s.alpha * rho.abs();
	}

	s.alpha = gamma.mul_add(rho.abs(), (1.0 - gamma) * s.alpha);
	s.assoc = s.ve - s.vi;
}

fn le_pelley(h: &Hyperparameters, s: &mut StimulusState, ctx: &TrialContext) {
	let rho = ctx.rho();
	// Prediction of the rest of the compound, without this CS
	let vx_e = ctx.sigma_e - s.ve;
	let vx_i = ctx.sigma_i - s.vi;

	let mut dve = 0.0;
	let mut dvi = 0.0;
	if rho >= 0.0 {
		dve = s.alpha * h.betap * (1.0 - s.ve + s.vi) * rho.abs();
		if rho > 0.0 {
			s.alpha -= h.theta_e
				* ((ctx.lamda - s.ve + s.vi).abs() - (ctx.lamda - vx_e + vx_i).abs());
		}
	} else {
		dvi = s.alpha * h.betan * (1.0 - s.vi + s.ve) * rho.abs();
		s.alpha -= h.theta_i
			* ((rho.abs() - s.vi + s.ve).abs() - (rho.abs() - vx_i + vx_e).abs());
	}

	s.alpha = s.alpha.clamp(ALPHA_FLOOR, 1.0);
	s.ve += dve;
	s.vi += dvi;
	s.assoc = s.ve - s.vi;
}

fn le_pelley_hybrid(h: &Hyperparameters, s: &mut StimulusState, ctx: &TrialContext) {
	let rho = ctx.rho();
	let vx_e = ctx.sigma_e - s.ve;
	let vx_i = ctx.sigma_i - s.vi;

	let mut dve = 0.0;
	let mut dvi = 0.0;
	if rho >= 0.0 {
		dve = s.alpha_mack * h.betap * s.alpha_hall * (1.0 - s.ve + s.vi) * rho.abs();
		if rho > 0.0 {
			s.alpha_mack -= h.theta_e
				* s.alpha_hall
				* ((ctx.lamda - s.ve + s.vi).abs() - (ctx.lamda - vx_e + vx_i).abs());
		}
	} else {
		dvi = s.alpha_mack * h.betan * s.alpha_hall * (1.0 - s.vi + s.ve) * rho.abs();
		s.alpha_mack -= h.theta_i
			* ((rho.abs() - s.vi + s.ve).abs() - (rho.abs() - vx_i + vx_e).abs());
	}

	s.alpha_hall = h.gamma.mul_add(rho.abs(), (1.0 - h.gamma) * s.alpha_hall);
	s.alpha_mack = s.alpha_mack.clamp(ALPHA_FLOOR, 1.0);
	s.alpha_hall = s.alpha_hall.clamp(ALPHA_HALL_FLOOR, 1.0);
	s.alpha = s.alpha_mack * s.alpha_hall;

	s.ve += dve;
	s.vi += dvi;
	s.assoc = s.ve - s.vi;
}

fn dual_mack(h: &Hyperparameters, s: &mut StimulusState, ctx: &TrialContext) {
	let rho = ctx.rho();
	let vx_e = ctx.sigma_e - s.ve;
	let vx_i = ctx.sigma_i - s.vi;

	if rho >= 0.0 {
		s.ve += s.alpha * h.betap * (1.0 - s.ve + s.vi) * rho.abs();
	} else {
		s.vi += s.alpha * h.betan * (1.0 - s.vi + s.ve) * rho.abs();
	}

	// Reads assoc from before this trial's increment
	s.alpha = 0.5 * (1.0 + s.assoc - (vx_e - vx_i));
	s.assoc = s.ve - s.vi;
}

/// Shared habituation and alpha updates of the PALMS hybrids.
///
/// Returns the Hall-weighted increment `α_hall (λ - ΣV)`; the caller decides
/// how it composes with `α_mack`.
fn habituate(s: &mut StimulusState, b: &Baseline, ctx: &TrialContext) -> f64 {
	let error = ctx.lamda - ctx.sigma;

	s.habituation = b.salience.mul_add(-(1.0 - s.habituation), b.habituation);
	s.alpha_hall = (1.0 - s.habituation).mul_add(error.powi(2), s.habituation * s.alpha_hall);

	let hall_0 = (1.0 - b.salience).mul_add(1.0 - b.alpha_hall, b.alpha_hall);
	s.alpha_mack = ((1.0 - s.alpha_mack) * 2.0f64.mul_add(s.assoc, -ctx.sigma)).powi(2)
		+ (1.0 - hall_0).powi(2);

	s.alpha_hall * error
}
