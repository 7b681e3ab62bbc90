//! Error types for simulation runs.

/// Errors that can occur while configuring or running a simulation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
	/// Rule name not present in the registry.
	#[error("Unknown learning rule: {0:?}")]
	UnknownRule(String),

	/// Parameter name outside the global vocabulary.
	#[error("Unknown parameter: {0:?}")]
	UnknownParameter(String),

	/// A rule needs a hyperparameter that was never supplied.
	#[error("Rule {rule:?} requires parameter {parameter:?}, which is unset")]
	MissingParameter {
		/// Rule that was being constructed
		rule: &'static str,
		/// Name of the missing parameter
		parameter: &'static str,
	},

	/// A schedule token could not be parsed.
	#[error("Part not understood: {token:?} in phase {phase:?}")]
	MalformedToken {
		/// Offending token
		token: String,
		/// Phase string the token came from
		phase: String,
	},

	/// An experiment table line is not `name|phase|...`.
	#[error("Invalid experiment line: {0:?}")]
	InvalidExperiment(String),

	/// A trial references a CS the group has no state for.
	#[error("Unknown stimulus: {0:?}")]
	UnknownStimulus(char),

	/// A rule step produced a non-finite value.
	#[error("Numeric overflow in {rule} for {stimulus} (lamda={lamda}, sigma={sigma})")]
	NumericOverflow {
		/// Rule that diverged
		rule: &'static str,
		/// CS being updated
		stimulus: char,
		/// Asymptote of the trial
		lamda: f64,
		/// Compound prediction of the trial
		sigma: f64,
	},

	/// A state field left the range its rule guarantees.
	#[error("Invariant violated in {rule} for {stimulus}: {detail}")]
	InvariantViolation {
		/// Rule whose guarantee failed
		rule: &'static str,
		/// CS whose state is inconsistent
		stimulus: char,
		/// Human readable description
		detail: String,
	},
}

impl SimError {
	/// Check if this error was raised while configuring a run, before any trial executed.
	#[must_use]
	pub const fn is_configuration(&self) -> bool {
		matches!(
			self,
			Self::UnknownRule(_)
				| Self::UnknownParameter(_)
				| Self::MissingParameter { .. }
				| Self::MalformedToken { .. }
				| Self::InvalidExperiment(_)
				| Self::UnknownStimulus(_)
		)
	}

	/// Check if this error comes from the arithmetic of a rule step.
	#[must_use]
	pub const fn is_numeric(&self) -> bool {
		matches!(
			self,
			Self::NumericOverflow { .. } | Self::InvariantViolation { .. }
		)
	}
}

/// Result type alias for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
