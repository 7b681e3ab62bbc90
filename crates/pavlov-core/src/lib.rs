//! # Pavlov Core
//!
//! Trial-by-trial simulation of Pavlovian conditioning under a family of
//! associative learning rules.
//!
//! ## Model
//!
//! Conditioned stimuli (CS) are single letters. A trial presents a compound
//! of CS, followed (`+`) or not (`-`) by the unconditioned stimulus. Every CS
//! carries an associative strength `V` and an attentional weight `α`; on each
//! trial the rule moves `V` toward the asymptote `λ` in proportion to the
//! compound's prediction error:
//!
//! ```text
//! ΔV = α β (λ - ΣV)
//! ```
//!
//! The registered rules differ in how `α` evolves (Mackintosh, Hall,
//! Pearce-Hall, LePelley and hybrids) and whether `V` is split into
//! excitatory and inhibitory parts.
//!
//! ## Pipeline
//!
//! 1. [`schedule`] parses `name|phase|phase` rows such as `Blocking|10A+|10AB+`
//! 2. [`phase::Group`] owns each row's stimulus states and runs its phases
//! 3. [`trial::aggregate`] sums the compound's prediction before any CS moves
//! 4. [`rules::LearningRule`] applies the update law to each present CS
//! 5. [`history::HistoryRecorder`] collects the per-trial series
//!
//! ## Example
//!
//! ```rust
//! use pavlov_core::{simulate, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     rule: "Rescorla Wagner".into(),
//!     seed: Some(1),
//!     ..SimulationConfig::default()
//! };
//!
//! let report = simulate("Blocking|10A+|10AB+\nControl|10C+|10AB+", &config).unwrap();
//! let blocked = report.results.series(1, "Blocking - B").unwrap();
//! let control = report.results.series(1, "Control - B").unwrap();
//! assert!(blocked.last().assoc < control.last().assoc);
//! ```
//!
//! ## References
//!
//! - Rescorla, R. A. & Wagner, A. R. (1972). *A theory of Pavlovian conditioning*
//! - Mackintosh, N. J. (1975). *A theory of attention*
//! - Pearce, J. M. & Hall, G. (1980). *A model for Pavlovian learning*
//! - Le Pelley, M. E. (2004). *The role of associative history in models of
//!   associative learning*

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod experiment;
pub mod history;
pub mod params;
pub mod phase;
pub mod rules;
pub mod schedule;
pub mod stimulus;
pub mod trial;

pub use error::{Result, SimError};
pub use experiment::{
	run_experiment, simulate, simulate_table, SimulationConfig, SimulationReport,
	DEFAULT_RANDOM_REPEATS,
};
pub use history::{label, mean_phase, HistoryRecorder, PhaseHistory, StimulusHistory};
pub use params::{Hyperparameters, Param, ParameterOverrides, Parameters};
pub use phase::{Group, StimulusMap};
pub use rules::{Clamp, ClampedField, LearningRule, RuleKind};
pub use schedule::{parse_table, ExperimentSpec, Phase, MAX_TRIAL_COUNT, RANDOM_TOKEN};
pub use stimulus::{Baseline, StimulusRecord, StimulusState};
pub use trial::{aggregate, Compound, Outcome, Trial, TrialContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
