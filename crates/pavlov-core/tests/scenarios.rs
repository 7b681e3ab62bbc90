//! End-to-end conditioning scenarios.
//!
//! These tests drive whole schedules through the public API:
//! - Acquisition curves under Rescorla-Wagner
//! - Alpha drift and clamping
//! - Excitatory / inhibitory routing on reinforcement and extinction
//! - Attention shifts between compound and extinction blocks
//! - Configuration failures surfacing before any trial
//! - Classic effects (blocking, overexpectation) and seeded randomization
//! - Habituation-driven hybrids staying bounded over acquisition and extinction

#![allow(clippy::expect_used, clippy::float_cmp)]

use approx::assert_abs_diff_eq;
use pavlov_core::{
	run_experiment, simulate, ExperimentSpec, Group, LearningRule, Param, ParameterOverrides,
	Phase, SimError, SimulationConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn config(rule: &str) -> SimulationConfig {
	SimulationConfig {
		rule: rule.to_owned(),
		seed: Some(2024),
		..SimulationConfig::default()
	}
}

fn group(rule: &str, stimuli: &str, overrides: &ParameterOverrides) -> Group {
	let (rule, params) = LearningRule::configure(rule, overrides).expect("valid rule");
	Group::new("Test", rule, &params, overrides, stimuli.chars(), None)
}

fn trials(phase: &str) -> Phase {
	Phase::parse(phase).expect("valid phase")
}

#[test]
fn test_rescorla_wagner_acquisition() {
	let report = simulate("Acquisition|10A+", &config("Rescorla Wagner")).expect("runs");
	let series = report
		.results
		.series(0, "Acquisition - A")
		.expect("A recorded")
		.series(|r| r.assoc);

	assert_eq!(series.len(), 11);
	assert_eq!(series[0], 0.0);
	assert_abs_diff_eq!(series[1], 0.03, epsilon = 1e-12);

	for pair in series.windows(2) {
		assert!(pair[1] > pair[0], "acquisition must be monotone: {series:?}");
		assert!(pair[1] < 1.0);
	}

	// Closed form of the geometric approach to lamda
	let expected = 1.0 - 0.97f64.powi(10);
	assert_abs_diff_eq!(series[10], expected, epsilon = 1e-12);
}

#[test]
fn test_linear_alpha_grows_to_clamp() {
	let report = simulate("Linear|60A+", &config("Rescorla Wagner Linear")).expect("runs");
	let alphas = report
		.results
		.series(0, "Linear - A")
		.expect("A recorded")
		.series(|r| r.alpha);

	assert_eq!(alphas[0], 0.1);
	for (n, &alpha) in alphas.iter().enumerate() {
		let expected = (0.1 * 1.05f64.powi(i32::try_from(n).expect("small index"))).min(1.0);
		assert_abs_diff_eq!(alpha, expected, epsilon = 1e-9);
	}
	assert_eq!(alphas[alphas.len() - 1], 1.0);
}

#[test]
fn test_pearce_kaye_hall_extinction_routes_to_inhibition() {
	let mut g = group("Pearce Kaye Hall", "AB", &ParameterOverrides::default());

	let _ = g.run_phase(&trials("AB+").trials, None).expect("phase runs");
	let a = g.state('A').expect("A").clone();
	let b = g.state('B').expect("B").clone();
	assert_abs_diff_eq!(a.ve, 0.03, epsilon = 1e-12);
	assert_eq!(a.vi, 0.0);
	assert_eq!(a.ve, b.ve);

	let _ = g.run_phase(&trials("A-").trials, None).expect("phase runs");
	let a_after = g.state('A').expect("A");
	let b_after = g.state('B').expect("B");

	// Only the present CS accrues inhibition
	assert_eq!(a_after.ve, a.ve);
	assert!(a_after.vi > 0.0);
	// betan * alpha * |rho|, alpha = 0.5 * 1 + 0.5 * 0.1
	assert_abs_diff_eq!(a_after.vi, 0.2 * 0.55 * 0.03, epsilon = 1e-12);
	assert_eq!(*b_after, b);
	assert_abs_diff_eq!(a_after.assoc, a_after.ve - a_after.vi, epsilon = 1e-12);
}

#[test]
fn test_le_pelley_alpha_reverses_between_blocks() {
	let mut overrides = ParameterOverrides::default();
	let _ = overrides.set_for('A', Param::Alpha, 0.3).expect("per-CS parameter");
	let mut g = group("LePelley", "AB", &overrides);

	let history = g
		.run_phase(&trials("5AB+/5A-").trials, None)
		.expect("phase runs");
	let alphas = history[&'A'].series(|r| r.alpha);

	// AB+ block: A is the better predictor, its attention rises
	for pair in alphas[..6].windows(2) {
		assert!(pair[1] > pair[0], "{alphas:?}");
	}
	// A- block: the excitatory CS loses attention
	for pair in alphas[5..].windows(2) {
		assert!(pair[1] < pair[0], "{alphas:?}");
	}
}

#[test]
fn test_unknown_rule_before_any_trial() {
	let result = simulate("Control|10A+", &config("Rescorla Wagnr"));
	assert_eq!(result, Err(SimError::UnknownRule("Rescorla Wagnr".into())));
	assert!(result.err().is_some_and(|e| e.is_configuration()));

	let spec = ExperimentSpec::parse_line("Control|10A+").expect("valid line");
	let mut rng = StdRng::seed_from_u64(0);
	assert!(run_experiment(&spec, &config("nope"), &mut rng).is_err());
}

#[test]
fn test_malformed_schedule_is_configuration_error() {
	let result = simulate("Control|10a+", &config("Rescorla Wagner"));
	assert!(matches!(result, Err(SimError::MalformedToken { .. })));
}

#[test]
fn test_blocking() {
	let table = "Blocking|10A+|10AB+\nControl|10C+|10AB+";
	let report = simulate(table, &config("Rescorla Wagner")).expect("runs");

	let blocked = report.results.series(1, "Blocking - B").expect("B recorded");
	let control = report.results.series(1, "Control - B").expect("B recorded");
	assert!(blocked.last().assoc < control.last().assoc);

	// Pre-trained A enters the compound phase with its phase-one strength
	let a1 = report.results.series(0, "Blocking - A").expect("A recorded");
	let a2 = report.results.series(1, "Blocking - A").expect("A recorded");
	assert_eq!(a2.initial, *a1.last());
}

#[test]
fn test_overexpectation() {
	let table = "Over|100A+/100B+|10AB+";
	let report = simulate(table, &config("Rescorla Wagner")).expect("runs");
	let a = report.results.series(1, "Over - A").expect("A recorded");

	// Combined prediction exceeds lamda, so both lose strength
	let assoc = a.series(|r| r.assoc);
	assert!(assoc.windows(2).all(|p| p[1] < p[0]), "{assoc:?}");
}

#[test]
fn test_rescorla_wagner_bit_identical() {
	let table = "One|5AB+/5A-|3B+";
	let a = simulate(table, &config("Rescorla Wagner")).expect("runs");
	let b = simulate(table, &config("Rescorla Wagner")).expect("runs");

	for (pa, pb) in a.results.phases().iter().zip(b.results.phases()) {
		for (label, ha) in pa {
			let hb = &pb[label];
			for (ra, rb) in ha.records().zip(hb.records()) {
				assert_eq!(ra.assoc.to_bits(), rb.assoc.to_bits());
			}
		}
	}
}

#[test]
fn test_randomized_phase_reproducible_per_seed() {
	let table = "Random|rand/4AB+/4A-/4B+";
	let mut cfg = config("LePelley");
	cfg.random_repeats = 20;

	let first = simulate(table, &cfg).expect("runs");
	let second = simulate(table, &cfg).expect("runs");
	assert_eq!(first, second);

	cfg.seed = Some(99);
	let other = simulate(table, &cfg).expect("runs");
	assert_ne!(first, other);
}

#[test]
fn test_randomized_phase_keeps_trial_count() {
	let table = "Random|rand/3A+/2AB-";
	let report = simulate(table, &config("Rescorla Wagner")).expect("runs");

	let a = report.results.series(0, "Random - A").expect("A recorded");
	let b = report.results.series(0, "Random - B").expect("B recorded");
	assert_eq!(a.trials.len(), 5);
	// B appears on two trials in every run
	assert_eq!(b.trials.len(), 2);
}

#[test]
fn test_phase_lamda_token() {
	let low = simulate("Low|lamda=0.5/100A+", &config("Rescorla Wagner")).expect("runs");
	let a = low.results.series(0, "Low - A").expect("A recorded");
	assert!(a.last().assoc < 0.5);
	assert!(a.last().assoc > 0.4);
}

#[test]
fn test_palms_hybrids_stay_bounded() {
	let table = "Palms|10A+/10A-|100A+";

	for rule in ["PALMS Hybrid", "PALMS HybridFix"] {
		let report = simulate(table, &config(rule)).expect("runs");
		assert!(report.is_complete(), "{rule}: {:?}", report.failures);

		for phase in 0..2 {
			let a = report.results.series(phase, "Palms - A").expect("A recorded");
			for record in a.records() {
				assert!(record.assoc.is_finite(), "{rule}: {record:?}");
				assert!(record.alpha_mack.is_finite(), "{rule}: {record:?}");
				assert!(record.alpha_hall.is_finite(), "{rule}: {record:?}");
			}
		}

		let overrides = ParameterOverrides::default();
		let mut g = group(rule, "A", &overrides);
		for phase in ["10A+", "10A-"] {
			let history = g.run_phase(&trials(phase).trials, None).expect("phase runs");
			assert_eq!(history[&'A'].trials.len(), 10);

			let a = g.state('A').expect("A");
			assert!(a.is_finite(), "{rule}: {a:?}");
			assert!(a.habituation > 0.0 && a.habituation <= 1.0, "{rule}: {a:?}");
		}
	}
}

#[test]
fn test_window_drives_dual_v() {
	let mut with_window = config("Dual V");
	with_window.window_size = Some(3);
	let without_window = config("Dual V");

	let table = "Dual|10A+";
	let a = simulate(table, &with_window).expect("runs");
	let b = simulate(table, &without_window).expect("runs");

	let alpha_with = a.results.series(0, "Dual - A").expect("A").last().alpha;
	let alpha_without = b.results.series(0, "Dual - A").expect("A").last().alpha;
	// Without surprise the local gamma is zero and alpha never moves
	assert_abs_diff_eq!(alpha_without, 0.1, epsilon = 1e-12);
	assert!((alpha_with - alpha_without).abs() > 1e-6);
}
