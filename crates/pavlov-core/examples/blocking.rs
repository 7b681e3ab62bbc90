//! Kamin Blocking Example
//!
//! This example runs the classic blocking design under several rules:
//! 1. Pre-train A alone (`10A+`)
//! 2. Train the AB compound (`10AB+`)
//! 3. Compare B against a control group whose pre-training used C
//!
//! Run with: `cargo run --example blocking`

use pavlov_core::{simulate, RuleKind, SimulationConfig};

fn main() {
	println!("=== Kamin Blocking ===\n");

	let table = "\
Blocking|10A+|10AB+
Control|10C+|10AB+";

	for kind in [
		RuleKind::RescorlaWagner,
		RuleKind::PearceKayeHall,
		RuleKind::LePelley,
		RuleKind::MackHall,
	] {
		let mut config = SimulationConfig {
			rule: kind.name().to_owned(),
			seed: Some(1),
			..SimulationConfig::default()
		};
		config.overrides.xi_hall = Some(0.2);

		let report = match simulate(table, &config) {
			Ok(report) => report,
			Err(err) => {
				println!("{kind}: {err}");
				continue;
			}
		};

		let final_assoc = |label: &str| {
			report
				.results
				.series(1, label)
				.map_or(f64::NAN, |h| h.last().assoc)
		};

		let blocked = final_assoc("Blocking - B");
		let control = final_assoc("Control - B");
		println!("{kind}");
		println!("  B after blocking: {blocked:.4}");
		println!("  B in control:     {control:.4}");
		println!("  blocking ratio:   {:.2}\n", blocked / control);
	}

	// Trial-by-trial view of the blocked CS under Rescorla-Wagner
	let config = SimulationConfig::default();
	if let Ok(report) = simulate(table, &config) {
		if let Some(history) = report.results.series(1, "Blocking - B") {
			println!("Rescorla Wagner, Blocking - B:");
			for (trial, record) in history.records().enumerate() {
				println!("  trial {trial:>2}: V = {:.4}, alpha = {:.3}", record.assoc, record.alpha);
			}
		}
	}
}
