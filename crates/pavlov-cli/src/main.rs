//! Pavlov command-line front-end.
//!
//! Reads a pipe-delimited experiment table (`name|phase|phase`, one group
//! per line) from a file or stdin, runs it under the chosen learning rule and
//! writes every recorded series to stdout as JSON or CSV.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use pavlov_core::{
	parse_table, simulate_table, Param, ParameterOverrides, RuleKind, SimulationConfig,
	SimulationReport, StimulusHistory, DEFAULT_RANDOM_REPEATS,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
	name = "pavlov",
	version,
	about = "Simulate Pavlovian conditioning experiments under associative learning rules"
)]
struct Args {
	/// Experiment table file; stdin when omitted or `-`
	experiment_file: Option<PathBuf>,

	/// Learning rule, by registry name (see --list-rules)
	#[arg(long, default_value = "Rescorla Wagner")]
	adaptive_type: String,

	/// Initial attentional weight
	#[arg(long)]
	alpha: Option<f64>,

	/// Initial Mackintosh component of alpha
	#[arg(long)]
	alpha_mack: Option<f64>,

	/// Initial Hall component of alpha
	#[arg(long)]
	alpha_hall: Option<f64>,

	/// Associativity of the US
	#[arg(long)]
	beta: Option<f64>,

	/// Associativity of the absence of the US
	#[arg(long)]
	beta_neg: Option<f64>,

	/// Asymptote of learning
	#[arg(long)]
	lamda: Option<f64>,

	/// Weight of recent surprise
	#[arg(long)]
	gamma: Option<f64>,

	/// LePelley excitatory attention rate
	#[arg(long)]
	theta_e: Option<f64>,

	/// LePelley inhibitory attention rate
	#[arg(long)]
	theta_i: Option<f64>,

	/// Stimulus salience
	#[arg(long)]
	salience: Option<f64>,

	/// Initial habituation
	#[arg(long)]
	habituation: Option<f64>,

	/// Hybrid constant rho
	#[arg(long)]
	rho: Option<f64>,

	/// Hybrid constant nu
	#[arg(long)]
	nu: Option<f64>,

	/// Initial alpha of one CS, as `A=0.3` (repeatable)
	#[arg(long, value_parser = parse_stimulus_value)]
	cs_alpha: Vec<(char, f64)>,

	/// Initial salience of one CS, as `A=0.4` (repeatable)
	#[arg(long, value_parser = parse_stimulus_value)]
	cs_salience: Vec<(char, f64)>,

	/// Initial alpha_mack of one CS, as `A=0.4` (repeatable)
	#[arg(long, value_parser = parse_stimulus_value)]
	cs_alpha_mack: Vec<(char, f64)>,

	/// Initial alpha_hall of one CS, as `A=0.4` (repeatable)
	#[arg(long, value_parser = parse_stimulus_value)]
	cs_alpha_hall: Vec<(char, f64)>,

	/// Size of the sliding window feeding the surprise signal
	#[arg(long)]
	window_size: Option<usize>,

	/// Xi parameter of the Hall alpha
	#[arg(long, default_value_t = 0.2)]
	xi_hall: f64,

	/// Shuffled runs averaged for each randomized phase
	#[arg(long, default_value_t = DEFAULT_RANDOM_REPEATS)]
	num_trials: usize,

	/// Seed for randomized phases; entropy when omitted
	#[arg(long)]
	seed: Option<u64>,

	/// Only run these experiments
	#[arg(long, num_args = 1..)]
	experiments: Vec<String>,

	/// Only output these CS
	#[arg(long, num_args = 1..)]
	stimuli: Vec<char>,

	/// Output format
	#[arg(long, value_enum, default_value_t = Format::Json)]
	format: Format,

	/// List the registered rules and their parameters, then exit
	#[arg(long)]
	list_rules: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
	Json,
	Csv,
}

/// `A=0.3`
fn parse_stimulus_value(s: &str) -> Result<(char, f64), String> {
	let (cs, value) = s
		.split_once('=')
		.ok_or_else(|| format!("expected CS=VALUE, got {s:?}"))?;

	let mut letters = cs.trim().chars();
	let cs = match (letters.next(), letters.next()) {
		(Some(c), None) if c.is_ascii_uppercase() => c,
		_ => return Err(format!("expected a single CS letter, got {cs:?}")),
	};
	let value = value
		.trim()
		.parse()
		.map_err(|e| format!("invalid value {value:?}: {e}"))?;

	Ok((cs, value))
}

impl Args {
	fn overrides(&self) -> Result<ParameterOverrides> {
		let mut overrides = ParameterOverrides {
			xi_hall: Some(self.xi_hall),
			..ParameterOverrides::default()
		};

		let global = [
			(Param::Alpha, self.alpha),
			(Param::AlphaMack, self.alpha_mack),
			(Param::AlphaHall, self.alpha_hall),
			(Param::Beta, self.beta),
			(Param::Betan, self.beta_neg),
			(Param::Lamda, self.lamda),
			(Param::Gamma, self.gamma),
			(Param::ThetaE, self.theta_e),
			(Param::ThetaI, self.theta_i),
			(Param::Salience, self.salience),
			(Param::Habituation, self.habituation),
			(Param::Rho, self.rho),
			(Param::Nu, self.nu),
		];
		for (param, value) in global {
			if let Some(value) = value {
				let _ = overrides.set(param, value);
			}
		}

		let per_stimulus = [
			(Param::Alpha, &self.cs_alpha),
			(Param::Salience, &self.cs_salience),
			(Param::AlphaMack, &self.cs_alpha_mack),
			(Param::AlphaHall, &self.cs_alpha_hall),
		];
		for (param, values) in per_stimulus {
			for &(cs, value) in values {
				let _ = overrides.set_for(cs, param, value)?;
			}
		}

		Ok(overrides)
	}

	fn config(&self) -> Result<SimulationConfig> {
		Ok(SimulationConfig {
			rule: self.adaptive_type.clone(),
			overrides: self.overrides()?,
			window_size: self.window_size,
			random_repeats: self.num_trials,
			seed: self.seed,
		})
	}

	fn read_table(&self) -> Result<String> {
		match &self.experiment_file {
			Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
				.with_context(|| format!("Failed to read experiment file {}", path.display())),
			_ => {
				let mut table = String::new();
				let _ = io::stdin()
					.read_to_string(&mut table)
					.context("Failed to read experiment table from stdin")?;
				Ok(table)
			}
		}
	}
}

#[derive(Serialize)]
struct Failure {
	experiment: String,
	error: String,
}

#[derive(Serialize)]
struct Output<'a> {
	rule: &'a str,
	phases: &'a [BTreeMap<String, StimulusHistory>],
	failures: Vec<Failure>,
}

fn write_json(out: &mut impl Write, rule: &str, report: &SimulationReport) -> Result<()> {
	let output = Output {
		rule,
		phases: report.results.phases(),
		failures: report
			.failures
			.iter()
			.map(|(experiment, error)| Failure {
				experiment: experiment.clone(),
				error: error.to_string(),
			})
			.collect(),
	};
	serde_json::to_writer_pretty(&mut *out, &output).context("Failed to write JSON")?;
	writeln!(out)?;
	Ok(())
}

fn write_csv(out: &mut impl Write, report: &SimulationReport) -> Result<()> {
	writeln!(out, "phase,label,trial,assoc,alpha,alpha_mack,alpha_hall")?;
	for (index, phase) in report.results.phases().iter().enumerate() {
		for (label, history) in phase {
			for (trial, r) in history.records().enumerate() {
				writeln!(
					out,
					"{},{},{trial},{},{},{},{}",
					index + 1,
					csv_field(label),
					r.assoc,
					r.alpha,
					r.alpha_mack,
					r.alpha_hall
				)?;
			}
		}
	}
	Ok(())
}

/// Quote a CSV field when it holds a separator, a quote or a line break.
fn csv_field(field: &str) -> Cow<'_, str> {
	if field.contains([',', '"', '\n', '\r']) {
		Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
	} else {
		Cow::Borrowed(field)
	}
}

fn list_rules(out: &mut impl Write) -> Result<()> {
	for kind in RuleKind::ALL {
		let params: Vec<&str> = kind.parameters().iter().map(|p| p.name()).collect();
		writeln!(out, "{kind}: {}", params.join(", "))?;
	}
	Ok(())
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(io::stderr)
		.init();

	let args = Args::parse();
	let stdout = io::stdout();
	let mut out = stdout.lock();

	if args.list_rules {
		return list_rules(&mut out);
	}

	let config = args.config()?;
	let table = args.read_table()?;
	let mut specs = parse_table(&table).context("Failed to parse experiment table")?;

	if !args.experiments.is_empty() {
		specs.retain(|spec| args.experiments.contains(&spec.name));
	}
	if specs.is_empty() {
		bail!("No experiments to run");
	}
	info!(rule = %config.rule, experiments = specs.len(), "running table");

	let mut report = simulate_table(&specs, &config)
		.with_context(|| format!("Failed to configure rule {:?}", config.rule))?;
	if !args.stimuli.is_empty() {
		report.results.retain_stimuli(&args.stimuli);
	}
	debug!(phases = report.results.phases().len(), "simulation complete");

	match args.format {
		Format::Json => write_json(&mut out, &config.rule, &report)?,
		Format::Csv => write_csv(&mut out, &report)?,
	}

	for (experiment, error) in &report.failures {
		eprintln!("{experiment}: {error}");
	}
	if report.results.is_empty() && !report.is_complete() {
		bail!("Every experiment failed");
	}

	Ok(())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_stimulus_value() {
		assert_eq!(parse_stimulus_value("A=0.3"), Ok(('A', 0.3)));
		assert_eq!(parse_stimulus_value(" B = 1 "), Ok(('B', 1.0)));
		assert!(parse_stimulus_value("AB=0.3").is_err());
		assert!(parse_stimulus_value("a=0.3").is_err());
		assert!(parse_stimulus_value("A0.3").is_err());
		assert!(parse_stimulus_value("A=x").is_err());
	}

	#[test]
	fn test_args_build_overrides() {
		let args = Args::parse_from([
			"pavlov",
			"--adaptive-type",
			"LePelley",
			"--beta",
			"0.5",
			"--beta-neg",
			"0.1",
			"--cs-alpha",
			"A=0.4",
			"--num-trials",
			"10",
		]);
		let config = args.config().expect("valid config");

		assert_eq!(config.rule, "LePelley");
		assert_eq!(config.random_repeats, 10);
		assert_eq!(config.overrides.values.get(&Param::Beta), Some(&0.5));
		assert_eq!(config.overrides.values.get(&Param::Betan), Some(&0.1));
		assert_eq!(config.overrides.for_stimulus('A', Param::Alpha), Some(0.4));
		assert_eq!(config.overrides.xi_hall, Some(0.2));
	}

	#[test]
	fn test_csv_output() {
		let specs = parse_table("Control|2A+").expect("valid table");
		let config = SimulationConfig {
			seed: Some(1),
			..SimulationConfig::default()
		};
		let report = simulate_table(&specs, &config).expect("runs");

		let mut buf = Vec::new();
		write_csv(&mut buf, &report).expect("writes");
		let text = String::from_utf8(buf).expect("utf8");
		let lines: Vec<&str> = text.lines().collect();

		assert_eq!(lines.len(), 4);
		assert!(lines[1].starts_with("1,Control - A,0,0,"));
		assert!(lines[3].starts_with("1,Control - A,2,"));
	}

	#[test]
	fn test_csv_quotes_labels() {
		assert_eq!(csv_field("Control - A"), "Control - A");
		assert_eq!(csv_field("say \"hi\", A"), "\"say \"\"hi\"\", A\"");

		let specs = parse_table("Group 1, high|2A+").expect("valid table");
		let report = simulate_table(&specs, &SimulationConfig::default()).expect("runs");

		let mut buf = Vec::new();
		write_csv(&mut buf, &report).expect("writes");
		let text = String::from_utf8(buf).expect("utf8");
		let lines: Vec<&str> = text.lines().collect();

		assert_eq!(lines.len(), 4);
		assert!(lines[1].starts_with("1,\"Group 1, high - A\",0,"));
		// Outside the quoted label every row has the header's field count
		let columns = lines[0].split(',').count();
		for row in &lines[1..] {
			let (head, tail) = row.split_once('"').expect("quoted label");
			let (_, rest) = tail.split_once('"').expect("closing quote");
			assert_eq!(head.split(',').count() + rest.split(',').count() - 1, columns, "{row}");
		}
	}

	#[test]
	fn test_json_output() {
		let specs = parse_table("Control|A+").expect("valid table");
		let report = simulate_table(&specs, &SimulationConfig::default()).expect("runs");

		let mut buf = Vec::new();
		write_json(&mut buf, "Rescorla Wagner", &report).expect("writes");
		let value: serde_json::Value = serde_json::from_slice(&buf).expect("valid json");

		assert_eq!(value["rule"], "Rescorla Wagner");
		let assoc = value["phases"][0]["Control - A"]["trials"][0]["assoc"]
			.as_f64()
			.expect("numeric assoc");
		assert!((assoc - 0.03).abs() < 1e-12);
	}
}
