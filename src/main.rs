extern crate circuit;
extern crate interchange;

use circuit::{from_package, to_package, ElabConfig, ElabError, Elaboratable, ExchangeError, FullElaborator};
use clap::{arg, command, value_parser, Arg, ArgAction};
use interchange::{netlist, InterchangeError, NetlistFormat, Package};
use log::info;
use miette::Diagnostic;
use std::fs;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
	#[error(transparent)]
	#[diagnostic(code(hdl21::io_error))]
	Io(#[from] io::Error),

	#[error(transparent)]
	#[diagnostic(code(hdl21::interchange), help("check the input package against the interchange schema"))]
	Interchange(#[from] InterchangeError),

	#[error(transparent)]
	#[diagnostic(code(hdl21::exchange))]
	Exchange(#[from] ExchangeError),

	#[error("Elaboration failed:\n{0}")]
	#[diagnostic(code(hdl21::elab))]
	Elab(#[from] ElabError),
}

/// Output format requested on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
	Json,
	Netlist(NetlistFormat),
}

/// Imports a package, elaborates every module in it and writes the result
fn compile(source: &str, config: ElabConfig, fmt: OutputFormat, output: &mut dyn Write) -> Result<(), CliError> {
	let pkg = Package::from_json(source)?;
	info!("Read package `{}` with {} modules", pkg.domain, pkg.modules.len());

	let mut imported = from_package(&pkg)?;
	let roots: Vec<Elaboratable> = imported.roots().into_iter().map(Elaboratable::from).collect();
	let tops = FullElaborator::with_config(config).elaborate_all(&mut imported.design, &roots)?;
	let mut elaborated = to_package(&imported.design, &tops, &pkg.domain)?;
	elaborated.desc = pkg.desc.clone();

	let text = match fmt {
		OutputFormat::Json => elaborated.to_json()?,
		OutputFormat::Netlist(fmt) => {
			let mut text = String::new();
			netlist(&elaborated, fmt, &mut text)?;
			text
		},
	};
	output.write_all(text.as_bytes())?;
	Ok(())
}

fn init_logging(verbosity: u8) {
	let level = match verbosity {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init();
}

fn main() -> miette::Result<()> {
	let matches = command!()
		.arg(Arg::new("source").required(true).help("JSON package to elaborate"))
		.arg(Arg::new("output").short('o').long("output").help("Output file, stdout if omitted"))
		.arg(
			arg!(--fmt <FORMAT>)
				.help("Output format")
				.value_parser(["verilog", "spice", "json"])
				.default_value("verilog"),
		)
		.arg(
			arg!(--"max-name-len" <LEN>)
				.help("Longest name elaboration may generate")
				.value_parser(value_parser!(usize)),
		)
		.arg(
			arg!(--"max-generator-depth" <DEPTH>)
				.help("Deepest nesting of generator calls")
				.value_parser(value_parser!(usize)),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::Count)
				.help("Raises the default log level, RUST_LOG takes precedence"),
		)
		.get_matches();

	init_logging(matches.get_count("verbose"));

	let mut config = ElabConfig::default();
	if let Some(len) = matches.get_one::<usize>("max-name-len") {
		config.max_name_len = *len;
	}
	if let Some(depth) = matches.get_one::<usize>("max-generator-depth") {
		config.max_generator_depth = *depth;
	}

	let fmt = match matches.get_one::<String>("fmt").map(String::as_str) {
		Some("json") => OutputFormat::Json,
		Some(other) => OutputFormat::Netlist(other.parse().map_err(CliError::from)?),
		None => OutputFormat::Netlist(NetlistFormat::Verilog),
	};

	let source_path = matches
		.get_one::<String>("source")
		.map(String::as_str)
		.unwrap_or_default();
	let source = fs::read_to_string(source_path).map_err(CliError::from)?;

	let mut output: Box<dyn Write> = match matches.get_one::<String>("output") {
		None => Box::new(io::stdout()),
		Some(path) => Box::new(fs::File::create(path).map_err(CliError::from)?),
	};

	compile(&source, config, fmt, &mut output)?;
	output.flush().map_err(CliError::from)?;
	Ok(())
}
