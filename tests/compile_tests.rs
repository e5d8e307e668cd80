extern crate circuit;
extern crate interchange;

use circuit::{from_package, to_package, Elaboratable, FullElaborator};
use interchange::{netlist, NetlistFormat, Package};
use miette::IntoDiagnostic;
use rstest::*;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use subprocess::{ExitStatus, Popen, PopenConfig};
use tempfile::NamedTempFile;

// Same flow as main.rs
fn compile(source: &str, fmt: Option<NetlistFormat>, output: &mut dyn Write) -> miette::Result<()> {
	let pkg = Package::from_json(source).into_diagnostic()?;
	let mut imported = from_package(&pkg).into_diagnostic()?;
	let roots: Vec<Elaboratable> = imported.roots().into_iter().map(Elaboratable::from).collect();
	let tops = FullElaborator::new()
		.elaborate_all(&mut imported.design, &roots)
		.into_diagnostic()?;
	let mut elaborated = to_package(&imported.design, &tops, &pkg.domain).into_diagnostic()?;
	elaborated.desc = pkg.desc.clone();

	let text = match fmt {
		None => elaborated.to_json().into_diagnostic()?,
		Some(fmt) => {
			let mut text = String::new();
			netlist(&elaborated, fmt, &mut text).into_diagnostic()?;
			text
		},
	};
	output.write_all(text.as_bytes()).into_diagnostic()?;
	Ok(())
}

fn run_compile(input_path: &Path, fmt: Option<NetlistFormat>) -> miette::Result<NamedTempFile> {
	let src = std::fs::read_to_string(input_path).expect("failed to read input package");
	let mut tmpfile = NamedTempFile::new().unwrap();
	compile(&src, fmt, &mut tmpfile)?;
	Ok(tmpfile)
}

fn read_output(file: &NamedTempFile) -> String {
	let mut out = String::new();
	file.reopen().unwrap().read_to_string(&mut out).unwrap();
	out
}

fn run_iverilog(iverilog_path: &str, input_path: &Path) -> Result<(), String> {
	let bin_file = NamedTempFile::new().unwrap();
	let args = [
		iverilog_path,
		"-Wall",
		"-o",
		bin_file.path().to_str().unwrap(),
		input_path.to_str().unwrap(),
	];
	let mut p = Popen::create(&args, PopenConfig::default()).expect("failed to spawn iverilog");

	use ExitStatus::*;
	match p.wait().unwrap() {
		Exited(0) => Ok(()),
		Exited(err) => Err(format!("Exit code: {}", err)),
		Signaled(signum) => Err(format!("Signaled: {}", signum)),
		Other(err) => Err(format!("Other: {}", err)),
		Undetermined => panic!("cannot determine exit code"),
	}
}

#[rstest]
fn test_verilog_success(#[files("tests/input/*.json")] path: PathBuf) {
	let v_file = run_compile(&path, Some(NetlistFormat::Verilog)).unwrap();
	let verilog = read_output(&v_file);
	assert!(verilog.contains("endmodule"));

	if let Ok(iverilog_path) = std::env::var("HDL21_IVERILOG") {
		if let Err(e) = run_iverilog(&iverilog_path, v_file.path()) {
			eprintln!("iverilog failed: {}", e);
			eprintln!("Faulty netlist follows:");
			eprintln!("============================");
			eprintln!("{}", verilog);
			eprintln!("============================");
			panic!("iverilog failed");
		}
	}
}

#[rstest]
fn test_spice_success(#[files("tests/input*/*.json")] #[exclude("input_invalid")] path: PathBuf) {
	let sp_file = run_compile(&path, Some(NetlistFormat::Spice)).unwrap();
	let spice = read_output(&sp_file);
	assert!(spice.contains(".SUBCKT"));
	assert!(spice.contains(".ENDS"));
}

#[rstest]
fn test_primitives_rejected_in_verilog(#[files("tests/input_spice/*.json")] path: PathBuf) {
	assert!(run_compile(&path, Some(NetlistFormat::Verilog)).is_err());
}

/// Elaborated output is already flat, so elaborating it again changes nothing
#[rstest]
fn test_json_output_is_stable(#[files("tests/input/*.json")] path: PathBuf) {
	let first = read_output(&run_compile(&path, None).unwrap());
	let mut second = Vec::new();
	compile(&first, None, &mut second).unwrap();
	assert_eq!(first, String::from_utf8(second).unwrap());
}

#[rstest]
fn test_compile_failure(#[files("tests/input_invalid/*.json")] path: PathBuf) {
	assert!(run_compile(&path, None).is_err());
}

#[rstest]
fn test_cli_writes_output_file() {
	let out_file = NamedTempFile::new().unwrap();
	let mut p = Popen::create(
		&[
			env!("CARGO_BIN_EXE_hdl21"),
			"tests/input_spice/rc_filter.json",
			"--fmt",
			"spice",
			"-o",
			out_file.path().to_str().unwrap(),
		],
		PopenConfig::default(),
	)
	.expect("failed to spawn hdl21");
	assert_eq!(p.wait().unwrap(), ExitStatus::Exited(0));

	let spice = read_output(&out_file);
	assert!(spice.contains(".SUBCKT ladder"));
	assert!(spice.contains("rr0"));
	assert!(spice.contains("xf1"));
}

#[rstest]
fn test_cli_reports_elaboration_error() {
	let mut p = Popen::create(
		&[env!("CARGO_BIN_EXE_hdl21"), "tests/input_invalid/width_mismatch.json"],
		PopenConfig {
			stderr: subprocess::Redirection::Pipe,
			..Default::default()
		},
	)
	.expect("failed to spawn hdl21");
	let (_, stderr) = p.communicate(None).unwrap();
	assert!(!matches!(p.wait().unwrap(), ExitStatus::Exited(0)));
	assert!(stderr.unwrap_or_default().contains("u0"));
}
