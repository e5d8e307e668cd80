use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::{Connection, Instance, InterchangeError, Module, Package, Port, Target};

macro_rules! emitln {
	($self:ident, $($arg:tt)*) => {
		writeln!($self.output_stream, "{}{}", "\t".repeat($self.indent_level as usize), format!($($arg)*))
	}
}

macro_rules! emit {
	($self:ident, $($arg:tt)*) => {
		write!($self.output_stream, "{}{}", "\t".repeat($self.indent_level as usize), format!($($arg)*))
	}
}

mod spice;
mod verilog;

pub use spice::SpiceNetlister;
pub use verilog::VerilogNetlister;

/// Supported netlist formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetlistFormat {
	Verilog,
	Spice,
}

impl FromStr for NetlistFormat {
	type Err = InterchangeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"verilog" | "v" => Ok(NetlistFormat::Verilog),
			"spice" | "sp" => Ok(NetlistFormat::Spice),
			_ => Err(InterchangeError::InvalidFormat(s.into())),
		}
	}
}

lazy_static! {
	static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_]").unwrap();
}

/// Replaces every character outside of `[a-zA-Z0-9_]` with an underscore
pub fn sanitize(name: &str) -> String {
	INVALID_NAME_CHARS.replace_all(name, "_").into_owned()
}

/// Writes a package in one netlist format
pub trait Netlister {
	fn format(&self) -> NetlistFormat;

	/// Writes anything preceding the first module
	fn write_header(&mut self, pkg: &Package) -> Result<(), InterchangeError>;

	/// Writes a single module definition
	fn write_module(&mut self, pkg: &Package, module: &Module) -> Result<(), InterchangeError>;

	/// Writes the whole package, modules in package order
	fn write_package(&mut self, pkg: &Package) -> Result<(), InterchangeError> {
		pkg.validate()?;
		self.write_header(pkg)?;

		let mut written = HashSet::new();
		for module in &pkg.modules {
			let name = sanitize(&module.name.name);
			if !written.insert(name) {
				return Err(InterchangeError::DuplicateModule(module.name.clone()));
			}
			debug!("Netlisting module {} as {:?}", module.name, self.format());
			self.write_module(pkg, module)?;
		}
		Ok(())
	}
}

/// Writes `pkg` into `w` in the requested format
pub fn netlist(pkg: &Package, fmt: NetlistFormat, w: &mut dyn fmt::Write) -> Result<(), InterchangeError> {
	match fmt {
		NetlistFormat::Verilog => VerilogNetlister::new(w).write_package(pkg),
		NetlistFormat::Spice => SpiceNetlister::new(w).write_package(pkg),
	}
}

/// Pairs an instance's connections with its target's ports, in the target's port order
pub(crate) fn ordered_connections<'a>(
	module: &Module,
	inst: &'a Instance,
	target: Target<'a>,
) -> Result<Vec<(&'a Port, &'a Connection)>, InterchangeError> {
	let ports = target.ports();
	if let Some(unknown) = inst
		.connections
		.keys()
		.find(|name| !ports.iter().any(|p| &p.signal.name == *name))
	{
		return Err(InterchangeError::UnknownPort {
			module: module.name.name.clone(),
			instance: inst.name.clone(),
			port: unknown.clone(),
		});
	}

	ports
		.iter()
		.map(|port| match inst.connections.get(&port.signal.name) {
			Some(conn) => Ok((port, conn)),
			None => Err(InterchangeError::UnconnectedPort {
				module: module.name.name.clone(),
				instance: inst.name.clone(),
				port: port.signal.name.clone(),
			}),
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("Gen(w=4 n=2)", "Gen_w_4_n_2_")]
	#[case("plain_name_0", "plain_name_0")]
	#[case("hdl21.primitives", "hdl21_primitives")]
	fn test_sanitize(#[case] name: &str, #[case] expected: &str) {
		assert_eq!(sanitize(name), expected);
	}

	#[rstest]
	#[case("Verilog", Some(NetlistFormat::Verilog))]
	#[case("v", Some(NetlistFormat::Verilog))]
	#[case("sp", Some(NetlistFormat::Spice))]
	#[case("vhdl", None)]
	fn test_format_from_str(#[case] name: &str, #[case] expected: Option<NetlistFormat>) {
		assert_eq!(name.parse::<NetlistFormat>().ok(), expected);
	}
}
