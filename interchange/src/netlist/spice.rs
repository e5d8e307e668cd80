use std::fmt;
use std::fmt::Write;

use super::{ordered_connections, sanitize, NetlistFormat, Netlister};
use crate::{Connection, Instance, InterchangeError, Module, Package, ParamValue, Params, Signal};

/// Generic Spice netlister
///
/// Multi-bit signals are written as one net per bit, most significant
/// bit first, with an underscore-separated bit index (`bus_3 bus_2 ...`).
pub struct SpiceNetlister<'a> {
	indent_level: u32,
	output_stream: &'a mut dyn fmt::Write,
}

/// Spice element letter of a built-in primitive
fn primitive_prefix(name: &str) -> Option<char> {
	match name {
		"Resistor" => Some('r'),
		"Capacitor" => Some('c'),
		"Inductor" => Some('l'),
		"VoltageSource" => Some('v'),
		"CurrentSource" => Some('i'),
		"Mos" => Some('m'),
		"Diode" => Some('d'),
		_ => None,
	}
}

impl<'a> SpiceNetlister<'a> {
	pub fn new(w: &'a mut dyn fmt::Write) -> Self {
		Self {
			indent_level: 0,
			output_stream: w,
		}
	}

	fn format_bus_bit(name: &str, index: usize) -> String {
		format!("{}_{}", name, index)
	}

	fn format_signal(sig: &Signal) -> String {
		if sig.width == 1 {
			return sig.name.clone();
		}
		(0..sig.width)
			.rev()
			.map(|k| Self::format_bus_bit(&sig.name, k))
			.collect::<Vec<_>>()
			.join(" ")
	}

	fn format_connection(module: &Module, conn: &Connection) -> Result<String, InterchangeError> {
		// Widths are checked by Package::validate
		module.connection_width(conn)?;
		Ok(match conn {
			Connection::Sig(name) => match module.get_signal(name) {
				Some(sig) => Self::format_signal(sig),
				None => name.clone(),
			},
			Connection::Slice(s) => {
				let scalar = module.get_signal(&s.signal).map_or(false, |sig| sig.width == 1);
				if scalar {
					s.signal.clone()
				}
				else {
					(s.bot..=s.top)
						.rev()
						.map(|k| Self::format_bus_bit(&s.signal, k))
						.collect::<Vec<_>>()
						.join(" ")
				}
			},
			Connection::Concat(c) => {
				let parts = c
					.parts
					.iter()
					.rev()
					.map(|p| Self::format_connection(module, p))
					.collect::<Result<Vec<_>, _>>()?;
				parts.join(" ")
			},
		})
	}

	fn format_params(params: &Params) -> String {
		params
			.iter()
			.map(|(name, value)| format!("{}={}", name, value))
			.collect::<Vec<_>>()
			.join(" ")
	}

	fn emit_comment(&mut self, comment: &str) -> Result<(), InterchangeError> {
		emitln!(self, "* {}", comment)?;
		Ok(())
	}

	fn emit_instance(&mut self, pkg: &Package, module: &Module, inst: &Instance) -> Result<(), InterchangeError> {
		let target = pkg.resolve(&inst.module)?;
		let conns = ordered_connections(module, inst, target)?;

		let mut params = inst.parameters.clone();
		let prefix = if target.is_primitive() {
			primitive_prefix(&target.name().name).ok_or_else(|| InterchangeError::UnknownPrimitive(target.name().name.clone()))?
		}
		else {
			'x'
		};
		emitln!(self, "{}{}", prefix, inst.name)?;

		if conns.is_empty() {
			emit!(self, "+ ")?;
			self.emit_comment("No ports")?;
		}
		else {
			let formatted = conns
				.iter()
				.map(|(_, conn)| Self::format_connection(module, conn))
				.collect::<Result<Vec<_>, _>>()?;
			emitln!(self, "+ {}", formatted.join(" "))?;
		}

		if !target.is_primitive() {
			emitln!(self, "+ {}", sanitize(&target.name().name))?;
		}
		else if let Some(ParamValue::String(model)) = params.remove("model") {
			// Primitive models are positional
			emitln!(self, "+ {}", model)?;
		}

		if params.is_empty() {
			emit!(self, "+ ")?;
			self.emit_comment("No parameters")?;
		}
		else {
			emitln!(self, "+ {}", Self::format_params(&params))?;
		}
		emitln!(self, "")?;
		Ok(())
	}
}

impl<'a> Netlister for SpiceNetlister<'a> {
	fn format(&self) -> NetlistFormat {
		NetlistFormat::Spice
	}

	fn write_header(&mut self, pkg: &Package) -> Result<(), InterchangeError> {
		self.emit_comment(&format!("Package: {}", pkg.domain))?;
		if let Some(desc) = &pkg.desc {
			self.emit_comment(desc)?;
		}
		emitln!(self, "")?;
		Ok(())
	}

	fn write_module(&mut self, pkg: &Package, module: &Module) -> Result<(), InterchangeError> {
		emitln!(self, ".SUBCKT {}", sanitize(&module.name.name))?;

		if module.ports.is_empty() {
			emit!(self, "+ ")?;
			self.emit_comment("No ports")?;
		}
		else {
			let ports: Vec<String> = module.ports.iter().map(|p| Self::format_signal(&p.signal)).collect();
			emitln!(self, "+ {}", ports.join(" "))?;
		}

		if module.parameters.is_empty() {
			emit!(self, "+ ")?;
			self.emit_comment("No parameters")?;
		}
		else {
			emitln!(self, "+ {}", Self::format_params(&module.parameters))?;
		}
		emitln!(self, "")?;

		for inst in &module.instances {
			self.emit_instance(pkg, module, inst)?;
		}

		emitln!(self, ".ENDS")?;
		emitln!(self, "")?;
		Ok(())
	}
}
