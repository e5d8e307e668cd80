use std::fmt;
use std::fmt::Write;

use super::{ordered_connections, sanitize, NetlistFormat, Netlister};
use crate::{Connection, Instance, InterchangeError, Module, Package, ParamValue, PortDirection};

/// Structural Verilog netlister
pub struct VerilogNetlister<'a> {
	indent_level: u32,
	output_stream: &'a mut dyn fmt::Write,
}

impl<'a> VerilogNetlister<'a> {
	pub fn new(w: &'a mut dyn fmt::Write) -> Self {
		Self {
			indent_level: 0,
			output_stream: w,
		}
	}

	fn begin_indent(&mut self) {
		self.indent_level += 1;
	}

	fn end_indent(&mut self) {
		assert!(self.indent_level > 0);
		self.indent_level -= 1;
	}

	fn format_param_value(value: &ParamValue) -> String {
		match value {
			ParamValue::String(s) => format!("\"{}\"", s),
			other => other.to_string(),
		}
	}

	fn format_width(width: usize) -> String {
		if width == 1 {
			String::new()
		}
		else {
			format!(" [{}:0]", width - 1)
		}
	}

	fn format_connection(conn: &Connection) -> String {
		match conn {
			Connection::Sig(name) => name.clone(),
			Connection::Slice(s) if s.top == s.bot => format!("{}[{}]", s.signal, s.top),
			Connection::Slice(s) => format!("{}[{}:{}]", s.signal, s.top, s.bot),
			Connection::Concat(c) => {
				// Verilog concatenations list the most significant part first
				let parts: Vec<String> = c.parts.iter().rev().map(Self::format_connection).collect();
				format!("{{{}}}", parts.join(", "))
			},
		}
	}

	fn emit_instance(&mut self, pkg: &Package, module: &Module, inst: &Instance) -> Result<(), InterchangeError> {
		let target = pkg.resolve(&inst.module)?;
		if target.is_primitive() {
			return Err(InterchangeError::PrimitiveInVerilog {
				instance: inst.name.clone(),
				primitive: target.name().name.clone(),
			});
		}
		let conns = ordered_connections(module, inst, target)?;

		let target_name = sanitize(&target.name().name);
		if inst.parameters.is_empty() {
			emitln!(self, "{} {} (", target_name, inst.name)?;
		}
		else {
			emitln!(self, "{} #(", target_name)?;
			self.begin_indent();
			let count = inst.parameters.len();
			for (i, (name, value)) in inst.parameters.iter().enumerate() {
				let sep = if i + 1 < count { "," } else { "" };
				emitln!(self, ".{}({}){}", name, Self::format_param_value(value), sep)?;
			}
			self.end_indent();
			emitln!(self, ") {} (", inst.name)?;
		}

		self.begin_indent();
		let count = conns.len();
		for (i, (port, conn)) in conns.iter().enumerate() {
			let sep = if i + 1 < count { "," } else { "" };
			emitln!(self, ".{}({}){}", port.signal.name, Self::format_connection(conn), sep)?;
		}
		self.end_indent();
		emitln!(self, ");")?;
		Ok(())
	}
}

impl<'a> Netlister for VerilogNetlister<'a> {
	fn format(&self) -> NetlistFormat {
		NetlistFormat::Verilog
	}

	fn write_header(&mut self, pkg: &Package) -> Result<(), InterchangeError> {
		emitln!(self, "// Package: {}", pkg.domain)?;
		if let Some(desc) = &pkg.desc {
			emitln!(self, "// {}", desc)?;
		}
		emitln!(self, "")?;
		Ok(())
	}

	fn write_module(&mut self, pkg: &Package, module: &Module) -> Result<(), InterchangeError> {
		let name = sanitize(&module.name.name);

		if module.parameters.is_empty() {
			emitln!(self, "module {} (", name)?;
		}
		else {
			emitln!(self, "module {} #(", name)?;
			self.begin_indent();
			let count = module.parameters.len();
			for (i, (pname, value)) in module.parameters.iter().enumerate() {
				let sep = if i + 1 < count { "," } else { "" };
				emitln!(self, "parameter {} = {}{}", pname, Self::format_param_value(value), sep)?;
			}
			self.end_indent();
			emitln!(self, ") (")?;
		}

		self.begin_indent();
		let count = module.ports.len();
		for (i, port) in module.ports.iter().enumerate() {
			let dir = match port.direction {
				PortDirection::Input => "input",
				PortDirection::Output => "output",
				PortDirection::Inout => "inout",
				PortDirection::None => {
					return Err(InterchangeError::UndirectedPort {
						module: module.name.name.clone(),
						port: port.signal.name.clone(),
					})
				},
			};
			let sep = if i + 1 < count { "," } else { "" };
			emitln!(
				self,
				"{} wire{} {}{}",
				dir,
				Self::format_width(port.signal.width),
				port.signal.name,
				sep
			)?;
		}
		self.end_indent();
		emitln!(self, ");")?;

		self.begin_indent();
		if !module.signals.is_empty() {
			emitln!(self, "")?;
			for sig in &module.signals {
				emitln!(self, "wire{} {};", Self::format_width(sig.width), sig.name)?;
			}
		}

		for inst in &module.instances {
			emitln!(self, "")?;
			self.emit_instance(pkg, module, inst)?;
		}
		self.end_indent();

		emitln!(self, "")?;
		emitln!(self, "endmodule // {}", name)?;
		emitln!(self, "")?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{netlist, Concat, ExternalModule, NetlistFormat, Params, Port, QualifiedName, Reference, Signal, Slice};
	use indexmap::IndexMap;

	fn port(name: &str, width: usize, direction: PortDirection) -> Port {
		Port {
			signal: Signal { name: name.into(), width },
			direction,
		}
	}

	fn package() -> Package {
		let mut pkg = Package::new("test");
		pkg.modules.push(Module {
			name: QualifiedName::new("test", "leaf"),
			ports: vec![port("a", 4, PortDirection::Input), port("y", 1, PortDirection::Output)],
			signals: vec![],
			instances: vec![],
			parameters: Params::new(),
		});

		let mut connections = IndexMap::new();
		connections.insert("y".into(), Connection::Sig("z".into()));
		connections.insert(
			"a".into(),
			Connection::Concat(Concat {
				parts: vec![
					Connection::Slice(Slice {
						signal: "bus".into(),
						top: 2,
						bot: 0,
					}),
					Connection::Sig("z".into()),
				],
			}),
		);
		pkg.modules.push(Module {
			name: QualifiedName::new("test", "top(w=4)"),
			ports: vec![port("bus", 3, PortDirection::Input)],
			signals: vec![Signal { name: "z".into(), width: 1 }],
			instances: vec![Instance {
				name: "u".into(),
				module: Reference::Local(QualifiedName::new("test", "leaf")),
				parameters: Params::new(),
				connections,
			}],
			parameters: Params::new(),
		});
		pkg
	}

	#[test]
	fn test_instance_uses_target_port_order() -> Result<(), InterchangeError> {
		let mut out = String::new();
		netlist(&package(), NetlistFormat::Verilog, &mut out)?;
		assert!(out.contains("module top_w_4_ ("));
		assert!(out.contains("\tinput wire [2:0] bus\n"));
		assert!(out.contains("\twire z;\n"));
		let a = out.find(".a({z, bus[2:0]}),").unwrap();
		let y = out.find(".y(z)").unwrap();
		assert!(a < y);
		Ok(())
	}

	#[test]
	fn test_unconnected_port() {
		let mut pkg = package();
		pkg.modules[1].instances[0].connections.shift_remove("y");
		let mut out = String::new();
		let res = netlist(&pkg, NetlistFormat::Verilog, &mut out);
		assert!(matches!(res, Err(InterchangeError::UnconnectedPort { .. })));
	}

	#[test]
	fn test_undirected_port() {
		let mut pkg = package();
		pkg.modules[0].ports[1].direction = PortDirection::None;
		let mut out = String::new();
		let res = netlist(&pkg, NetlistFormat::Verilog, &mut out);
		assert!(matches!(res, Err(InterchangeError::UndirectedPort { .. })));
	}

	#[test]
	fn test_external_module_with_params() -> Result<(), InterchangeError> {
		let mut pkg = package();
		pkg.ext_modules.push(ExternalModule {
			name: QualifiedName::new("vendor", "buf"),
			ports: vec![port("i", 1, PortDirection::Input)],
			parameters: Params::new(),
		});
		let mut conns = IndexMap::new();
		conns.insert("i".into(), Connection::Sig("z".into()));
		let mut params = Params::new();
		params.insert("drive".into(), ParamValue::Int(2));
		params.insert("corner".into(), ParamValue::String("tt".into()));
		pkg.modules[1].instances.push(Instance {
			name: "b".into(),
			module: Reference::External(QualifiedName::new("vendor", "buf")),
			parameters: params,
			connections: conns,
		});

		let mut out = String::new();
		netlist(&pkg, NetlistFormat::Verilog, &mut out)?;
		assert!(out.contains("\tbuf #(\n\t\t.corner(\"tt\"),\n\t\t.drive(2)\n\t) b (\n"));
		Ok(())
	}
}
