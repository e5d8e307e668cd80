use indexmap::IndexMap;
use interchange::{
	Concat, Connection, ExternalModule as PackageExternal, Instance as PackageInstance, Module as PackageModule,
	Package, Params, Port, PortDirection, QualifiedName, Reference, Signal as PackageSignal, Slice, PRIMITIVES_DOMAIN,
};
use log::debug;
use std::collections::HashSet;

use crate::design::{Connectable, Design, InstanceId, Instantiable, ModuleId, PortDir, Signal};
use crate::ExchangeError;

fn port_direction(dir: PortDir) -> PortDirection {
	match dir {
		PortDir::Input => PortDirection::Input,
		PortDir::Output => PortDirection::Output,
		PortDir::Inout => PortDirection::Inout,
		PortDir::None => PortDirection::None,
	}
}

fn export_port(sig: &Signal) -> Port {
	Port {
		signal: PackageSignal {
			name: sig.name.clone(),
			width: sig.width,
		},
		direction: port_direction(sig.direction),
	}
}

/// Converts an elaborated hierarchy into an interchange package
struct Exporter<'a> {
	design: &'a Design,
	domain: &'a str,
	modules: Vec<PackageModule>,
	done: HashSet<ModuleId>,
	ext_modules: IndexMap<QualifiedName, PackageExternal>,
}

impl<'a> Exporter<'a> {
	fn new(design: &'a Design, domain: &'a str) -> Self {
		Self {
			design,
			domain,
			modules: vec![],
			done: HashSet::new(),
			ext_modules: IndexMap::new(),
		}
	}

	fn qualified_name(&self, module: ModuleId) -> QualifiedName {
		let domain = self.design.module(module).domain.as_deref().unwrap_or(self.domain);
		QualifiedName::new(domain, self.design.module_name(module))
	}

	/// Exports `module` after everything it instantiates
	fn visit(&mut self, module: ModuleId) -> Result<(), ExchangeError> {
		if !self.done.insert(module) {
			return Ok(());
		}
		let design = self.design;
		if !design.module(module).elaborated {
			return Err(ExchangeError::NotElaborated(design.module_name(module).into()));
		}

		let insts = design.all_instances(module);
		for inst in &insts {
			if let Some(child) = design.target_module(&design.instance(*inst).of) {
				self.visit(child)?;
			}
		}

		let ports = design
			.ports(module)
			.into_iter()
			.map(|id| export_port(&design.signal(id).signal))
			.collect();
		let signals = design
			.internal_signals(module)
			.into_iter()
			.map(|id| {
				let sig = &design.signal(id).signal;
				PackageSignal {
					name: sig.name.clone(),
					width: sig.width,
				}
			})
			.collect();
		let instances = insts
			.into_iter()
			.map(|inst| self.export_instance(module, inst))
			.collect::<Result<Vec<_>, _>>()?;

		let name = self.qualified_name(module);
		debug!("Exporting module {}", name);
		self.modules.push(PackageModule {
			name,
			ports,
			signals,
			instances,
			parameters: design.module(module).params.clone(),
		});
		Ok(())
	}

	fn export_instance(&mut self, module: ModuleId, inst: InstanceId) -> Result<PackageInstance, ExchangeError> {
		let design = self.design;
		let entry = design.instance(inst);
		let (reference, parameters) = match &entry.of {
			Instantiable::Primitive(call) => {
				let name = QualifiedName::new(PRIMITIVES_DOMAIN, call.prim.name());
				self.ext_modules.entry(name.clone()).or_insert_with(|| PackageExternal {
					name: name.clone(),
					ports: call.prim.ports().iter().map(export_port).collect(),
					parameters: Params::new(),
				});
				(Reference::External(name), call.params.clone())
			},
			Instantiable::External(call) => {
				let ext = design.external_module(call.module);
				let name = QualifiedName::new(&ext.domain, &ext.name);
				self.ext_modules.entry(name.clone()).or_insert_with(|| PackageExternal {
					name: name.clone(),
					ports: ext.ports.iter().map(export_port).collect(),
					parameters: Params::new(),
				});
				(Reference::External(name), call.params.clone())
			},
			of => match design.target_module(of) {
				Some(target) => (Reference::Local(self.qualified_name(target)), Params::new()),
				None => {
					return Err(ExchangeError::UnresolvedTarget {
						instance: entry.name.clone(),
						module: design.module_name(module).into(),
					})
				},
			},
		};

		let mut connections = IndexMap::new();
		for (port, conn) in &entry.conns {
			let unlowered = |kind| ExchangeError::UnloweredConnection {
				kind,
				port: port.clone(),
				instance: entry.name.clone(),
				module: design.module_name(module).into(),
			};
			connections.insert(port.clone(), self.export_connection(*conn, &unlowered)?);
		}

		Ok(PackageInstance {
			name: entry.name.clone(),
			module: reference,
			parameters,
			connections,
		})
	}

	/// Converts a lowered connection
	fn export_connection(
		&self,
		conn: Connectable,
		unlowered: &dyn Fn(&'static str) -> ExchangeError,
	) -> Result<Connection, ExchangeError> {
		match conn {
			Connectable::Signal(id) => Ok(Connection::Sig(self.design.signal(id).signal.name.clone())),
			Connectable::Slice(id) => {
				let bounds = self.design.slice_bounds(id)?;
				match self.design.slice_entry(id).parent {
					Connectable::Signal(parent) if bounds.is_contiguous() => Ok(Connection::Slice(Slice {
						signal: self.design.signal(parent).signal.name.clone(),
						top: bounds.top() - 1,
						bot: bounds.bot(),
					})),
					_ => Err(unlowered(conn.kind_name())),
				}
			},
			Connectable::Concat(id) => {
				let parts = self
					.design
					.concat_entry(id)
					.parts
					.iter()
					.map(|part| self.export_connection(*part, unlowered))
					.collect::<Result<Vec<_>, _>>()?;
				Ok(Connection::Concat(Concat { parts }))
			},
			_ => Err(unlowered(conn.kind_name())),
		}
	}
}

/// Converts elaborated modules and everything below them into a package
///
/// Modules are listed children first. Modules without a domain of their
/// own are placed in `domain`.
pub fn to_package(design: &Design, roots: &[ModuleId], domain: &str) -> Result<Package, ExchangeError> {
	let mut exporter = Exporter::new(design, domain);
	for root in roots {
		exporter.visit(*root)?;
	}

	let mut pkg = Package::new(domain);
	pkg.modules = exporter.modules;
	pkg.ext_modules = exporter.ext_modules.into_values().collect();
	pkg.validate()?;
	Ok(pkg)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::design::{ExternalModule, ExternalModuleCall, Instance, InstanceArray, Primitive, PrimitiveCall};
	use crate::elab::elaborate;
	use interchange::{netlist, NetlistFormat, ParamValue};

	fn resistor(value: i64) -> PrimitiveCall {
		let mut params = Params::new();
		params.insert("r".into(), ParamValue::Int(value));
		PrimitiveCall::new(Primitive::Resistor, params)
	}

	fn divider(d: &mut Design) -> Result<ModuleId, ExchangeError> {
		let nch = d.add_external_module(ExternalModule::new(
			"pdk",
			"nch",
			vec![Signal::inout("d", 1), Signal::inout("g", 1), Signal::inout("s", 1)],
		))?;

		let cell = d.new_module("cell")?;
		let p = d.add_signal(cell, Signal::inout("p", 1))?;
		let n = d.add_signal(cell, Signal::inout("n", 1))?;
		d.add(cell, Instance::new("r0", resistor(100)).connect("p", p).connect("n", n))?;

		let top = d.new_module("top")?;
		let vdd = d.add_signal(top, Signal::inout("vdd", 1))?;
		let taps = d.add_signal(top, Signal::new("taps", 3))?;
		let upper = d.range(taps, 1, 3)?;
		d.add(top, InstanceArray::new("c", cell, 2).connect("p", vdd).connect("n", upper))?;
		let low = d.index(taps, 0)?;
		let call = ExternalModuleCall::new(nch, Params::new());
		d.add(top, Instance::new("m0", call).connect("d", low).connect("g", vdd).connect("s", vdd))?;
		Ok(top)
	}

	#[test]
	fn test_children_exported_first() -> Result<(), ExchangeError> {
		let mut d = Design::new();
		let top = divider(&mut d)?;
		let top = elaborate(&mut d, top)?;
		let pkg = to_package(&d, &[top], "lib")?;

		let names: Vec<String> = pkg.modules.iter().map(|m| m.name.to_string()).collect();
		assert_eq!(names, vec!["lib.cell", "lib.top"]);
		let ext: Vec<String> = pkg.ext_modules.iter().map(|e| e.name.to_string()).collect();
		assert_eq!(ext, vec!["hdl21.primitives.Resistor", "pdk.nch"]);

		let top = &pkg.modules[1];
		assert_eq!(top.ports[0].direction, PortDirection::Inout);
		assert_eq!(top.instances[0].name, "c_0");
		assert_eq!(
			top.instances[0].connections["n"],
			Connection::Slice(Slice {
				signal: "taps".into(),
				top: 1,
				bot: 1
			})
		);
		assert_eq!(
			top.instances[2].connections["d"],
			Connection::Slice(Slice {
				signal: "taps".into(),
				top: 0,
				bot: 0
			})
		);
		assert_eq!(pkg.modules[0].instances[0].parameters["r"], ParamValue::Int(100));
		Ok(())
	}

	#[test]
	fn test_exported_package_netlists() -> Result<(), ExchangeError> {
		let mut d = Design::new();
		let top = divider(&mut d)?;
		let top = elaborate(&mut d, top)?;
		let pkg = to_package(&d, &[top], "lib")?;

		let mut out = String::new();
		netlist(&pkg, NetlistFormat::Spice, &mut out)?;
		assert!(out.contains(".SUBCKT cell"));
		assert!(out.contains(".SUBCKT top"));
		Ok(())
	}

	#[test]
	fn test_unelaborated_module_rejected() -> Result<(), ExchangeError> {
		let mut d = Design::new();
		let top = divider(&mut d)?;
		assert!(matches!(to_package(&d, &[top], "lib"), Err(ExchangeError::NotElaborated(_))));
		Ok(())
	}
}
