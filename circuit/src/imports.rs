use indexmap::IndexMap;
use interchange::{
	Connection, InterchangeError, Package, Port, PortDirection, QualifiedName, Reference, PRIMITIVES_DOMAIN,
};
use log::{debug, warn};

use crate::design::{
	Connectable, Design, ExternalModule, ExternalModuleCall, ExternalModuleId, Instance, Instantiable, ModuleAttr,
	ModuleId, PortDir, Primitive, PrimitiveCall, Signal, SignalId,
};
use crate::ExchangeError;

/// Design rebuilt from a package
pub struct Imported {
	pub design: Design,
	/// Modules by qualified name, in package order
	pub modules: IndexMap<QualifiedName, ModuleId>,
}

impl Imported {
	/// Every imported module, in package order
	pub fn roots(&self) -> Vec<ModuleId> {
		self.modules.values().copied().collect()
	}
}

#[derive(Clone, Copy)]
enum ExternalTarget {
	Primitive(Primitive),
	External(ExternalModuleId),
}

fn port_dir(dir: PortDirection) -> PortDir {
	match dir {
		PortDirection::Input => PortDir::Input,
		PortDirection::Output => PortDir::Output,
		PortDirection::Inout => PortDir::Inout,
		PortDirection::None => PortDir::None,
	}
}

fn import_port(port: &Port) -> Signal {
	Signal::port(&port.signal.name, port.signal.width).with_direction(port_dir(port.direction))
}

fn lookup_signal(design: &Design, module: ModuleId, name: &str) -> Result<SignalId, InterchangeError> {
	match design.get(module, name) {
		Some(ModuleAttr::Signal(id)) => Ok(id),
		_ => Err(InterchangeError::UnknownSignal {
			module: design.module_name(module).into(),
			signal: name.into(),
		}),
	}
}

fn import_connection(design: &mut Design, module: ModuleId, conn: &Connection) -> Result<Connectable, ExchangeError> {
	match conn {
		Connection::Sig(name) => Ok(lookup_signal(design, module, name)?.into()),
		Connection::Slice(slice) => {
			let parent = lookup_signal(design, module, &slice.signal)?;
			Ok(design.range(parent, slice.bot as isize, slice.top as isize + 1)?.into())
		},
		Connection::Concat(concat) => {
			let mut parts = Vec::with_capacity(concat.parts.len());
			for part in &concat.parts {
				parts.push(import_connection(design, module, part)?);
			}
			Ok(design.concat(parts)?.into())
		},
	}
}

/// Rebuilds a design from a package
///
/// References must resolve to a module or an external module of the
/// package. External modules of the primitives domain become primitives.
pub fn from_package(pkg: &Package) -> Result<Imported, ExchangeError> {
	pkg.validate()?;
	let mut design = Design::new();

	let mut externals = IndexMap::new();
	for ext in &pkg.ext_modules {
		let target = if ext.name.domain == PRIMITIVES_DOMAIN {
			let prim = Primitive::from_name(&ext.name.name)
				.ok_or_else(|| InterchangeError::UnknownPrimitive(ext.name.name.clone()))?;
			ExternalTarget::Primitive(prim)
		}
		else {
			let ports = ext.ports.iter().map(import_port).collect();
			ExternalTarget::External(design.add_external_module(ExternalModule::new(
				&ext.name.domain,
				&ext.name.name,
				ports,
			))?)
		};
		externals.insert(ext.name.clone(), target);
	}

	let mut modules = IndexMap::new();
	for module in &pkg.modules {
		let id = design.new_module(&module.name.name)?;
		let entry = design.module_mut(id);
		entry.domain = Some(module.name.domain.clone());
		entry.params = module.parameters.clone();
		modules.insert(module.name.clone(), id);
	}

	for module in &pkg.modules {
		let id = modules[&module.name];
		debug!("Importing module {}", module.name);
		for port in &module.ports {
			design.add_signal(id, import_port(port))?;
		}
		for sig in &module.signals {
			design.add_signal(id, Signal::new(&sig.name, sig.width))?;
		}

		for inst in &module.instances {
			let of: Instantiable = match &inst.module {
				Reference::Local(name) => {
					let target = modules
						.get(name)
						.ok_or_else(|| InterchangeError::UnknownReference(inst.module.clone()))?;
					if !inst.parameters.is_empty() {
						warn!("Ignoring parameters of instance `{}` of local module {}", inst.name, name);
					}
					(*target).into()
				},
				Reference::External(name) => {
					match externals
						.get(name)
						.ok_or_else(|| InterchangeError::UnknownReference(inst.module.clone()))?
					{
						ExternalTarget::Primitive(prim) => PrimitiveCall::new(*prim, inst.parameters.clone()).into(),
						ExternalTarget::External(ext) => ExternalModuleCall::new(*ext, inst.parameters.clone()).into(),
					}
				},
			};

			let mut instance = Instance::new(&inst.name, of);
			for (port, conn) in &inst.connections {
				let conn = import_connection(&mut design, id, conn)?;
				instance = instance.connect(port, conn);
			}
			design.add_instance(id, instance)?;
		}
	}

	Ok(Imported { design, modules })
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::elab::{elaborate_all, Elaboratable};
	use crate::exports::to_package;
	use interchange::{
		Concat, ExternalModule as PackageExternal, Instance as PackageInstance, Module, ParamValue, Params, Slice,
	};

	fn port(name: &str, width: usize, direction: PortDirection) -> Port {
		Port {
			signal: interchange::Signal {
				name: name.into(),
				width,
			},
			direction,
		}
	}

	fn package() -> Package {
		let mut pkg = Package::new("lib");
		pkg.ext_modules.push(PackageExternal {
			name: QualifiedName::new(PRIMITIVES_DOMAIN, "Capacitor"),
			ports: vec![port("p", 1, PortDirection::None), port("n", 1, PortDirection::None)],
			parameters: Params::new(),
		});

		let mut cap_conns = IndexMap::new();
		cap_conns.insert("p".into(), Connection::Sig("a".into()));
		cap_conns.insert("n".into(), Connection::Sig("b".into()));
		let mut cap_params = Params::new();
		cap_params.insert("c".into(), ParamValue::Double(1e-15));
		pkg.modules.push(Module {
			name: QualifiedName::new("cells", "cap"),
			ports: vec![port("a", 1, PortDirection::Inout), port("b", 1, PortDirection::Inout)],
			signals: vec![],
			instances: vec![PackageInstance {
				name: "c0".into(),
				module: Reference::External(QualifiedName::new(PRIMITIVES_DOMAIN, "Capacitor")),
				parameters: cap_params,
				connections: cap_conns,
			}],
			parameters: Params::new(),
		});

		let mut top_conns = IndexMap::new();
		top_conns.insert(
			"a".into(),
			Connection::Slice(Slice {
				signal: "bus".into(),
				top: 2,
				bot: 2,
			}),
		);
		top_conns.insert(
			"b".into(),
			Connection::Concat(Concat {
				parts: vec![Connection::Slice(Slice {
					signal: "bus".into(),
					top: 0,
					bot: 0,
				})],
			}),
		);
		pkg.modules.push(Module {
			name: QualifiedName::new("lib", "top"),
			ports: vec![port("bus", 4, PortDirection::Input)],
			signals: vec![interchange::Signal {
				name: "x".into(),
				width: 2,
			}],
			instances: vec![PackageInstance {
				name: "u0".into(),
				module: Reference::Local(QualifiedName::new("cells", "cap")),
				parameters: Params::new(),
				connections: top_conns,
			}],
			parameters: Params::new(),
		});
		pkg
	}

	#[test]
	fn test_import_keeps_domains() -> Result<(), ExchangeError> {
		let imported = from_package(&package())?;
		let cap = imported.modules[&QualifiedName::new("cells", "cap")];
		let d = &imported.design;
		assert_eq!(d.module(cap).domain.as_deref(), Some("cells"));
		assert_eq!(d.module_name(cap), "cap");
		assert!(d.module(cap).params.is_empty());

		let inst = d.instances(cap)[0];
		let Instantiable::Primitive(call) = &d.instance(inst).of
		else {
			panic!("expected a primitive instance");
		};
		assert_eq!(call.prim, Primitive::Capacitor);
		Ok(())
	}

	#[test]
	fn test_elaborated_round_trip() -> Result<(), ExchangeError> {
		let mut pkg = package();
		pkg.modules[0].parameters.insert("c".into(), ParamValue::Double(1e-15));
		let mut imported = from_package(&pkg)?;
		let roots: Vec<Elaboratable> = imported.roots().into_iter().map(Elaboratable::from).collect();
		let tops = elaborate_all(&mut imported.design, &roots)?;
		let exported = to_package(&imported.design, &tops, &pkg.domain)?;

		// Single-part concatenations collapse during elaboration
		let mut expected = pkg;
		expected.modules[1].instances[0].connections.insert(
			"b".into(),
			Connection::Slice(Slice {
				signal: "bus".into(),
				top: 0,
				bot: 0,
			}),
		);
		assert_eq!(exported, expected);
		Ok(())
	}

	#[test]
	fn test_unknown_reference_rejected() {
		let mut pkg = package();
		pkg.modules[1].instances[0].module = Reference::Local(QualifiedName::new("lib", "cap"));
		assert!(matches!(
			from_package(&pkg),
			Err(ExchangeError::Interchange(InterchangeError::UnknownReference(_)))
		));
	}

	#[test]
	fn test_unknown_primitive_rejected() {
		let mut pkg = package();
		pkg.ext_modules[0].name = QualifiedName::new(PRIMITIVES_DOMAIN, "Memristor");
		pkg.modules[0].instances[0].module = Reference::External(pkg.ext_modules[0].name.clone());
		assert!(matches!(
			from_package(&pkg),
			Err(ExchangeError::Interchange(InterchangeError::UnknownPrimitive(_)))
		));
	}
}
