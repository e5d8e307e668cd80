use indexmap::IndexMap;

use super::{
	BundleAttr, BundleId, BundlePath, BundleRefId, BundleRefParent, Connectable, Design, DesignError, InstanceId,
	Instantiable, IoEntry, IoView, Signal,
};

/// Shape of a connectable value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnShape {
	Scalar(usize),
	/// Bundle-valued; anonymous bundles have no definition
	Bundle(Option<BundleId>),
	NoConn,
}

/// Shape of a port of an instance target
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortShape {
	Signal(Signal),
	Bundle(BundleId),
}

impl PortShape {
	pub fn is_bundle(&self) -> bool {
		matches!(self, PortShape::Bundle(_))
	}
}

impl Design {
	/// Bit width of a scalar connectable
	pub fn width(&self, conn: impl Into<Connectable>) -> Result<usize, DesignError> {
		let conn = conn.into();
		match conn {
			Connectable::Signal(id) => Ok(self.signal(id).signal.width),
			Connectable::Slice(id) => Ok(self.slice_bounds(id)?.width),
			Connectable::Concat(id) => {
				let parts = &self.concat_entry(id).parts;
				if parts.is_empty() {
					return Err(DesignError::EmptyConcat);
				}
				parts.iter().map(|p| self.width(*p)).sum()
			},
			Connectable::PortRef(id) => {
				let entry = self.port_ref_entry(id);
				match entry.resolved {
					Some(resolved) => self.width(resolved),
					None => match self.port_shape(entry.inst, &entry.portname, IoView::PreFlattening)? {
						PortShape::Signal(sig) => Ok(sig.width),
						PortShape::Bundle(_) => Err(DesignError::NotScalar(format!("Port `{}`", entry.portname))),
					},
				}
			},
			Connectable::BundleRef(id) => {
				let entry = self.bundle_ref_entry(id);
				match entry.resolved {
					Some(resolved) => self.width(resolved),
					None => match self.bundle_ref_shape(id)? {
						PortShape::Signal(sig) => Ok(sig.width),
						PortShape::Bundle(_) => Err(DesignError::NotScalar(format!("Bundle attribute `{}`", entry.attr))),
					},
				}
			},
			Connectable::NoConn(_) | Connectable::BundleInstance(_) | Connectable::AnonymousBundle(_) => {
				Err(DesignError::NotScalar(conn.kind_name().into()))
			},
		}
	}

	/// Classifies a connectable as scalar, bundle-valued or no-connect
	pub fn conn_shape(&self, conn: Connectable) -> Result<ConnShape, DesignError> {
		Ok(match conn {
			Connectable::NoConn(_) => ConnShape::NoConn,
			Connectable::BundleInstance(id) => ConnShape::Bundle(Some(self.bundle_instance(id).inst.of)),
			Connectable::AnonymousBundle(_) => ConnShape::Bundle(None),
			Connectable::PortRef(id) => {
				let entry = self.port_ref_entry(id);
				match entry.resolved {
					Some(resolved) => self.conn_shape(resolved)?,
					None => match self.port_shape(entry.inst, &entry.portname, IoView::PreFlattening)? {
						PortShape::Signal(sig) => ConnShape::Scalar(sig.width),
						PortShape::Bundle(b) => ConnShape::Bundle(Some(b)),
					},
				}
			},
			Connectable::BundleRef(id) => match self.bundle_ref_entry(id).resolved {
				Some(resolved) => self.conn_shape(resolved)?,
				None => match self.bundle_ref_shape(id)? {
					PortShape::Signal(sig) => ConnShape::Scalar(sig.width),
					PortShape::Bundle(b) => ConnShape::Bundle(Some(b)),
				},
			},
			Connectable::Signal(_) | Connectable::Slice(_) | Connectable::Concat(_) => ConnShape::Scalar(self.width(conn)?),
		})
	}

	/// Ports of an instance target, in declaration order
	///
	/// Generator calls must already be expanded.
	pub fn target_io(&self, of: &Instantiable, view: IoView) -> Result<IndexMap<String, PortShape>, DesignError> {
		let signals_io = |ports: &[Signal]| -> IndexMap<String, PortShape> {
			ports.iter().map(|s| (s.name.clone(), PortShape::Signal(s.clone()))).collect()
		};
		let module_io = |module| -> IndexMap<String, PortShape> {
			self.io(module, view)
				.into_iter()
				.map(|(name, entry)| {
					let shape = match entry {
						IoEntry::Signal(id) => PortShape::Signal(self.signal(id).signal.clone()),
						IoEntry::Bundle(id) => PortShape::Bundle(self.bundle_instance(id).inst.of),
					};
					(name, shape)
				})
				.collect()
		};

		match of {
			Instantiable::Module(m) => Ok(module_io(*m)),
			Instantiable::Generator(call) => {
				let entry = self.generator_call(*call);
				match entry.result {
					Some(m) => Ok(module_io(m)),
					None => Err(DesignError::UnresolvedTarget(
						self.generator(entry.call.generator).name.clone(),
					)),
				}
			},
			Instantiable::Primitive(call) => Ok(signals_io(&call.prim.ports())),
			Instantiable::External(call) => Ok(signals_io(&self.external_module(call.module).ports)),
		}
	}

	/// Human-readable name of an instance target
	pub fn target_name(&self, of: &Instantiable) -> String {
		match of {
			Instantiable::Module(m) => self.module_name(*m).into(),
			Instantiable::Generator(call) => {
				let entry = self.generator_call(*call);
				match entry.result {
					Some(m) => self.module_name(m).into(),
					None => self.generator(entry.call.generator).name.clone(),
				}
			},
			Instantiable::Primitive(call) => call.prim.name().into(),
			Instantiable::External(call) => self.external_module(call.module).name.clone(),
		}
	}

	/// Shape of a single port of an instance
	pub fn port_shape(&self, inst: InstanceId, port: &str, view: IoView) -> Result<PortShape, DesignError> {
		let of = &self.instance(inst).of;
		self.target_io(of, view)?
			.shift_remove(port)
			.ok_or_else(|| DesignError::UnknownPort {
				port: port.into(),
				target: self.target_name(of),
			})
	}

	/// Shape of the attribute a bundle reference points at
	pub fn bundle_ref_shape(&self, id: BundleRefId) -> Result<PortShape, DesignError> {
		let entry = self.bundle_ref_entry(id);
		let bundle = match entry.parent {
			BundleRefParent::BundleInstance(bi) => self.bundle_instance(bi).inst.of,
			BundleRefParent::BundleRef(parent) => match self.bundle_ref_shape(parent)? {
				PortShape::Bundle(b) => b,
				PortShape::Signal(sig) => return Err(DesignError::NotABundle(sig.name)),
			},
			BundleRefParent::PortRef(pr) => {
				let pr = self.port_ref_entry(pr);
				match self.port_shape(pr.inst, &pr.portname, IoView::PreFlattening)? {
					PortShape::Bundle(b) => b,
					PortShape::Signal(sig) => return Err(DesignError::NotABundle(sig.name)),
				}
			},
		};

		let def = self.bundle(bundle);
		match def.namespace.get(&entry.attr) {
			Some(BundleAttr::Signal(s)) => Ok(PortShape::Signal(self.signal(*s).signal.clone())),
			Some(BundleAttr::Bundle(bi)) => Ok(PortShape::Bundle(self.bundle_instance(*bi).inst.of)),
			None => Err(DesignError::UnknownBundleAttr {
				bundle: def.name.clone(),
				attr: entry.attr.clone(),
			}),
		}
	}

	/// Walks a bundle reference up to the item it is rooted at
	///
	/// Returns the root and the attribute path from it.
	pub fn bundle_ref_path(&self, id: BundleRefId) -> (BundleRefParent, BundlePath) {
		let mut segments = vec![];
		let mut current = id;
		loop {
			let entry = self.bundle_ref_entry(current);
			segments.push(entry.attr.clone());
			match entry.parent {
				BundleRefParent::BundleRef(parent) => current = parent,
				root => {
					segments.reverse();
					return (root, BundlePath(segments));
				},
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::design::{BundleInstance, Instance, Primitive, PrimitiveCall, Params};

	#[test]
	fn test_concat_and_slice_widths() -> Result<(), DesignError> {
		let mut d = Design::new();
		let m = d.new_module("m")?;
		let a = d.add_signal(m, Signal::new("a", 8))?;
		let b = d.add_signal(m, Signal::new("b", 3))?;
		let s = d.range(a, 2, 6)?;
		let c = d.concat(vec![s.into(), b.into()])?;
		assert_eq!(d.width(s)?, 4);
		assert_eq!(d.width(c)?, 7);
		let empty = d.concat(vec![])?;
		assert!(matches!(d.width(empty), Err(DesignError::EmptyConcat)));
		Ok(())
	}

	#[test]
	fn test_reference_shapes() -> Result<(), DesignError> {
		let mut d = Design::new();
		let diff = d.new_bundle("Diff")?;
		d.add_to_bundle(diff, Signal::new("p", 2))?;
		d.add_to_bundle(diff, Signal::new("n", 2))?;
		let leaf = d.new_module("leaf")?;
		d.add(leaf, Signal::input("clk", 1))?;
		d.add(leaf, BundleInstance::port("d", diff, None))?;

		let top = d.new_module("top")?;
		let i = d.add_instance(top, Instance::new("i", leaf))?;
		let clk = d.port_ref(i, "clk")?;
		let bus = d.port_ref(i, "d")?;
		let p = d.bundle_ref(bus, "p")?;
		assert_eq!(d.width(clk)?, 1);
		assert_eq!(d.conn_shape(bus.into())?, ConnShape::Bundle(Some(diff)));
		assert_eq!(d.width(p)?, 2);
		assert!(matches!(d.width(bus), Err(DesignError::NotScalar(_))));

		let bad = d.port_ref(i, "nope")?;
		assert!(matches!(d.width(bad), Err(DesignError::UnknownPort { .. })));
		let (root, path) = d.bundle_ref_path(p);
		assert_eq!(root, BundleRefParent::PortRef(bus));
		assert_eq!(path.to_string(), "p");
		Ok(())
	}

	#[test]
	fn test_primitive_io() -> Result<(), DesignError> {
		let d = Design::new();
		let io = d.target_io(
			&PrimitiveCall::new(Primitive::Mos, Params::new()).into(),
			IoView::Current,
		)?;
		assert_eq!(io.keys().collect::<Vec<_>>(), vec!["d", "g", "s", "b"]);
		Ok(())
	}
}
