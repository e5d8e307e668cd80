use std::collections::BTreeMap;

use crate::design::{
	BundleAttr, BundleId, BundlePath, ConnShape, Connectable, Design, InstanceId, InstanceKind, IoView, ModuleId,
	PortShape,
};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Checks that every instance connects exactly its target's ports with
/// compatible values
pub(super) struct ConnTypesPass {
	view: IoView,
}

impl ConnTypesPass {
	pub fn new(view: IoView) -> Self {
		Self { view }
	}
}

/// Leaf signal widths of a bundle, keyed by path
fn leaf_widths(design: &Design, bundle: BundleId) -> BTreeMap<BundlePath, usize> {
	design
		.bundle_leaves(bundle)
		.into_iter()
		.map(|(path, sig)| (path, design.signal(sig).signal.width))
		.collect()
}

/// Checks that two bundles have the same leaf names and widths
fn bundles_compatible(design: &Design, a: BundleId, b: BundleId) -> bool {
	a == b || leaf_widths(design, a) == leaf_widths(design, b)
}

struct ConnCheck<'a> {
	design: &'a Design,
	module: ModuleId,
	inst: InstanceId,
}

impl<'a> ConnCheck<'a> {
	fn instance_name(&self) -> String {
		self.design.instance(self.inst).name.clone()
	}

	fn invalid(&self, port: &str, reason: String) -> ElabErrorKind {
		ElabErrorKind::InvalidConnection {
			port: port.into(),
			instance: self.instance_name(),
			reason,
		}
	}

	fn bundle_mismatch(&self, port: &str, reason: String) -> ElabErrorKind {
		ElabErrorKind::BundleTypeMismatch {
			port: port.into(),
			instance: self.instance_name(),
			reason,
		}
	}

	/// Checks that anonymous bundle members fit into `bundle`
	fn check_anonymous(&self, port: &str, conn: Connectable, bundle: BundleId) -> Result<(), ElabErrorKind> {
		let d = self.design;
		let Connectable::AnonymousBundle(ab) = conn
		else {
			return Ok(());
		};
		let def = d.bundle(bundle);
		for (name, member) in &d.anonymous_bundle(ab).members {
			let shape = d.conn_shape(*member)?;
			match (def.namespace.get(name), shape) {
				(None, _) => {
					return Err(self.bundle_mismatch(
						port,
						format!("Bundle `{}` has no signal `{}`", def.name, name),
					))
				},
				(Some(BundleAttr::Signal(s)), ConnShape::Scalar(w)) => {
					let expected = d.signal(*s).signal.width;
					if w != expected {
						return Err(self.bundle_mismatch(
							port,
							format!("member `{}` is {} bits, expected {}", name, w, expected),
						));
					}
				},
				(Some(BundleAttr::Bundle(bi)), ConnShape::Bundle(sub)) => {
					let expected = d.bundle_instance(*bi).inst.of;
					match sub {
						Some(sub) if !bundles_compatible(d, sub, expected) => {
							return Err(self.bundle_mismatch(port, format!("member `{}` has an incompatible bundle", name)))
						},
						Some(_) => {},
						None => self.check_anonymous(port, *member, expected)?,
					}
				},
				(Some(_), ConnShape::NoConn) => {},
				(Some(_), _) => {
					return Err(self.bundle_mismatch(port, format!("member `{}` has the wrong shape", name)));
				},
			}
		}
		Ok(())
	}

	fn check_port(&self, port: &str, shape: &PortShape, conn: Connectable) -> Result<(), ElabErrorKind> {
		let d = self.design;
		let conn_shape = d.conn_shape(conn)?;
		match (shape, conn_shape) {
			(_, ConnShape::NoConn) => Ok(()),
			(PortShape::Signal(sig), ConnShape::Scalar(width)) => {
				match d.instance(self.inst).kind {
					InstanceKind::Array(n) if width != sig.width && width != sig.width * n => {
						Err(ElabErrorKind::ArrayWidthMismatch {
							port: port.into(),
							instance: self.instance_name(),
							width,
							port_width: sig.width,
							array_width: sig.width * n,
						})
					},
					InstanceKind::Array(_) => Ok(()),
					_ if width != sig.width => Err(ElabErrorKind::WidthMismatch {
						port: port.into(),
						instance: self.instance_name(),
						width,
						port_width: sig.width,
					}),
					_ => Ok(()),
				}
			},
			(PortShape::Signal(_), ConnShape::Bundle(_)) => {
				Err(self.invalid(port, format!("{} connected to a scalar port", conn.kind_name())))
			},
			(PortShape::Bundle(b), ConnShape::Bundle(Some(of))) => {
				if bundles_compatible(d, *b, of) {
					Ok(())
				}
				else {
					Err(self.bundle_mismatch(
						port,
						format!("expected Bundle `{}`, got `{}`", d.bundle(*b).name, d.bundle(of).name),
					))
				}
			},
			(PortShape::Bundle(b), ConnShape::Bundle(None)) => self.check_anonymous(port, conn, *b),
			(PortShape::Bundle(b), ConnShape::Scalar(_)) => Err(self.bundle_mismatch(
				port,
				format!("{} connected where Bundle `{}` is expected", conn.kind_name(), d.bundle(*b).name),
			)),
		}
	}

	fn check(&self, view: IoView) -> Result<(), ElabErrorKind> {
		let d = self.design;
		let entry = d.instance(self.inst);
		let io = d.target_io(&entry.of, view)?;

		for (port, shape) in &io {
			match entry.conns.get(port) {
				Some(conn) => self.check_port(port, shape, *conn)?,
				None if shape.is_bundle() && entry.portrefs.contains_key(port) => {},
				None => {
					return Err(ElabErrorKind::UnconnectedPort {
						port: port.clone(),
						instance: entry.name.clone(),
						module: d.module_name(self.module).into(),
					})
				},
			}
		}

		let extra: Vec<String> = entry.conns.keys().filter(|p| !io.contains_key(*p)).cloned().collect();
		if !extra.is_empty() {
			return Err(ElabErrorKind::InvalidPort {
				ports: extra,
				instance: entry.name.clone(),
				module: d.module_name(self.module).into(),
			});
		}
		Ok(())
	}
}

impl ElabPass for ConnTypesPass {
	fn name(&self) -> &'static str {
		match self.view {
			IoView::PreFlattening => "ConnTypes(1)",
			IoView::Current => "ConnTypes(2)",
		}
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		for inst in ctx.design.all_instances(module) {
			let check = ConnCheck {
				design: &*ctx.design,
				module,
				inst,
			};
			check.check(self.view).map_err(|kind| ctx.fail(kind))?;
		}
		Ok(())
	}
}
