use indexmap::IndexMap;
use log::debug;

use crate::design::{
	BundleId, BundleRefParent, ConnShape, Connectable, InstanceEntry, InstanceId, InstanceKind, ModuleId,
};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Replaces every instance bundle with one instance per bundle signal
pub(super) struct InstanceBundlesPass;

impl InstanceBundlesPass {
	/// Connection of the replica standing for bundle signal `sig`
	fn replica_conn(
		ctx: &mut ElabCtx,
		ib: &InstanceEntry,
		bundle: BundleId,
		port: &str,
		conn: Connectable,
		sig: &str,
	) -> Result<Connectable, ElabError> {
		let mismatch = |ctx: &ElabCtx, reason: String| {
			ctx.fail(ElabErrorKind::BundleTypeMismatch {
				port: port.into(),
				instance: ib.name.clone(),
				reason,
			})
		};
		let bundle_name = ctx.design.bundle(bundle).name.clone();

		match ctx.design.conn_shape(conn)? {
			ConnShape::Bundle(Some(of)) if of != bundle => {
				let got = ctx.design.bundle(of).name.clone();
				Err(mismatch(ctx, format!("expected Bundle `{}`, got `{}`", bundle_name, got)))
			},
			ConnShape::Bundle(_) => match conn {
				Connectable::BundleInstance(bi) => Ok(ctx.design.bundle_ref(bi, sig)?.into()),
				Connectable::BundleRef(br) => Ok(ctx.design.bundle_ref(br, sig)?.into()),
				Connectable::PortRef(pr) => Ok(ctx.design.bundle_ref(BundleRefParent::PortRef(pr), sig)?.into()),
				Connectable::AnonymousBundle(ab) => match ctx.design.anonymous_bundle(ab).members.get(sig) {
					Some(member) => Ok(*member),
					None => Err(ctx.fail(ElabErrorKind::MissingBundleSignal {
						bundle: bundle_name,
						path: sig.into(),
					})),
				},
				_ => Err(mismatch(ctx, format!("{} is not bundle-valued", conn.kind_name()))),
			},
			ConnShape::NoConn => {
				let Connectable::NoConn(nc) = conn
				else {
					return Ok(conn);
				};
				match ctx.design.no_conn_entry(nc).name.clone() {
					Some(name) => Ok(ctx.design.named_no_conn(&format!("{}_{}", name, sig))?.into()),
					None => Ok(ctx.design.no_conn().into()),
				}
			},
			ConnShape::Scalar(1) => Ok(conn),
			ConnShape::Scalar(width) => Err(ctx.fail(ElabErrorKind::InvalidConnection {
				port: port.into(),
				instance: ib.name.clone(),
				reason: format!("only single-bit signals can be broadcast, got {} bits", width),
			})),
		}
	}

	fn expand(ctx: &mut ElabCtx, module: ModuleId, inst: InstanceId, bundle: BundleId) -> Result<(), ElabError> {
		let ib = ctx.design.instance(inst).clone();
		if ctx.design.bundle_has_sub_bundles(bundle) {
			return Err(ctx.fail(ElabErrorKind::NestedInstanceBundle {
				instance: ib.name.clone(),
				bundle: ctx.design.bundle(bundle).name.clone(),
			}));
		}

		let signals: Vec<String> = ctx
			.design
			.bundle_signals(bundle)
			.into_iter()
			.map(|s| ctx.design.signal(s).signal.name.clone())
			.collect();
		let Some((position, _)) = ctx.design.remove_attr(module, &ib.name)
		else {
			return Ok(());
		};

		for (k, sig) in signals.iter().enumerate() {
			let mut conns = IndexMap::new();
			for (port, conn) in &ib.conns {
				conns.insert(port.clone(), Self::replica_conn(ctx, &ib, bundle, port, *conn, sig)?);
			}
			let name = ctx.flatname(module, &[&ib.name, sig])?;
			ctx.design.insert_instance(
				module,
				name,
				ib.of.clone(),
				InstanceKind::Single,
				conns,
				ib.source_info,
				Some(position + k),
			)?;
		}
		debug!("Expanded InstanceBundle `{}` into {} instances", ib.name, signals.len());
		Ok(())
	}
}

impl ElabPass for InstanceBundlesPass {
	fn name(&self) -> &'static str {
		"InstanceBundles"
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		for inst in ctx.design.instance_bundles(module) {
			if let InstanceKind::Bundle(bundle) = ctx.design.instance(inst).kind {
				Self::expand(ctx, module, inst, bundle)?;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::design::{Design, BundleInstance, InstanceBundle, Params, Primitive, PrimitiveCall, Signal};
	use crate::elab::elaborate;

	fn diff(d: &mut Design) -> Result<BundleId, ElabError> {
		let b = d.new_bundle("Diff")?;
		d.add_to_bundle(b, Signal::new("p", 1))?;
		d.add_to_bundle(b, Signal::new("n", 1))?;
		Ok(b)
	}

	#[test]
	fn test_one_replica_per_signal() -> Result<(), ElabError> {
		let mut d = Design::new();
		let b = diff(&mut d)?;
		let top = d.new_module("top")?;
		let x = d.add_bundle_instance(top, BundleInstance::new("x", b))?;
		let gnd = d.add_signal(top, Signal::new("gnd", 1))?;
		let res = PrimitiveCall::new(Primitive::Resistor, Params::new());
		d.add(top, InstanceBundle::new("r", res, b).connect("p", x).connect("n", gnd))?;

		elaborate(&mut d, top)?;
		assert!(d.instance_bundles(top).is_empty());
		let names: Vec<String> = d.instances(top).iter().map(|i| d.instance(*i).name.clone()).collect();
		assert_eq!(names, vec!["r_p", "r_n"]);
		let r_p = d.instances(top)[0];
		let Connectable::Signal(p) = d.instance(r_p).conns["p"]
		else {
			panic!("expected a flattened signal");
		};
		assert_eq!(d.signal(p).signal.name, "x_p");
		assert_eq!(d.instance(r_p).conns["n"], Connectable::Signal(gnd));
		Ok(())
	}

	#[test]
	fn test_wide_broadcast_rejected() -> Result<(), ElabError> {
		let mut d = Design::new();
		let b = diff(&mut d)?;
		let top = d.new_module("top")?;
		let bus = d.add_signal(top, Signal::new("bus", 2))?;
		let res = PrimitiveCall::new(Primitive::Resistor, Params::new());
		d.add(top, InstanceBundle::new("r", res, b).connect("p", bus))?;
		let err = elaborate(&mut d, top).unwrap_err();
		assert!(matches!(err.kind, ElabErrorKind::InvalidConnection { .. }));
		Ok(())
	}

	#[test]
	fn test_nested_bundle_rejected() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inner = diff(&mut d)?;
		let outer = d.new_bundle("Outer")?;
		d.add_to_bundle(outer, BundleInstance::new("d", inner))?;
		let top = d.new_module("top")?;
		let res = PrimitiveCall::new(Primitive::Resistor, Params::new());
		d.add(top, InstanceBundle::new("r", res, outer))?;
		let err = elaborate(&mut d, top).unwrap_err();
		assert!(matches!(err.kind, ElabErrorKind::NestedInstanceBundle { .. }));
		Ok(())
	}
}
