use indexmap::IndexMap;
use log::{debug, trace};

use std::collections::HashMap;

use crate::design::{
	BundleInstance, BundleInstanceId, BundlePath, ConnShape, Connectable, Design, InstanceId, IoView, ModuleId,
	NoConnId, PortDir, Signal, SignalId,
};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Leaf signal a flattened bundle instance provides for `leaf`
fn flattened_signal(inst: &BundleInstance, leaf: &Signal, name: &str) -> Signal {
	if !inst.port {
		return leaf.internal_copy(name);
	}
	let direction = match &inst.role {
		Some(role) if leaf.src.as_ref() == Some(role) => PortDir::Output,
		Some(role) if leaf.dest.as_ref() == Some(role) => PortDir::Input,
		_ => PortDir::None,
	};
	Signal {
		desc: leaf.desc.clone(),
		..Signal::port(name, leaf.width).with_direction(direction)
	}
}

/// Replaces bundle instances with their leaf signals
///
/// Bundle-valued connections are split into one connection per leaf,
/// keyed by the leaf port names of the (already flattened) target.
/// Bundle references are resolved to the leaf signals they point at.
#[derive(Default)]
pub(super) struct FlattenBundlesPass {
	/// Leaf signals of every bundle instance flattened during this run
	scopes: HashMap<BundleInstanceId, IndexMap<BundlePath, SignalId>>,
}

impl FlattenBundlesPass {
	fn flatten_instance(&mut self, ctx: &mut ElabCtx, module: ModuleId, bi: BundleInstanceId) -> Result<(), ElabError> {
		let entry = ctx.design.bundle_instance(bi).clone();
		let leaves = ctx.design.bundle_leaves(entry.inst.of);
		let Some((position, _)) = ctx.design.remove_attr(module, &entry.inst.name)
		else {
			return Ok(());
		};

		let mut scope = IndexMap::new();
		for (k, (path, leaf)) in leaves.into_iter().enumerate() {
			let name = ctx.flatname(module, &[&entry.inst.name, &path.to_name()])?;
			let sig = flattened_signal(&entry.inst, &ctx.design.signal(leaf).signal, &name);
			let id = ctx.design.insert_signal(module, sig, entry.source_info, Some(position + k))?;
			scope.insert(path, id);
		}
		debug!(
			"Flattened BundleInstance `{}` into {} signals",
			entry.inst.name,
			scope.len()
		);

		if entry.inst.port {
			ctx.design
				.module_mut(module)
				.bundle_port_leaves
				.insert(entry.inst.name.clone(), scope.clone());
		}
		self.scopes.insert(bi, scope);
		Ok(())
	}

	/// Finds the value at `path` below a bundle-valued connectable
	///
	/// An empty path returns scalar connectables and bundle references
	/// unchanged.
	fn lookup(&self, design: &Design, conn: Connectable, path: &[String]) -> Result<Connectable, ElabErrorKind> {
		let missing = |bundle: String| ElabErrorKind::MissingBundleSignal {
			bundle,
			path: path.join("."),
		};

		match conn {
			Connectable::BundleInstance(bi) => self
				.scopes
				.get(&bi)
				.and_then(|scope| scope.get(&BundlePath(path.to_vec())))
				.map(|sig| Connectable::Signal(*sig))
				.ok_or_else(|| missing(design.bundle_instance(bi).inst.name.clone())),
			Connectable::BundleRef(_) if path.is_empty() => Ok(conn),
			Connectable::BundleRef(br) => {
				let (root, prefix) = design.bundle_ref_path(br);
				let mut full = prefix.0;
				full.extend(path.iter().cloned());
				self.lookup(design, root.into(), &full)
			},
			Connectable::PortRef(pr) => {
				let entry = design.port_ref_entry(pr);
				match entry.resolved {
					Some(resolved) => self.lookup(design, resolved, path),
					None => Err(ElabErrorKind::UnresolvedReference(format!("PortRef `{}`", entry.portname))),
				}
			},
			Connectable::AnonymousBundle(ab) => {
				let Some((head, rest)) = path.split_first()
				else {
					return Err(missing("<anonymous>".into()));
				};
				match design.anonymous_bundle(ab).members.get(head) {
					Some(member) => self.lookup(design, *member, rest),
					None => Err(missing("<anonymous>".into())),
				}
			},
			Connectable::NoConn(_) => Ok(conn),
			Connectable::Signal(_) | Connectable::Slice(_) | Connectable::Concat(_) => {
				if path.is_empty() {
					Ok(conn)
				}
				else {
					Err(missing(conn.kind_name().into()))
				}
			},
		}
	}

	/// Replaces bundle references inside a scalar connectable with leaf signals
	fn resolve_scalar(&self, design: &mut Design, conn: Connectable) -> Result<Connectable, ElabErrorKind> {
		match conn {
			Connectable::BundleRef(br) => {
				let (root, prefix) = design.bundle_ref_path(br);
				let value = self.lookup(design, root.into(), &prefix.0)?;
				let value = self.resolve_scalar(design, value)?;
				design.resolve_bundle_ref(br, value)?;
				Ok(value)
			},
			Connectable::PortRef(pr) => {
				let entry = design.port_ref_entry(pr);
				match entry.resolved {
					Some(resolved) => self.resolve_scalar(design, resolved),
					None => Err(ElabErrorKind::UnresolvedReference(format!("PortRef `{}`", entry.portname))),
				}
			},
			Connectable::Slice(id) => {
				let parent = design.slice_entry(id).parent;
				let new_parent = self.resolve_scalar(design, parent)?;
				if new_parent != parent {
					design.set_slice_parent(id, new_parent);
				}
				Ok(conn)
			},
			Connectable::Concat(id) => {
				let parts = design.concat_entry(id).parts.clone();
				let mut new_parts = Vec::with_capacity(parts.len());
				for part in &parts {
					new_parts.push(self.resolve_scalar(design, *part)?);
				}
				if new_parts != parts {
					design.set_concat_parts(id, new_parts);
				}
				Ok(conn)
			},
			_ => Ok(conn),
		}
	}

	/// Creates the internal signal standing in for a no-connect bundle leaf
	fn no_conn_signal(
		ctx: &mut ElabCtx,
		module: ModuleId,
		nc: NoConnId,
		inst: &str,
		leaf: SignalId,
	) -> Result<Connectable, ElabError> {
		let leaf = &ctx.design.signal(leaf).signal;
		let (leaf_name, width) = (leaf.name.clone(), leaf.width);
		let name = match ctx.design.no_conn_entry(nc).name.clone() {
			Some(base) => ctx.flatname(module, &[&base, &leaf_name])?,
			None => ctx.flatname(module, &[inst, &leaf_name])?,
		};
		let id = ctx.design.insert_signal(module, Signal::new(&name, width), None, None)?;
		debug!("Created `{}` for unconnected bundle leaf `{}`", name, leaf_name);
		Ok(Connectable::Signal(id))
	}

	/// Leaf port signals a bundle port of the target was flattened into
	fn port_leaves(
		&self,
		ctx: &ElabCtx,
		inst: InstanceId,
		port: &str,
	) -> Result<IndexMap<BundlePath, SignalId>, ElabError> {
		let entry = ctx.design.instance(inst);
		ctx.design
			.target_module(&entry.of)
			.and_then(|m| ctx.design.module(m).bundle_port_leaves(port))
			.cloned()
			.ok_or_else(|| {
				ctx.fail(ElabErrorKind::InvalidConnection {
					port: port.into(),
					instance: entry.name.clone(),
					reason: format!("`{}` has no bundle port `{}`", ctx.design.target_name(&entry.of), port),
				})
			})
	}

	fn rewire_instance(&self, ctx: &mut ElabCtx, module: ModuleId, inst: InstanceId) -> Result<(), ElabError> {
		let entry = ctx.design.instance(inst).clone();
		let mut conns = IndexMap::new();

		for (port, conn) in &entry.conns {
			if let ConnShape::Bundle(_) = ctx.design.conn_shape(*conn)? {
				for (path, leaf) in self.port_leaves(ctx, inst, port)? {
					let leaf_port = ctx.design.signal(leaf).signal.name.clone();
					let value = self.lookup(ctx.design, *conn, &path.0).map_err(|k| ctx.fail(k))?;
					let value = match value {
						Connectable::NoConn(nc) => Self::no_conn_signal(ctx, module, nc, &entry.name, leaf)?,
						other => self.resolve_scalar(ctx.design, other).map_err(|k| ctx.fail(k))?,
					};
					trace!("Connecting {}.{} to {:?}", entry.name, leaf_port, value);
					conns.insert(leaf_port, value);
				}
			}
			else {
				let value = self.resolve_scalar(ctx.design, *conn).map_err(|k| ctx.fail(k))?;
				conns.insert(port.clone(), value);
			}
		}

		ctx.design.instance_mut(inst).conns = conns;
		Ok(())
	}
}

impl ElabPass for FlattenBundlesPass {
	fn name(&self) -> &'static str {
		"FlattenBundles"
	}

	fn init(&mut self) {
		self.scopes.clear();
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		if ctx.design.module(module).pre_flattening_io.is_none() {
			let io = ctx.design.io(module, IoView::Current);
			ctx.design.module_mut(module).pre_flattening_io = Some(io);
		}

		for bi in ctx.design.bundle_instances(module) {
			self.flatten_instance(ctx, module, bi)?;
		}
		for inst in ctx.design.all_instances(module) {
			self.rewire_instance(ctx, module, inst)?;
		}
		Ok(())
	}
}
