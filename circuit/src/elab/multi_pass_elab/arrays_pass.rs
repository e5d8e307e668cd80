use indexmap::IndexMap;
use log::debug;

use crate::design::{ConnShape, Connectable, InstanceId, InstanceKind, IoView, ModuleId, PortShape};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Replaces every instance array with `n` single instances
///
/// A connection as wide as the port is shared by every replica. One
/// `n` times as wide is split into equal pieces, lowest bits to the
/// first replica.
pub(super) struct FlattenArraysPass;

impl FlattenArraysPass {
	fn expand(ctx: &mut ElabCtx, module: ModuleId, inst: InstanceId, n: usize) -> Result<(), ElabError> {
		let arr = ctx.design.instance(inst).clone();
		let io = ctx.design.target_io(&arr.of, IoView::Current)?;
		let Some((position, _)) = ctx.design.remove_attr(module, &arr.name)
		else {
			return Ok(());
		};

		for k in 0..n {
			let mut conns = IndexMap::new();
			for (port, conn) in &arr.conns {
				let port_width = match io.get(port) {
					Some(PortShape::Signal(sig)) => sig.width,
					_ => {
						conns.insert(port.clone(), *conn);
						continue;
					},
				};
				let value = match ctx.design.conn_shape(*conn)? {
					ConnShape::Scalar(width) if width == port_width => *conn,
					ConnShape::Scalar(width) if width == port_width * n => {
						let (start, stop) = (k * port_width, (k + 1) * port_width);
						Connectable::Slice(ctx.design.range(*conn, start as isize, stop as isize)?)
					},
					ConnShape::Scalar(width) => {
						return Err(ctx.fail(ElabErrorKind::ArrayWidthMismatch {
							port: port.clone(),
							instance: arr.name.clone(),
							width,
							port_width,
							array_width: port_width * n,
						}))
					},
					ConnShape::Bundle(_) | ConnShape::NoConn => *conn,
				};
				conns.insert(port.clone(), value);
			}

			let name = ctx.flatname(module, &[&arr.name, &k.to_string()])?;
			ctx.design.insert_instance(
				module,
				name,
				arr.of.clone(),
				InstanceKind::Single,
				conns,
				arr.source_info,
				Some(position + k),
			)?;
		}
		debug!("Expanded InstanceArray `{}` into {} instances", arr.name, n);
		Ok(())
	}
}

impl ElabPass for FlattenArraysPass {
	fn name(&self) -> &'static str {
		"FlattenArrays"
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		for inst in ctx.design.instance_arrays(module) {
			if let InstanceKind::Array(n) = ctx.design.instance(inst).kind {
				Self::expand(ctx, module, inst, n)?;
			}
		}
		Ok(())
	}
}
