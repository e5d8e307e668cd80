use log::{debug, trace};
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;

use std::collections::HashSet;

use crate::design::{
	BundleInstance, Connectable, Design, DesignError, IoView, ModuleId, NoConnId, PortRefId, PortShape,
};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Endpoint of a net
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum NetNode {
	Ref(PortRefId),
	NoConn(NoConnId),
}

fn is_ref_like(conn: Connectable) -> bool {
	matches!(conn, Connectable::PortRef(_) | Connectable::NoConn(_))
}

/// Replaces port references and no-connects with concrete signals
///
/// Instances connected to each other through port references form
/// nets. Every net gets exactly one driving signal: the one signal
/// already connected to it, or a freshly created one.
pub(super) struct ResolvePortRefsPass;

impl ResolvePortRefsPass {
	/// Builds the graph of port references joined by connections
	fn build_graph(ctx: &mut ElabCtx, module: ModuleId) -> Result<UnGraphMap<NetNode, ()>, ElabError> {
		let mut graph = UnGraphMap::new();
		let instances = ctx.design.all_instances(module);
		for inst in &instances {
			for pr in ctx.design.instance(*inst).portrefs.values() {
				graph.add_node(NetNode::Ref(*pr));
			}
		}

		for inst in &instances {
			let conns: Vec<(String, Connectable)> =
				ctx.design.instance(*inst).conns.iter().map(|(p, c)| (p.clone(), *c)).collect();
			for (port, conn) in conns {
				let other = match conn {
					Connectable::PortRef(pr) => NetNode::Ref(pr),
					Connectable::NoConn(nc) => NetNode::NoConn(nc),
					_ => continue,
				};
				let own = ctx.design.port_ref(*inst, &port)?;
				graph.add_edge(NetNode::Ref(own), other, ());
			}
		}
		Ok(graph)
	}

	/// Splits the graph into nets, in order of first appearance
	fn nets(graph: &UnGraphMap<NetNode, ()>) -> Vec<Vec<NetNode>> {
		let mut seen = HashSet::new();
		let mut nets = vec![];
		for start in graph.nodes() {
			if seen.contains(&start) {
				continue;
			}
			let mut net = vec![];
			let mut bfs = Bfs::new(graph, start);
			while let Some(node) = bfs.next(graph) {
				seen.insert(node);
				net.push(node);
			}
			nets.push(net);
		}
		nets
	}

	/// The connection a port reference's own port was given
	fn own_conn(design: &Design, pr: PortRefId) -> Option<Connectable> {
		let entry = design.port_ref_entry(pr);
		design.instance(entry.inst).conns.get(&entry.portname).copied()
	}

	/// `instance_port` name of a port reference
	fn ref_name(design: &Design, pr: PortRefId) -> (String, String) {
		let entry = design.port_ref_entry(pr);
		(design.instance(entry.inst).name.clone(), entry.portname.clone())
	}

	/// Creates a signal or bundle instance shaped like the referenced port
	fn synthesize(ctx: &mut ElabCtx, module: ModuleId, pr: PortRefId, name: String) -> Result<Connectable, ElabError> {
		let entry = ctx.design.port_ref_entry(pr);
		let (inst, port) = (entry.inst, entry.portname.clone());
		let conn = match ctx.design.port_shape(inst, &port, IoView::PreFlattening)? {
			PortShape::Signal(sig) => {
				let sig = sig.internal_copy(&name);
				Connectable::Signal(ctx.design.insert_signal(module, sig, None, None)?)
			},
			PortShape::Bundle(b) => {
				let bi = BundleInstance::new(&name, b);
				Connectable::BundleInstance(ctx.design.insert_bundle_instance(module, bi, None)?)
			},
		};
		debug!("Created `{}` for net of port `{}`", name, port);
		Ok(conn)
	}

	fn resolve_net(ctx: &mut ElabCtx, module: ModuleId, net: &[NetNode]) -> Result<(), ElabError> {
		let refs: Vec<PortRefId> = net
			.iter()
			.filter_map(|n| match n {
				NetNode::Ref(pr) => Some(*pr),
				NetNode::NoConn(_) => None,
			})
			.collect();
		let noconns: Vec<NoConnId> = net
			.iter()
			.filter_map(|n| match n {
				NetNode::NoConn(nc) => Some(*nc),
				NetNode::Ref(_) => None,
			})
			.collect();
		if refs.is_empty() {
			return Ok(());
		}

		let value = if !noconns.is_empty() {
			if noconns.len() != 1 || refs.len() != 1 {
				return Err(ctx.fail(ElabErrorKind::MultiplyConnectedNoConn { refs: refs.len() }));
			}
			let name = match ctx.design.no_conn_entry(noconns[0]).name.clone() {
				Some(name) => ctx.flatname(module, &[&name])?,
				None => {
					let (inst, port) = Self::ref_name(ctx.design, refs[0]);
					ctx.flatname(module, &[&inst, &port])?
				},
			};
			Self::synthesize(ctx, module, refs[0], name)?
		}
		else {
			let mut sources = vec![];
			for pr in &refs {
				if let Some(conn) = Self::own_conn(ctx.design, *pr) {
					if !is_ref_like(conn) && !sources.contains(&conn) {
						sources.push(conn);
					}
				}
			}

			match sources.len() {
				0 => {
					let unconnected: Vec<PortRefId> = refs
						.iter()
						.copied()
						.filter(|pr| Self::own_conn(ctx.design, *pr).is_none())
						.collect();
					let root = match unconnected.as_slice() {
						[single] => *single,
						_ => refs
							.iter()
							.copied()
							.min_by_key(|pr| Self::ref_name(ctx.design, *pr))
							.unwrap_or(refs[0]),
					};
					let (inst, port) = Self::ref_name(ctx.design, root);
					let name = ctx.flatname(module, &[&inst, &port])?;
					Self::synthesize(ctx, module, root, name)?
				},
				1 => sources[0],
				count => {
					let (inst, port) = Self::ref_name(ctx.design, refs[0]);
					return Err(ctx.fail(ElabErrorKind::MultipleSources {
						net: format!("{}.{}", inst, port),
						count,
					}));
				},
			}
		};

		for pr in refs {
			ctx.design.resolve_port_ref(pr, value)?;
			let entry = ctx.design.port_ref_entry(pr);
			let (inst, port) = (entry.inst, entry.portname.clone());
			let own = ctx.design.instance(inst).conns.get(&port).copied();
			if own.map_or(true, is_ref_like) {
				trace!("Connecting {}.{} to {:?}", ctx.design.instance(inst).name, port, value);
				ctx.design.instance_mut(inst).conns.insert(port, value);
			}
		}
		Ok(())
	}

	/// Replaces resolved references nested in slices, concatenations
	/// and anonymous bundles
	fn substitute(design: &mut Design, conn: Connectable) -> Result<Connectable, DesignError> {
		Ok(match conn {
			Connectable::PortRef(pr) => design.port_ref_entry(pr).resolved.unwrap_or(conn),
			Connectable::Slice(id) => {
				let parent = design.slice_entry(id).parent;
				let new_parent = Self::substitute(design, parent)?;
				if new_parent != parent {
					design.set_slice_parent(id, new_parent);
				}
				conn
			},
			Connectable::Concat(id) => {
				let parts = design.concat_entry(id).parts.clone();
				let new_parts = parts
					.iter()
					.map(|p| Self::substitute(design, *p))
					.collect::<Result<Vec<_>, _>>()?;
				if new_parts != parts {
					design.set_concat_parts(id, new_parts);
				}
				conn
			},
			Connectable::AnonymousBundle(id) => {
				let members: Vec<(String, Connectable)> =
					design.anonymous_bundle(id).members.iter().map(|(k, v)| (k.clone(), *v)).collect();
				for (name, member) in members {
					let new_member = Self::substitute(design, member)?;
					if new_member != member {
						design.set_anonymous_member(id, &name, new_member);
					}
				}
				conn
			},
			_ => conn,
		})
	}
}

impl ElabPass for ResolvePortRefsPass {
	fn name(&self) -> &'static str {
		"ResolvePortRefs"
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		let graph = Self::build_graph(ctx, module)?;
		for net in Self::nets(&graph) {
			Self::resolve_net(ctx, module, &net)?;
		}

		for inst in ctx.design.all_instances(module) {
			let conns: Vec<(String, Connectable)> =
				ctx.design.instance(inst).conns.iter().map(|(p, c)| (p.clone(), *c)).collect();
			for (port, conn) in conns {
				let new_conn = Self::substitute(ctx.design, conn)?;
				if new_conn != conn {
					ctx.design.instance_mut(inst).conns.insert(port, new_conn);
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::design::{Instance, ModuleAttr, Signal};
	use crate::elab::elaborate;

	fn inverter(d: &mut Design) -> Result<ModuleId, ElabError> {
		let inv = d.new_module("inv")?;
		d.add(inv, Signal::input("i", 1))?;
		d.add(inv, Signal::output("z", 1))?;
		Ok(inv)
	}

	fn conn_name(d: &Design, m: ModuleId, inst: &str, port: &str) -> String {
		let Some(ModuleAttr::Instance(id)) = d.get(m, inst)
		else {
			panic!("no instance `{}`", inst);
		};
		match d.instance(id).conns[port] {
			Connectable::Signal(s) => d.signal(s).signal.name.clone(),
			other => panic!("unexpected connection {:?}", other),
		}
	}

	#[test]
	fn test_instance_to_instance() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inv = inverter(&mut d)?;
		let top = d.new_module("top")?;
		let a = d.add_signal(top, Signal::input("a", 1))?;
		let y = d.add_signal(top, Signal::output("y", 1))?;
		let i0 = d.add_instance(top, Instance::new("i0", inv).connect("i", a))?;
		let i0_z = d.port_ref(i0, "z")?;
		d.add(top, Instance::new("i1", inv).connect("i", i0_z).connect("z", y))?;

		elaborate(&mut d, top)?;
		assert_eq!(conn_name(&d, top, "i0", "z"), "i0_z");
		assert_eq!(conn_name(&d, top, "i1", "i"), "i0_z");
		assert_eq!(d.internal_signals(top).len(), 1);
		Ok(())
	}

	#[test]
	fn test_existing_source_reused() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inv = inverter(&mut d)?;
		let top = d.new_module("top")?;
		let a = d.add_signal(top, Signal::input("a", 1))?;
		let w = d.add_signal(top, Signal::new("w", 1))?;
		let i0 = d.add_instance(top, Instance::new("i0", inv).connect("i", a).connect("z", w))?;
		let i0_z = d.port_ref(i0, "z")?;
		d.add(top, Instance::new("i1", inv).connect("i", i0_z).connect("z", w))?;

		elaborate(&mut d, top)?;
		assert_eq!(conn_name(&d, top, "i1", "i"), "w");
		assert_eq!(d.internal_signals(top), vec![w]);
		Ok(())
	}

	#[test]
	fn test_closed_ring_named_alphabetically() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inv = inverter(&mut d)?;
		let top = d.new_module("top")?;
		let b = d.add_instance(top, Instance::new("b", inv))?;
		let a = d.add_instance(top, Instance::new("a", inv))?;
		let b_i = d.port_ref(b, "i")?;
		let a_i = d.port_ref(a, "i")?;
		d.connect(a, "i", b_i)?;
		d.connect(b, "i", a_i)?;
		let nc_a = d.no_conn();
		let nc_b = d.named_no_conn("open")?;
		d.connect(a, "z", nc_a)?;
		d.connect(b, "z", nc_b)?;

		elaborate(&mut d, top)?;
		assert_eq!(conn_name(&d, top, "a", "i"), "a_i");
		assert_eq!(conn_name(&d, top, "b", "i"), "a_i");
		assert_eq!(conn_name(&d, top, "a", "z"), "a_z");
		assert_eq!(conn_name(&d, top, "b", "z"), "open");
		Ok(())
	}

	fn internal_names(d: &Design, m: ModuleId) -> Vec<String> {
		let mut names: Vec<String> = d
			.internal_signals(m)
			.iter()
			.map(|s| d.signal(*s).signal.name.clone())
			.collect();
		names.sort();
		names
	}

	#[test]
	fn test_chained_refs_share_one_signal() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inv = inverter(&mut d)?;
		let top = d.new_module("top")?;
		let a = d.add_signal(top, Signal::input("a", 1))?;
		let mut prev = d.add_instance(top, Instance::new("i0", inv).connect("i", a))?;
		let mut port = "z";
		for k in 1..5 {
			let r = d.port_ref(prev, port)?;
			let nc = d.no_conn();
			let inst = Instance::new(&format!("i{}", k), inv).connect("i", r).connect("z", nc);
			prev = d.add_instance(top, inst)?;
			port = "i";
		}

		elaborate(&mut d, top)?;
		assert_eq!(conn_name(&d, top, "i0", "z"), "i0_z");
		for k in 1..5 {
			assert_eq!(conn_name(&d, top, &format!("i{}", k), "i"), "i0_z");
		}
		assert_eq!(internal_names(&d, top), vec!["i0_z", "i1_z", "i2_z", "i3_z", "i4_z"]);
		Ok(())
	}

	#[test]
	fn test_fan_out_from_one_ref() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inv = inverter(&mut d)?;
		let top = d.new_module("top")?;
		let a = d.add_signal(top, Signal::input("a", 1))?;
		let drv = d.add_instance(top, Instance::new("drv", inv).connect("i", a))?;
		let out = d.port_ref(drv, "z")?;
		for name in ["s0", "s1", "s2"] {
			let nc = d.named_no_conn(&format!("{}_open", name))?;
			d.add(top, Instance::new(name, inv).connect("i", out).connect("z", nc))?;
		}

		elaborate(&mut d, top)?;
		for name in ["drv", "s0", "s1", "s2"] {
			let port = match name {
				"drv" => "z",
				_ => "i",
			};
			assert_eq!(conn_name(&d, top, name, port), "drv_z");
		}
		assert_eq!(internal_names(&d, top), vec!["drv_z", "s0_open", "s1_open", "s2_open"]);
		Ok(())
	}

	#[test]
	fn test_ring_with_tail_named_alphabetically() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inv = inverter(&mut d)?;
		let top = d.new_module("top")?;
		let names = ["m", "c", "b", "a"];
		let mut insts = vec![];
		for name in names {
			let nc = d.no_conn();
			insts.push(d.add_instance(top, Instance::new(name, inv).connect("z", nc))?);
		}
		let (m, c, b, a) = (insts[0], insts[1], insts[2], insts[3]);

		// c -> b -> a -> c, with m hanging off the ring
		let a_i = d.port_ref(a, "i")?;
		let b_i = d.port_ref(b, "i")?;
		let c_i = d.port_ref(c, "i")?;
		d.connect(c, "i", b_i)?;
		d.connect(b, "i", a_i)?;
		d.connect(a, "i", c_i)?;
		d.connect(m, "i", c_i)?;

		elaborate(&mut d, top)?;
		for name in names {
			assert_eq!(conn_name(&d, top, name, "i"), "a_i");
		}
		assert_eq!(internal_names(&d, top), vec!["a_i", "a_z", "b_z", "c_z", "m_z"]);
		Ok(())
	}

	#[test]
	fn test_shared_no_conn_rejected() -> Result<(), ElabError> {
		let mut d = Design::new();
		let inv = inverter(&mut d)?;
		let top = d.new_module("top")?;
		let nc = d.no_conn();
		d.add(top, Instance::new("a", inv).connect("z", nc))?;
		d.add(top, Instance::new("b", inv).connect("z", nc))?;
		let err = elaborate(&mut d, top).unwrap_err();
		assert!(matches!(err.kind, ElabErrorKind::MultiplyConnectedNoConn { refs: 2 }));
		Ok(())
	}
}
