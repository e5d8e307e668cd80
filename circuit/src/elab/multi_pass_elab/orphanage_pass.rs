use crate::design::{BundleRefParent, Connectable, Design, ModuleAttr, ModuleId, Owner, PortRefId};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Checks that everything a module uses belongs to that module
pub(super) struct OrphanagePass;

fn owner_name(design: &Design, owner: Owner) -> String {
	match owner {
		Owner::Module(m) => format!("Module `{}`", design.module_name(m)),
		Owner::Bundle(b) => format!("Bundle `{}`", design.bundle(b).name),
	}
}

struct OrphanCheck<'a> {
	design: &'a Design,
	module: ModuleId,
}

impl<'a> OrphanCheck<'a> {
	fn orphan(&self, kind: &'static str, name: &str, owner: String) -> ElabErrorKind {
		ElabErrorKind::Orphan {
			kind,
			name: name.into(),
			module: self.design.module_name(self.module).into(),
			owner,
		}
	}

	fn check_owner(&self, kind: &'static str, name: &str, owner: Owner) -> Result<(), ElabErrorKind> {
		if owner == Owner::Module(self.module) {
			Ok(())
		}
		else {
			Err(self.orphan(kind, name, owner_name(self.design, owner)))
		}
	}

	fn check_attr(&self, attr: ModuleAttr) -> Result<(), ElabErrorKind> {
		let d = self.design;
		match attr {
			ModuleAttr::Signal(id) => {
				let entry = d.signal(id);
				self.check_owner("Signal", &entry.signal.name, entry.owner)
			},
			ModuleAttr::BundleInstance(id) => {
				let entry = d.bundle_instance(id);
				self.check_owner("BundleInstance", &entry.inst.name, entry.owner)
			},
			ModuleAttr::Instance(id) => {
				let entry = d.instance(id);
				if entry.parent != self.module {
					let owner = format!("Module `{}`", d.module_name(entry.parent));
					return Err(self.orphan("Instance", &entry.name, owner));
				}
				entry.conns.values().try_for_each(|conn| self.check_conn(*conn))
			},
		}
	}

	fn check_conn(&self, conn: Connectable) -> Result<(), ElabErrorKind> {
		let d = self.design;
		match conn {
			Connectable::Signal(id) => self.check_attr(ModuleAttr::Signal(id)),
			Connectable::BundleInstance(id) => self.check_attr(ModuleAttr::BundleInstance(id)),
			Connectable::Slice(id) => self.check_conn(d.slice_entry(id).parent),
			Connectable::Concat(id) => d.concat_entry(id).parts.iter().try_for_each(|p| self.check_conn(*p)),
			Connectable::AnonymousBundle(id) => d
				.anonymous_bundle(id)
				.members
				.values()
				.try_for_each(|m| self.check_conn(*m)),
			Connectable::PortRef(id) => self.check_port_ref_parent(id),
			Connectable::BundleRef(id) => match d.bundle_ref_path(id).0 {
				BundleRefParent::BundleInstance(bi) => self.check_attr(ModuleAttr::BundleInstance(bi)),
				BundleRefParent::PortRef(pr) => self.check_port_ref_parent(pr),
				BundleRefParent::BundleRef(_) => Ok(()),
			},
			Connectable::NoConn(_) => Ok(()),
		}
	}

	fn check_port_ref_parent(&self, id: PortRefId) -> Result<(), ElabErrorKind> {
		let entry = self.design.port_ref_entry(id);
		let inst = self.design.instance(entry.inst);
		if inst.parent != self.module {
			let owner = format!("Module `{}`", self.design.module_name(inst.parent));
			return Err(self.orphan("PortRef", &format!("{}.{}", inst.name, entry.portname), owner));
		}
		match entry.resolved {
			Some(resolved) => self.check_conn(resolved),
			None => Ok(()),
		}
	}
}

impl ElabPass for OrphanagePass {
	fn name(&self) -> &'static str {
		"Orphanage"
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		let check = OrphanCheck {
			design: &*ctx.design,
			module,
		};
		for attr in ctx.design.module(module).namespace.values() {
			check.check_attr(*attr).map_err(|kind| ctx.fail(kind))?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use crate::design::{Design, Instance, Signal};
	use crate::elab::{elaborate, ElabError, ElabErrorKind};

	#[test]
	fn test_foreign_signal_connection() -> Result<(), ElabError> {
		let mut d = Design::new();
		let leaf = d.new_module("leaf")?;
		d.add(leaf, Signal::input("a", 1))?;
		let other = d.new_module("other")?;
		let foreign = d.add_signal(other, Signal::new("foreign", 1))?;
		let top = d.new_module("top")?;
		d.add(top, Instance::new("i", leaf).connect("a", foreign))?;

		let err = elaborate(&mut d, top).unwrap_err();
		assert!(matches!(err.kind, ElabErrorKind::Orphan { kind: "Signal", .. }));
		assert_eq!(err.path.len(), 1);
		Ok(())
	}
}
