use indexmap::IndexMap;
use std::cell::OnceCell;

use super::utils::checked_name;
use super::{
	AnonymousBundle, AnonymousBundleId, BundleInstanceId, BundleRefId, ConcatId, Design, DesignError, InstanceId,
	InstanceKind, NoConnId, PortRefId, SignalId, SliceBounds, SliceId, SliceIndex,
};

/// Anything a port can be connected to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Connectable {
	Signal(SignalId),
	Slice(SliceId),
	Concat(ConcatId),
	NoConn(NoConnId),
	PortRef(PortRefId),
	BundleRef(BundleRefId),
	BundleInstance(BundleInstanceId),
	AnonymousBundle(AnonymousBundleId),
}

impl Connectable {
	pub fn kind_name(&self) -> &'static str {
		match self {
			Connectable::Signal(_) => "Signal",
			Connectable::Slice(_) => "Slice",
			Connectable::Concat(_) => "Concat",
			Connectable::NoConn(_) => "NoConn",
			Connectable::PortRef(_) => "PortRef",
			Connectable::BundleRef(_) => "BundleRef",
			Connectable::BundleInstance(_) => "BundleInstance",
			Connectable::AnonymousBundle(_) => "AnonymousBundle",
		}
	}

	/// Checks if the connectable can be the parent of a slice or a concatenation part
	pub fn is_sliceable(&self) -> bool {
		matches!(
			self,
			Connectable::Signal(_)
				| Connectable::Slice(_)
				| Connectable::Concat(_)
				| Connectable::PortRef(_)
				| Connectable::BundleRef(_)
		)
	}
}

impl From<SignalId> for Connectable {
	fn from(id: SignalId) -> Self {
		Connectable::Signal(id)
	}
}

impl From<SliceId> for Connectable {
	fn from(id: SliceId) -> Self {
		Connectable::Slice(id)
	}
}

impl From<ConcatId> for Connectable {
	fn from(id: ConcatId) -> Self {
		Connectable::Concat(id)
	}
}

impl From<NoConnId> for Connectable {
	fn from(id: NoConnId) -> Self {
		Connectable::NoConn(id)
	}
}

impl From<PortRefId> for Connectable {
	fn from(id: PortRefId) -> Self {
		Connectable::PortRef(id)
	}
}

impl From<BundleRefId> for Connectable {
	fn from(id: BundleRefId) -> Self {
		Connectable::BundleRef(id)
	}
}

impl From<BundleInstanceId> for Connectable {
	fn from(id: BundleInstanceId) -> Self {
		Connectable::BundleInstance(id)
	}
}

impl From<AnonymousBundleId> for Connectable {
	fn from(id: AnonymousBundleId) -> Self {
		Connectable::AnonymousBundle(id)
	}
}

/// Lazy reference to a port of an instance
#[derive(Clone, Debug)]
pub struct PortRefEntry {
	pub inst: InstanceId,
	pub portname: String,
	pub resolved: Option<Connectable>,
	/// Bundle references into this port, by attribute name
	pub refs: IndexMap<String, BundleRefId>,
}

/// What a bundle reference points into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BundleRefParent {
	BundleInstance(BundleInstanceId),
	BundleRef(BundleRefId),
	PortRef(PortRefId),
}

/// Lazy reference to an attribute of a bundle-valued item
#[derive(Clone, Debug)]
pub struct BundleRefEntry {
	pub parent: BundleRefParent,
	pub attr: String,
	pub resolved: Option<Connectable>,
	pub refs: IndexMap<String, BundleRefId>,
}

#[derive(Clone, Debug)]
pub struct SliceEntry {
	pub parent: Connectable,
	pub index: SliceIndex,
	pub(super) bounds: OnceCell<SliceBounds>,
}

/// Concatenation, least significant part first
#[derive(Clone, Debug)]
pub struct ConcatEntry {
	pub parts: Vec<Connectable>,
}

/// Explicit marker for a port left unconnected
#[derive(Clone, Debug)]
pub struct NoConnEntry {
	/// Name of the signal that replaces it, if chosen by the user
	pub name: Option<String>,
}

impl Design {
	/// Returns the port reference for `port` of `inst`, creating it on first use
	pub fn port_ref(&mut self, inst: InstanceId, port: &str) -> Result<PortRefId, DesignError> {
		let entry = self.instance(inst);
		if let InstanceKind::Bundle(_) = entry.kind {
			return Err(DesignError::PortRefOnInstanceBundle(entry.name.clone()));
		}
		if let Some(id) = entry.portrefs.get(port) {
			return Ok(*id);
		}
		let id = PortRefId { id: self.port_refs.len() };
		self.port_refs.push(PortRefEntry {
			inst,
			portname: port.into(),
			resolved: None,
			refs: IndexMap::new(),
		});
		self.instance_mut(inst).portrefs.insert(port.into(), id);
		Ok(id)
	}

	/// Returns the bundle reference for `attr` of `parent`, creating it on first use
	pub fn bundle_ref(&mut self, parent: impl Into<BundleRefParent>, attr: &str) -> Result<BundleRefId, DesignError> {
		let parent = parent.into();
		checked_name(attr)?;
		let cached = match parent {
			BundleRefParent::BundleInstance(bi) => self.bundle_instance(bi).refs.get(attr),
			BundleRefParent::BundleRef(br) => self.bundle_ref_entry(br).refs.get(attr),
			BundleRefParent::PortRef(pr) => self.port_ref_entry(pr).refs.get(attr),
		};
		if let Some(id) = cached {
			return Ok(*id);
		}

		let id = BundleRefId {
			id: self.bundle_refs.len(),
		};
		self.bundle_refs.push(BundleRefEntry {
			parent,
			attr: attr.into(),
			resolved: None,
			refs: IndexMap::new(),
		});
		let refs = match parent {
			BundleRefParent::BundleInstance(bi) => &mut self.bundle_instances[bi.id].refs,
			BundleRefParent::BundleRef(br) => &mut self.bundle_refs[br.id].refs,
			BundleRefParent::PortRef(pr) => &mut self.port_refs[pr.id].refs,
		};
		refs.insert(attr.into(), id);
		Ok(id)
	}

	/// Creates a slice of a signal-like connectable
	pub fn slice(&mut self, parent: impl Into<Connectable>, index: SliceIndex) -> Result<SliceId, DesignError> {
		let parent = parent.into();
		if !parent.is_sliceable() {
			return Err(DesignError::NotSliceable(parent.kind_name()));
		}
		if let SliceIndex::Range { step: Some(0), .. } = index {
			return Err(DesignError::ZeroSliceStep);
		}
		let id = SliceId { id: self.slices.len() };
		self.slices.push(SliceEntry {
			parent,
			index,
			bounds: OnceCell::new(),
		});
		Ok(id)
	}

	/// Single-bit slice, `parent[index]`
	pub fn index(&mut self, parent: impl Into<Connectable>, index: isize) -> Result<SliceId, DesignError> {
		self.slice(parent, SliceIndex::Index(index))
	}

	/// Contiguous slice, `parent[start:stop]`
	pub fn range(&mut self, parent: impl Into<Connectable>, start: isize, stop: isize) -> Result<SliceId, DesignError> {
		self.slice(parent, SliceIndex::range(start, stop))
	}

	/// Concatenation of signal-like connectables, least significant first
	pub fn concat(&mut self, parts: Vec<Connectable>) -> Result<ConcatId, DesignError> {
		if let Some(bad) = parts.iter().find(|p| !p.is_sliceable()) {
			return Err(DesignError::NotConcatable(bad.kind_name()));
		}
		let id = ConcatId { id: self.concats.len() };
		self.concats.push(ConcatEntry { parts });
		Ok(id)
	}

	/// Creates an unnamed no-connect marker
	pub fn no_conn(&mut self) -> NoConnId {
		let id = NoConnId { id: self.no_conns.len() };
		self.no_conns.push(NoConnEntry { name: None });
		id
	}

	/// Creates a no-connect marker whose replacement signal gets `name`
	pub fn named_no_conn(&mut self, name: &str) -> Result<NoConnId, DesignError> {
		checked_name(name)?;
		let id = self.no_conn();
		self.no_conns[id.id].name = Some(name.into());
		Ok(id)
	}

	/// Shorthand for registering an anonymous bundle and using it as a connectable
	pub fn anonymous(&mut self, bundle: AnonymousBundle) -> Result<Connectable, DesignError> {
		Ok(Connectable::AnonymousBundle(self.add_anonymous_bundle(bundle)?))
	}

	/// Writes the resolved value of a port reference
	///
	/// A reference resolves at most once; resolving it again to the same
	/// value is a no-op.
	pub(crate) fn resolve_port_ref(&mut self, id: PortRefId, value: Connectable) -> Result<(), DesignError> {
		let entry = &mut self.port_refs[id.id];
		match entry.resolved {
			Some(prev) if prev != value => Err(DesignError::AlreadyResolved(format!("PortRef `{}`", entry.portname))),
			_ => {
				entry.resolved = Some(value);
				Ok(())
			},
		}
	}

	pub(crate) fn resolve_bundle_ref(&mut self, id: BundleRefId, value: Connectable) -> Result<(), DesignError> {
		let entry = &mut self.bundle_refs[id.id];
		match entry.resolved {
			Some(prev) if prev != value => Err(DesignError::AlreadyResolved(format!("BundleRef `{}`", entry.attr))),
			_ => {
				entry.resolved = Some(value);
				Ok(())
			},
		}
	}

	pub(crate) fn set_slice_parent(&mut self, id: SliceId, parent: Connectable) {
		let entry = &mut self.slices[id.id];
		entry.parent = parent;
		entry.bounds = OnceCell::new();
	}

	pub(crate) fn set_concat_parts(&mut self, id: ConcatId, parts: Vec<Connectable>) {
		self.concats[id.id].parts = parts;
	}

	pub(crate) fn set_anonymous_member(&mut self, id: AnonymousBundleId, name: &str, value: Connectable) {
		if let Some(member) = self.anon_bundles[id.id].members.get_mut(name) {
			*member = value;
		}
	}
}

impl From<BundleInstanceId> for BundleRefParent {
	fn from(id: BundleInstanceId) -> Self {
		BundleRefParent::BundleInstance(id)
	}
}

impl From<BundleRefId> for BundleRefParent {
	fn from(id: BundleRefId) -> Self {
		BundleRefParent::BundleRef(id)
	}
}

impl From<PortRefId> for BundleRefParent {
	fn from(id: PortRefId) -> Self {
		BundleRefParent::PortRef(id)
	}
}

impl From<BundleRefParent> for Connectable {
	fn from(parent: BundleRefParent) -> Self {
		match parent {
			BundleRefParent::BundleInstance(id) => Connectable::BundleInstance(id),
			BundleRefParent::BundleRef(id) => Connectable::BundleRef(id),
			BundleRefParent::PortRef(id) => Connectable::PortRef(id),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::design::{Instance, Signal};

	#[test]
	fn test_port_refs_are_cached() -> Result<(), DesignError> {
		let mut d = Design::new();
		let leaf = d.new_module("leaf")?;
		let m = d.new_module("m")?;
		let i = d.add_instance(m, Instance::new("i", leaf))?;
		let a = d.port_ref(i, "a")?;
		assert_eq!(d.port_ref(i, "a")?, a);
		assert_ne!(d.port_ref(i, "b")?, a);
		assert_eq!(d.instance(i).portrefs.len(), 2);
		Ok(())
	}

	#[test]
	fn test_bundle_refs_are_cached() -> Result<(), DesignError> {
		let mut d = Design::new();
		let leaf = d.new_module("leaf")?;
		let m = d.new_module("m")?;
		let i = d.add_instance(m, Instance::new("i", leaf))?;
		let pr = d.port_ref(i, "bus")?;
		let x = d.bundle_ref(pr, "x")?;
		assert_eq!(d.bundle_ref(pr, "x")?, x);
		let y = d.bundle_ref(x, "y")?;
		assert_eq!(d.bundle_ref_entry(y).parent, BundleRefParent::BundleRef(x));
		Ok(())
	}

	#[test]
	fn test_no_slicing_of_no_conn() -> Result<(), DesignError> {
		let mut d = Design::new();
		let m = d.new_module("m")?;
		let s = d.add_signal(m, Signal::new("s", 4))?;
		let nc = d.no_conn();
		assert!(matches!(d.index(nc, 0), Err(DesignError::NotSliceable(_))));
		assert!(matches!(d.concat(vec![s.into(), nc.into()]), Err(DesignError::NotConcatable(_))));
		assert!(matches!(
			d.slice(s, SliceIndex::Range { start: None, stop: None, step: Some(0) }),
			Err(DesignError::ZeroSliceStep)
		));
		Ok(())
	}

	#[test]
	fn test_resolve_at_most_once() -> Result<(), DesignError> {
		let mut d = Design::new();
		let leaf = d.new_module("leaf")?;
		let m = d.new_module("m")?;
		let s = d.add_signal(m, Signal::new("s", 1))?;
		let t = d.add_signal(m, Signal::new("t", 1))?;
		let i = d.add_instance(m, Instance::new("i", leaf))?;
		let r = d.port_ref(i, "a")?;
		d.resolve_port_ref(r, s.into())?;
		d.resolve_port_ref(r, s.into())?;
		assert!(matches!(d.resolve_port_ref(r, t.into()), Err(DesignError::AlreadyResolved(_))));
		Ok(())
	}
}
