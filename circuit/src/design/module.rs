use indexmap::IndexMap;

use super::utils::checked_name;
use super::{
	BundleId, BundleInstance, BundleInstanceEntry, BundleInstanceId, BundlePath, Connectable, Design, DesignError,
	Instance, InstanceArray, InstanceBundle, InstanceEntry, InstanceId, InstanceKind, Instantiable, ModuleId, Owner,
	Params, Signal, SignalEntry, SignalId, SourceInfo,
};

/// Item stored in a module namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleAttr {
	Signal(SignalId),
	Instance(InstanceId),
	BundleInstance(BundleInstanceId),
}

/// Item that can be added to a module
#[derive(Clone, Debug)]
pub enum NamedItem {
	Signal(Signal),
	Instance(Instance),
	InstanceArray(InstanceArray),
	InstanceBundle(InstanceBundle),
	BundleInstance(BundleInstance),
}

impl NamedItem {
	pub fn name(&self) -> &str {
		match self {
			NamedItem::Signal(s) => &s.name,
			NamedItem::Instance(i) => &i.name,
			NamedItem::InstanceArray(a) => &a.name,
			NamedItem::InstanceBundle(b) => &b.name,
			NamedItem::BundleInstance(b) => &b.name,
		}
	}
}

impl From<Signal> for NamedItem {
	fn from(s: Signal) -> Self {
		NamedItem::Signal(s)
	}
}

impl From<Instance> for NamedItem {
	fn from(i: Instance) -> Self {
		NamedItem::Instance(i)
	}
}

impl From<InstanceArray> for NamedItem {
	fn from(a: InstanceArray) -> Self {
		NamedItem::InstanceArray(a)
	}
}

impl From<InstanceBundle> for NamedItem {
	fn from(b: InstanceBundle) -> Self {
		NamedItem::InstanceBundle(b)
	}
}

impl From<BundleInstance> for NamedItem {
	fn from(b: BundleInstance) -> Self {
		NamedItem::BundleInstance(b)
	}
}

/// Port-level view of a module: a scalar port or a bundle port
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoEntry {
	Signal(SignalId),
	Bundle(BundleInstanceId),
}

/// Selects which IO of an already flattened module is returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoView {
	/// Ports as they are now
	Current,

	/// Ports as declared, before bundle ports were flattened
	PreFlattening,
}

/// Module stored in a design
#[derive(Clone, Debug)]
pub struct ModuleEntry {
	pub name: Option<String>,
	pub domain: Option<String>,
	pub namespace: IndexMap<String, ModuleAttr>,
	pub elaborated: bool,
	pub source_info: Option<SourceInfo>,
	/// Named parameter defaults carried through import and export
	pub params: Params,

	pub(crate) pre_flattening_io: Option<IndexMap<String, IoEntry>>,
	pub(crate) bundle_port_leaves: IndexMap<String, IndexMap<BundlePath, SignalId>>,
}

impl ModuleEntry {
	pub(super) fn new(name: Option<String>, source_info: Option<SourceInfo>) -> Self {
		Self {
			name,
			domain: None,
			namespace: IndexMap::new(),
			elaborated: false,
			source_info,
			params: Params::new(),
			pre_flattening_io: None,
			bundle_port_leaves: IndexMap::new(),
		}
	}

	/// Leaf signals a flattened bundle port was replaced with
	pub fn bundle_port_leaves(&self, port: &str) -> Option<&IndexMap<BundlePath, SignalId>> {
		self.bundle_port_leaves.get(port)
	}
}

impl Design {
	/// Adds an item to a module namespace
	///
	/// Names must be valid identifiers and unique within the module.
	#[track_caller]
	pub fn add(&mut self, module: ModuleId, item: impl Into<NamedItem>) -> Result<ModuleAttr, DesignError> {
		match item.into() {
			NamedItem::Signal(s) => self.add_signal(module, s).map(ModuleAttr::Signal),
			NamedItem::Instance(i) => self.add_instance(module, i).map(ModuleAttr::Instance),
			NamedItem::InstanceArray(a) => self.add_instance_array(module, a).map(ModuleAttr::Instance),
			NamedItem::InstanceBundle(b) => self.add_instance_bundle(module, b).map(ModuleAttr::Instance),
			NamedItem::BundleInstance(b) => self.add_bundle_instance(module, b).map(ModuleAttr::BundleInstance),
		}
	}

	#[track_caller]
	pub fn add_signal(&mut self, module: ModuleId, signal: Signal) -> Result<SignalId, DesignError> {
		self.insert_signal(module, signal, Some(SourceInfo::caller()), None)
	}

	#[track_caller]
	pub fn add_instance(&mut self, module: ModuleId, inst: Instance) -> Result<InstanceId, DesignError> {
		let source_info = Some(SourceInfo::caller());
		self.insert_instance(module, inst.name, inst.of, InstanceKind::Single, inst.conns, source_info, None)
	}

	#[track_caller]
	pub fn add_instance_array(&mut self, module: ModuleId, arr: InstanceArray) -> Result<InstanceId, DesignError> {
		let source_info = Some(SourceInfo::caller());
		if arr.n == 0 {
			return Err(DesignError::EmptyArray(arr.name));
		}
		self.insert_instance(module, arr.name, arr.of, InstanceKind::Array(arr.n), arr.conns, source_info, None)
	}

	#[track_caller]
	pub fn add_instance_bundle(&mut self, module: ModuleId, ib: InstanceBundle) -> Result<InstanceId, DesignError> {
		let source_info = Some(SourceInfo::caller());
		let kind = InstanceKind::Bundle(ib.bundle);
		self.insert_instance(module, ib.name, ib.of, kind, ib.conns, source_info, None)
	}

	#[track_caller]
	pub fn add_bundle_instance(&mut self, module: ModuleId, bi: BundleInstance) -> Result<BundleInstanceId, DesignError> {
		self.insert_bundle_instance(module, bi, Some(SourceInfo::caller()))
	}

	/// Checks that `name` can be added to a module
	fn check_new_attr(&self, module: ModuleId, name: &str) -> Result<(), DesignError> {
		let entry = self.module(module);
		if entry.elaborated {
			return Err(DesignError::ElaboratedModule(self.module_name(module).into()));
		}
		checked_name(name)?;
		if entry.namespace.contains_key(name) {
			return Err(DesignError::DuplicateName {
				name: name.into(),
				container: format!("Module `{}`", self.module_name(module)),
			});
		}
		Ok(())
	}

	/// Inserts a namespace entry, optionally at a given position
	fn insert_attr(&mut self, module: ModuleId, name: String, attr: ModuleAttr, position: Option<usize>) {
		let namespace = &mut self.module_mut(module).namespace;
		match position {
			Some(index) if index < namespace.len() => {
				namespace.shift_insert(index, name, attr);
			},
			_ => {
				namespace.insert(name, attr);
			},
		}
	}

	pub(crate) fn insert_signal(
		&mut self,
		module: ModuleId,
		signal: Signal,
		source_info: Option<SourceInfo>,
		position: Option<usize>,
	) -> Result<SignalId, DesignError> {
		self.check_new_attr(module, &signal.name)?;
		let id = self.push_signal(signal, Owner::Module(module), source_info)?;
		let name = self.signal(id).signal.name.clone();
		self.insert_attr(module, name, ModuleAttr::Signal(id), position);
		Ok(id)
	}

	pub(super) fn push_signal(
		&mut self,
		signal: Signal,
		owner: Owner,
		source_info: Option<SourceInfo>,
	) -> Result<SignalId, DesignError> {
		if signal.width == 0 {
			return Err(DesignError::InvalidWidth(signal.name));
		}
		let id = SignalId { id: self.signals.len() };
		self.signals.push(SignalEntry {
			signal,
			owner,
			source_info,
		});
		Ok(id)
	}

	#[allow(clippy::too_many_arguments)]
	pub(crate) fn insert_instance(
		&mut self,
		module: ModuleId,
		name: String,
		of: Instantiable,
		kind: InstanceKind,
		conns: IndexMap<String, Connectable>,
		source_info: Option<SourceInfo>,
		position: Option<usize>,
	) -> Result<InstanceId, DesignError> {
		self.check_new_attr(module, &name)?;
		let id = InstanceId { id: self.instances.len() };
		self.instances.push(InstanceEntry {
			name: name.clone(),
			of,
			kind,
			conns,
			portrefs: IndexMap::new(),
			parent: module,
			source_info,
		});
		self.insert_attr(module, name, ModuleAttr::Instance(id), position);
		Ok(id)
	}

	pub(crate) fn insert_bundle_instance(
		&mut self,
		module: ModuleId,
		bi: BundleInstance,
		source_info: Option<SourceInfo>,
	) -> Result<BundleInstanceId, DesignError> {
		self.check_new_attr(module, &bi.name)?;
		let name = bi.name.clone();
		let id = self.push_bundle_instance(bi, Owner::Module(module), source_info)?;
		self.insert_attr(module, name, ModuleAttr::BundleInstance(id), None);
		Ok(id)
	}

	pub(super) fn push_bundle_instance(
		&mut self,
		bi: BundleInstance,
		owner: Owner,
		source_info: Option<SourceInfo>,
	) -> Result<BundleInstanceId, DesignError> {
		if let Some(role) = &bi.role {
			let def = self.bundle(bi.of);
			if !def.roles.contains(role) {
				return Err(DesignError::InvalidRole {
					role: role.clone(),
					bundle: def.name.clone(),
				});
			}
		}
		let id = BundleInstanceId {
			id: self.bundle_instances.len(),
		};
		self.bundle_instances.push(BundleInstanceEntry {
			inst: bi,
			owner,
			refs: IndexMap::new(),
			source_info,
		});
		Ok(id)
	}

	/// Removes a namespace entry, returning it along with its position
	pub(crate) fn remove_attr(&mut self, module: ModuleId, name: &str) -> Option<(usize, ModuleAttr)> {
		self.module_mut(module)
			.namespace
			.shift_remove_full(name)
			.map(|(index, _, attr)| (index, attr))
	}

	/// Looks up a namespace entry by name
	pub fn get(&self, module: ModuleId, name: &str) -> Option<ModuleAttr> {
		self.module(module).namespace.get(name).copied()
	}

	fn namespace_signals(&self, module: ModuleId, port: bool) -> Vec<SignalId> {
		self.module(module)
			.namespace
			.values()
			.filter_map(|attr| match attr {
				ModuleAttr::Signal(id) if self.signal(*id).signal.is_port() == port => Some(*id),
				_ => None,
			})
			.collect()
	}

	/// Returns port signals in declaration order
	pub fn ports(&self, module: ModuleId) -> Vec<SignalId> {
		self.namespace_signals(module, true)
	}

	/// Returns internal signals in declaration order
	pub fn internal_signals(&self, module: ModuleId) -> Vec<SignalId> {
		self.namespace_signals(module, false)
	}

	/// Returns instances of every kind
	pub fn all_instances(&self, module: ModuleId) -> Vec<InstanceId> {
		self.module(module)
			.namespace
			.values()
			.filter_map(|attr| match attr {
				ModuleAttr::Instance(id) => Some(*id),
				_ => None,
			})
			.collect()
	}

	/// Returns scalar instances only
	pub fn instances(&self, module: ModuleId) -> Vec<InstanceId> {
		self.instances_where(module, |kind| matches!(kind, InstanceKind::Single))
	}

	pub fn instance_arrays(&self, module: ModuleId) -> Vec<InstanceId> {
		self.instances_where(module, |kind| matches!(kind, InstanceKind::Array(_)))
	}

	pub fn instance_bundles(&self, module: ModuleId) -> Vec<InstanceId> {
		self.instances_where(module, |kind| matches!(kind, InstanceKind::Bundle(_)))
	}

	fn instances_where(&self, module: ModuleId, pred: impl Fn(&InstanceKind) -> bool) -> Vec<InstanceId> {
		self.all_instances(module)
			.into_iter()
			.filter(|id| pred(&self.instance(*id).kind))
			.collect()
	}

	pub fn bundle_instances(&self, module: ModuleId) -> Vec<BundleInstanceId> {
		self.module(module)
			.namespace
			.values()
			.filter_map(|attr| match attr {
				ModuleAttr::BundleInstance(id) => Some(*id),
				_ => None,
			})
			.collect()
	}

	/// Returns bundle instances which are ports
	pub fn bundle_ports(&self, module: ModuleId) -> Vec<BundleInstanceId> {
		self.bundle_instances(module)
			.into_iter()
			.filter(|id| self.bundle_instance(*id).inst.port)
			.collect()
	}

	/// Returns the IO of a module in declaration order
	pub fn io(&self, module: ModuleId, view: IoView) -> IndexMap<String, IoEntry> {
		let entry = self.module(module);
		if view == IoView::PreFlattening {
			if let Some(io) = &entry.pre_flattening_io {
				return io.clone();
			}
		}

		entry
			.namespace
			.iter()
			.filter_map(|(name, attr)| match attr {
				ModuleAttr::Signal(id) if self.signal(*id).signal.is_port() => Some((name.clone(), IoEntry::Signal(*id))),
				ModuleAttr::BundleInstance(id) if self.bundle_instance(*id).inst.port => {
					Some((name.clone(), IoEntry::Bundle(*id)))
				},
				_ => None,
			})
			.collect()
	}

	/// Bundle definition of a bundle-valued module port
	pub fn bundle_port_def(&self, module: ModuleId, port: &str, view: IoView) -> Option<BundleId> {
		match self.io(module, view).get(port) {
			Some(IoEntry::Bundle(bi)) => Some(self.bundle_instance(*bi).inst.of),
			_ => None,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_duplicate_names() -> Result<(), DesignError> {
		let mut d = Design::new();
		let m = d.new_module("m")?;
		d.add(m, Signal::input("a", 1))?;
		let res = d.add(m, Signal::new("a", 4));
		assert!(matches!(res, Err(DesignError::DuplicateName { .. })));
		Ok(())
	}

	#[test]
	fn test_invalid_attr_names() -> Result<(), DesignError> {
		let mut d = Design::new();
		let m = d.new_module("m")?;
		assert!(matches!(d.add(m, Signal::new("1a", 1)), Err(DesignError::InvalidName(_))));
		assert!(matches!(d.add(m, Signal::new("a", 0)), Err(DesignError::InvalidWidth(_))));
		Ok(())
	}

	#[test]
	fn test_empty_array_rejected() -> Result<(), DesignError> {
		let mut d = Design::new();
		let leaf = d.new_module("leaf")?;
		let m = d.new_module("m")?;
		let s = d.add_signal(m, Signal::new("s", 1))?;
		let res = d.add(m, InstanceArray::new("arr", leaf, 0).connect("a", s));
		assert!(matches!(res, Err(DesignError::EmptyArray(name)) if name == "arr"));
		assert!(d.get(m, "arr").is_none());
		Ok(())
	}

	#[test]
	fn test_partitioned_namespace() -> Result<(), DesignError> {
		let mut d = Design::new();
		let leaf = d.new_module("leaf")?;
		let m = d.new_module("m")?;
		let a = d.add_signal(m, Signal::input("a", 1))?;
		let s = d.add_signal(m, Signal::new("s", 2))?;
		let b = d.add_signal(m, Signal::output("b", 1))?;
		let i = d.add_instance(m, Instance::new("i", leaf))?;
		let arr = d.add_instance_array(m, InstanceArray::new("arr", leaf, 3))?;

		assert_eq!(d.ports(m), vec![a, b]);
		assert_eq!(d.internal_signals(m), vec![s]);
		assert_eq!(d.instances(m), vec![i]);
		assert_eq!(d.instance_arrays(m), vec![arr]);
		assert_eq!(d.all_instances(m), vec![i, arr]);
		assert_eq!(d.io(m, IoView::Current).keys().collect::<Vec<_>>(), vec!["a", "b"]);
		assert_eq!(d.signal(s).owner, Owner::Module(m));
		assert_eq!(d.instance(i).parent, m);
		Ok(())
	}

	#[test]
	fn test_elaborated_module_is_frozen() -> Result<(), DesignError> {
		let mut d = Design::new();
		let m = d.new_module("m")?;
		d.module_mut(m).elaborated = true;
		assert!(matches!(
			d.add(m, Signal::new("late", 1)),
			Err(DesignError::ElaboratedModule(_))
		));
		Ok(())
	}
}
