pub mod bundle;
pub mod connectable;
pub mod design_error;
pub mod external;
pub mod generator;
pub mod instance;
pub mod module;
pub mod params;
pub mod primitives;
pub mod signal;
pub mod slice;
pub mod utils;
pub mod width;

pub use bundle::{AnonymousBundle, Bundle, BundleAttr, BundleInstance, BundleInstanceEntry, BundleItem, BundlePath};
pub use connectable::{BundleRefEntry, BundleRefParent, ConcatEntry, Connectable, NoConnEntry, PortRefEntry, SliceEntry};
pub use design_error::DesignError;
pub use external::{ExternalModule, ExternalModuleCall};
pub use generator::{Generated, Generator, GeneratorCall, GeneratorCallEntry, GeneratorFn};
pub use instance::{Instance, InstanceArray, InstanceBundle, InstanceEntry, InstanceKind, Instantiable};
pub use module::{IoEntry, IoView, ModuleAttr, ModuleEntry, NamedItem};
pub use params::{params_key, unique_name, ParamValue, Params};
pub use primitives::{Primitive, PrimitiveCall};
pub use signal::{Owner, PortDir, Signal, SignalEntry, Visibility};
pub use slice::{SliceBounds, SliceIndex};
pub use width::{ConnShape, PortShape};

use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

macro_rules! design_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
		pub struct $name {
			id: usize,
		}

		impl $name {
			/// Position of the referenced item in the design arena
			pub fn index(&self) -> usize {
				self.id
			}
		}
	};
}

design_id!(
	/// References a module in a design
	ModuleId
);
design_id!(
	/// References a signal in a design
	SignalId
);
design_id!(
	/// References an instance, instance array or instance bundle
	InstanceId
);
design_id!(
	/// References a bundle definition
	BundleId
);
design_id!(
	/// References a bundle instance
	BundleInstanceId
);
design_id!(PortRefId);
design_id!(BundleRefId);
design_id!(SliceId);
design_id!(ConcatId);
design_id!(NoConnId);
design_id!(AnonymousBundleId);
design_id!(GeneratorId);
design_id!(GeneratorCallId);
design_id!(ExternalModuleId);

/// Authoring location captured when an item is created
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
	pub file: &'static str,
	pub line: u32,
}

impl SourceInfo {
	#[track_caller]
	pub fn caller() -> Self {
		let loc = Location::caller();
		Self {
			file: loc.file(),
			line: loc.line(),
		}
	}
}

impl fmt::Display for SourceInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.file, self.line)
	}
}

/// Arena holding every item of a hardware design
///
/// IDs handed out by a design are only meaningful for that design.
/// Items are never removed from the arena; elaboration detaches them
/// from their module namespaces instead.
#[derive(Clone, Default)]
pub struct Design {
	modules: Vec<ModuleEntry>,
	signals: Vec<SignalEntry>,
	instances: Vec<InstanceEntry>,
	bundles: Vec<Bundle>,
	bundle_instances: Vec<BundleInstanceEntry>,
	port_refs: Vec<PortRefEntry>,
	bundle_refs: Vec<BundleRefEntry>,
	slices: Vec<SliceEntry>,
	concats: Vec<ConcatEntry>,
	no_conns: Vec<NoConnEntry>,
	anon_bundles: Vec<AnonymousBundle>,
	generators: Vec<Generator>,
	generator_calls: Vec<GeneratorCallEntry>,
	external_modules: Vec<ExternalModule>,

	/// Generator results keyed by generator and canonical parameter values
	generated: HashMap<(GeneratorId, String), ModuleId>,
}

impl Design {
	/// Creates a new empty design
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a new named module
	#[track_caller]
	pub fn new_module(&mut self, name: &str) -> Result<ModuleId, DesignError> {
		if name.is_empty() {
			return Err(DesignError::InvalidName(name.into()));
		}
		let id = self.new_anonymous_module();
		self.modules[id.id].name = Some(name.into());
		Ok(id)
	}

	/// Creates a module without a name
	///
	/// Generators name such modules when expanded. Any other module
	/// must be named before elaboration completes.
	#[track_caller]
	pub fn new_anonymous_module(&mut self) -> ModuleId {
		let id = ModuleId { id: self.modules.len() };
		self.modules.push(ModuleEntry::new(None, Some(SourceInfo::caller())));
		id
	}

	pub fn module(&self, id: ModuleId) -> &ModuleEntry {
		&self.modules[id.id]
	}

	pub(crate) fn module_mut(&mut self, id: ModuleId) -> &mut ModuleEntry {
		&mut self.modules[id.id]
	}

	/// Returns IDs of all modules in creation order
	pub fn modules(&self) -> impl Iterator<Item = ModuleId> {
		(0..self.modules.len()).map(|id| ModuleId { id })
	}

	pub(crate) fn module_count(&self) -> usize {
		self.modules.len()
	}

	/// Returns the module name, or a placeholder for anonymous modules
	pub fn module_name(&self, id: ModuleId) -> &str {
		self.modules[id.id].name.as_deref().unwrap_or("<anonymous>")
	}

	pub fn set_module_name(&mut self, id: ModuleId, name: &str) -> Result<(), DesignError> {
		if name.is_empty() {
			return Err(DesignError::InvalidName(name.into()));
		}
		self.modules[id.id].name = Some(name.into());
		Ok(())
	}

	pub fn signal(&self, id: SignalId) -> &SignalEntry {
		&self.signals[id.id]
	}

	pub(crate) fn signal_mut(&mut self, id: SignalId) -> &mut SignalEntry {
		&mut self.signals[id.id]
	}

	pub fn instance(&self, id: InstanceId) -> &InstanceEntry {
		&self.instances[id.id]
	}

	pub(crate) fn instance_mut(&mut self, id: InstanceId) -> &mut InstanceEntry {
		&mut self.instances[id.id]
	}

	pub fn bundle(&self, id: BundleId) -> &Bundle {
		&self.bundles[id.id]
	}

	pub fn bundle_instance(&self, id: BundleInstanceId) -> &BundleInstanceEntry {
		&self.bundle_instances[id.id]
	}

	pub fn port_ref_entry(&self, id: PortRefId) -> &PortRefEntry {
		&self.port_refs[id.id]
	}

	pub fn bundle_ref_entry(&self, id: BundleRefId) -> &BundleRefEntry {
		&self.bundle_refs[id.id]
	}

	pub fn slice_entry(&self, id: SliceId) -> &SliceEntry {
		&self.slices[id.id]
	}

	pub fn concat_entry(&self, id: ConcatId) -> &ConcatEntry {
		&self.concats[id.id]
	}

	pub fn no_conn_entry(&self, id: NoConnId) -> &NoConnEntry {
		&self.no_conns[id.id]
	}

	pub fn anonymous_bundle(&self, id: AnonymousBundleId) -> &AnonymousBundle {
		&self.anon_bundles[id.id]
	}

	pub fn generator(&self, id: GeneratorId) -> &Generator {
		&self.generators[id.id]
	}

	pub fn generator_call(&self, id: GeneratorCallId) -> &GeneratorCallEntry {
		&self.generator_calls[id.id]
	}

	pub(crate) fn generator_call_mut(&mut self, id: GeneratorCallId) -> &mut GeneratorCallEntry {
		&mut self.generator_calls[id.id]
	}

	pub(crate) fn generated(&self, key: &(GeneratorId, String)) -> Option<ModuleId> {
		self.generated.get(key).copied()
	}

	pub(crate) fn record_generated(&mut self, key: (GeneratorId, String), module: ModuleId) {
		self.generated.insert(key, module);
	}

	pub fn external_module(&self, id: ExternalModuleId) -> &ExternalModule {
		&self.external_modules[id.id]
	}

	/// Returns IDs of all external modules in declaration order
	pub fn external_modules(&self) -> impl Iterator<Item = ExternalModuleId> {
		(0..self.external_modules.len()).map(|id| ExternalModuleId { id })
	}

	/// Resolves an instance target to a module, if it is one
	///
	/// Generator calls resolve only after they have been expanded.
	pub fn target_module(&self, of: &Instantiable) -> Option<ModuleId> {
		match of {
			Instantiable::Module(m) => Some(*m),
			Instantiable::Generator(call) => self.generator_call(*call).result,
			Instantiable::Primitive(_) | Instantiable::External(_) => None,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_anonymous_module_name() -> Result<(), DesignError> {
		let mut d = Design::new();
		let m = d.new_anonymous_module();
		assert_eq!(d.module_name(m), "<anonymous>");
		d.set_module_name(m, "named")?;
		assert_eq!(d.module(m).name.as_deref(), Some("named"));
		assert!(matches!(d.new_module(""), Err(DesignError::InvalidName(_))));
		Ok(())
	}

	#[test]
	fn test_source_info_points_at_caller() {
		let mut d = Design::new();
		let m = d.new_anonymous_module();
		let info = d.module(m).source_info.unwrap();
		assert!(info.file.ends_with("design.rs"));
		assert!(info.line > 0);
	}
}
