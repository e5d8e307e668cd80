use indexmap::IndexMap;
use log::trace;

use super::{
	BundleId, Connectable, Design, DesignError, ExternalModuleCall, GeneratorCallId, InstanceId, ModuleId,
	PortRefId, PrimitiveCall, SourceInfo,
};

/// Anything an instance can point at
#[derive(Clone, Debug, PartialEq)]
pub enum Instantiable {
	Module(ModuleId),
	Generator(GeneratorCallId),
	Primitive(PrimitiveCall),
	External(ExternalModuleCall),
}

impl From<ModuleId> for Instantiable {
	fn from(m: ModuleId) -> Self {
		Instantiable::Module(m)
	}
}

impl From<GeneratorCallId> for Instantiable {
	fn from(c: GeneratorCallId) -> Self {
		Instantiable::Generator(c)
	}
}

impl From<PrimitiveCall> for Instantiable {
	fn from(p: PrimitiveCall) -> Self {
		Instantiable::Primitive(p)
	}
}

impl From<ExternalModuleCall> for Instantiable {
	fn from(e: ExternalModuleCall) -> Self {
		Instantiable::External(e)
	}
}

/// Single placement of an instantiable
#[derive(Clone, Debug)]
pub struct Instance {
	pub name: String,
	pub of: Instantiable,
	pub conns: IndexMap<String, Connectable>,
}

impl Instance {
	pub fn new(name: &str, of: impl Into<Instantiable>) -> Self {
		Self {
			name: name.into(),
			of: of.into(),
			conns: IndexMap::new(),
		}
	}

	pub fn connect(mut self, port: &str, conn: impl Into<Connectable>) -> Self {
		self.conns.insert(port.into(), conn.into());
		self
	}
}

/// `n` identical placements sharing one connection map
#[derive(Clone, Debug)]
pub struct InstanceArray {
	pub name: String,
	pub of: Instantiable,
	pub n: usize,
	pub conns: IndexMap<String, Connectable>,
}

impl InstanceArray {
	pub fn new(name: &str, of: impl Into<Instantiable>, n: usize) -> Self {
		Self {
			name: name.into(),
			of: of.into(),
			n,
			conns: IndexMap::new(),
		}
	}

	pub fn connect(mut self, port: &str, conn: impl Into<Connectable>) -> Self {
		self.conns.insert(port.into(), conn.into());
		self
	}
}

/// One placement per signal of a reference bundle
#[derive(Clone, Debug)]
pub struct InstanceBundle {
	pub name: String,
	pub of: Instantiable,
	pub bundle: BundleId,
	pub conns: IndexMap<String, Connectable>,
}

impl InstanceBundle {
	pub fn new(name: &str, of: impl Into<Instantiable>, bundle: BundleId) -> Self {
		Self {
			name: name.into(),
			of: of.into(),
			bundle,
			conns: IndexMap::new(),
		}
	}

	pub fn connect(mut self, port: &str, conn: impl Into<Connectable>) -> Self {
		self.conns.insert(port.into(), conn.into());
		self
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceKind {
	Single,
	Array(usize),
	Bundle(BundleId),
}

/// Instance, instance array or instance bundle stored in a design
#[derive(Clone, Debug)]
pub struct InstanceEntry {
	pub name: String,
	pub of: Instantiable,
	pub kind: InstanceKind,
	pub conns: IndexMap<String, Connectable>,
	/// Port references handed out for this instance, by port name
	pub portrefs: IndexMap<String, PortRefId>,
	pub parent: ModuleId,
	pub source_info: Option<SourceInfo>,
}

impl Design {
	/// Connects a port of an instance, replacing any previous connection
	pub fn connect(&mut self, inst: InstanceId, port: &str, conn: impl Into<Connectable>) -> Result<(), DesignError> {
		let parent = self.instance(inst).parent;
		if self.module(parent).elaborated {
			return Err(DesignError::ElaboratedModule(self.module_name(parent).into()));
		}
		let conn = conn.into();
		trace!("Connecting {}.{} to {:?}", self.instance(inst).name, port, conn);
		self.instance_mut(inst).conns.insert(port.into(), conn);
		Ok(())
	}

	/// Removes a port connection, returning what it was connected to
	pub fn disconnect(&mut self, inst: InstanceId, port: &str) -> Result<Option<Connectable>, DesignError> {
		let parent = self.instance(inst).parent;
		if self.module(parent).elaborated {
			return Err(DesignError::ElaboratedModule(self.module_name(parent).into()));
		}
		Ok(self.instance_mut(inst).conns.shift_remove(port))
	}
}
