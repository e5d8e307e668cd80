use dyn_clone::DynClone;
use std::fmt;

use super::{Design, DesignError, GeneratorCallId, GeneratorId, ModuleId, Params};

/// Function building a module from parameter values
pub trait GeneratorFn: DynClone {
	fn generate(&self, design: &mut Design, params: &Params) -> Result<Generated, DesignError>;
}

dyn_clone::clone_trait_object!(GeneratorFn);

impl<F> GeneratorFn for F
where
	F: Fn(&mut Design, &Params) -> Result<Generated, DesignError> + Clone,
{
	fn generate(&self, design: &mut Design, params: &Params) -> Result<Generated, DesignError> {
		self(design, params)
	}
}

/// Result of running a generator
#[derive(Clone, Debug, PartialEq)]
pub enum Generated {
	Module(ModuleId),
	/// Defer to another generator
	Call(GeneratorCall),
}

impl From<ModuleId> for Generated {
	fn from(m: ModuleId) -> Self {
		Generated::Module(m)
	}
}

#[derive(Clone)]
pub struct Generator {
	pub name: String,
	pub(super) func: Box<dyn GeneratorFn>,
}

impl fmt::Debug for Generator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Generator").field("name", &self.name).finish()
	}
}

/// Generator applied to a set of parameter values
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorCall {
	pub generator: GeneratorId,
	pub params: Params,
}

/// Generator call stored in a design
#[derive(Clone, Debug)]
pub struct GeneratorCallEntry {
	pub call: GeneratorCall,
	/// Module the call expanded to
	pub result: Option<ModuleId>,
}

impl Design {
	/// Registers a generator function
	pub fn define_generator<F>(&mut self, name: &str, func: F) -> Result<GeneratorId, DesignError>
	where
		F: Fn(&mut Design, &Params) -> Result<Generated, DesignError> + Clone + 'static,
	{
		if name.is_empty() {
			return Err(DesignError::InvalidName(name.into()));
		}
		let id = GeneratorId {
			id: self.generators.len(),
		};
		self.generators.push(Generator {
			name: name.into(),
			func: Box::new(func),
		});
		Ok(id)
	}

	/// Creates a deferred call of a generator, expanded during elaboration
	pub fn call(&mut self, generator: GeneratorId, params: Params) -> GeneratorCallId {
		let id = GeneratorCallId {
			id: self.generator_calls.len(),
		};
		self.generator_calls.push(GeneratorCallEntry {
			call: GeneratorCall { generator, params },
			result: None,
		});
		id
	}

	/// Runs a generator once, without any caching
	pub(crate) fn run_generator(&mut self, call: &GeneratorCall) -> Result<Generated, DesignError> {
		let func = self.generator(call.generator).func.clone();
		func.generate(self, &call.params)
	}
}
