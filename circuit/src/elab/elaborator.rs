use crate::design::{Design, GeneratorCallId, ModuleId};

use super::ElabError;

/// Root of an elaboration run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Elaboratable {
	Module(ModuleId),
	Generator(GeneratorCallId),
}

impl From<ModuleId> for Elaboratable {
	fn from(m: ModuleId) -> Self {
		Elaboratable::Module(m)
	}
}

impl From<GeneratorCallId> for Elaboratable {
	fn from(c: GeneratorCallId) -> Self {
		Elaboratable::Generator(c)
	}
}

/// Trait which must be implemented by all elaborators
pub trait Elaborator {
	/// Elaborates the hierarchy below `root` and returns the elaborated top module
	fn elaborate(&mut self, design: &mut Design, root: Elaboratable) -> Result<ModuleId, ElabError>;
}
