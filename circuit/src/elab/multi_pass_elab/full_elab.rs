use crate::design::{Design, IoView, ModuleId};
use crate::elab::{ElabConfig, ElabError, Elaboratable, Elaborator};

use super::{
	arrays_pass::FlattenArraysPass, conn_types_pass::ConnTypesPass, flatten_bundles_pass::FlattenBundlesPass,
	generators_pass::RunGeneratorsPass, inst_bundles_pass::InstanceBundlesPass, mark_modules_pass::MarkModulesPass,
	orphanage_pass::OrphanagePass, port_refs_pass::ResolvePortRefsPass, slices_pass::ResolveSlicesPass,
	MultiPassElaborator,
};

/// Multi-pass elaborator with all passes
pub struct FullElaborator {
	elaborator: MultiPassElaborator,
}

impl FullElaborator {
	/// Create a new FullElaborator and add all passes
	pub fn new() -> Self {
		Self::with_config(ElabConfig::default())
	}

	pub fn with_config(config: ElabConfig) -> Self {
		let mut elaborator = MultiPassElaborator::new(config);
		elaborator.add_pass(Box::new(RunGeneratorsPass));
		elaborator.add_pass(Box::new(OrphanagePass));
		elaborator.add_pass(Box::new(InstanceBundlesPass));
		elaborator.add_pass(Box::new(ResolvePortRefsPass));
		elaborator.add_pass(Box::new(ConnTypesPass::new(IoView::PreFlattening)));
		elaborator.add_pass(Box::new(FlattenBundlesPass::default()));
		elaborator.add_pass(Box::new(FlattenArraysPass));
		elaborator.add_pass(Box::new(ResolveSlicesPass));
		elaborator.add_pass(Box::new(ConnTypesPass::new(IoView::Current)));
		elaborator.add_pass(Box::new(OrphanagePass));
		elaborator.add_pass(Box::new(MarkModulesPass));
		Self { elaborator }
	}

	pub fn elaborate_all(&mut self, design: &mut Design, roots: &[Elaboratable]) -> Result<Vec<ModuleId>, ElabError> {
		self.elaborator.elaborate_all(design, roots)
	}
}

impl Default for FullElaborator {
	fn default() -> Self {
		Self::new()
	}
}

impl Elaborator for FullElaborator {
	fn elaborate(&mut self, design: &mut Design, root: Elaboratable) -> Result<ModuleId, ElabError> {
		self.elaborator.elaborate(design, root)
	}
}

/// Elaborates a single root with the default pipeline
pub fn elaborate(design: &mut Design, root: impl Into<Elaboratable>) -> Result<ModuleId, ElabError> {
	FullElaborator::new().elaborate(design, root.into())
}

/// Elaborates several roots with the default pipeline
pub fn elaborate_all(design: &mut Design, roots: &[Elaboratable]) -> Result<Vec<ModuleId>, ElabError> {
	FullElaborator::new().elaborate_all(design, roots)
}
