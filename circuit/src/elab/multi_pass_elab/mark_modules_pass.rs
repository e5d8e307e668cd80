use log::debug;

use crate::design::ModuleId;
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Marks modules as elaborated, freezing them
pub(super) struct MarkModulesPass;

impl ElabPass for MarkModulesPass {
	fn name(&self) -> &'static str {
		"MarkModules"
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		if ctx.design.module(module).name.is_none() {
			return Err(ctx.fail(ElabErrorKind::UnnamedModule));
		}
		ctx.design.module_mut(module).elaborated = true;
		debug!("Module `{}` is elaborated", ctx.design.module_name(module));
		Ok(())
	}
}
