use interchange::sanitize;
use log::debug;

use crate::design::{params_key, unique_name, Generated, GeneratorCallId, Instantiable, ModuleId, Params};
use crate::elab::{ElabError, ElabErrorKind};

use super::{ElabCtx, ElabPass};

/// Expands generator calls into modules
///
/// Calls are memoized per generator and parameter values, so equal
/// calls share one module.
pub(super) struct RunGeneratorsPass;

impl RunGeneratorsPass {
	/// Checks whether `name` netlists to the same identifier as another module
	fn clashes(ctx: &ElabCtx, module: ModuleId, name: &str) -> bool {
		let netlisted = sanitize(name);
		ctx.design.modules().any(|other| {
			other != module
				&& ctx
					.design
					.module(other)
					.name
					.as_deref()
					.map_or(false, |n| sanitize(n) == netlisted)
		})
	}

	/// Names a module created by a generator call
	///
	/// A readable suffix that would collide with another module once
	/// sanitized is replaced by a digest of the parameter values.
	fn name_generated(ctx: &mut ElabCtx, module: ModuleId, generator: &str, params: &Params) -> Result<(), ElabError> {
		let base = ctx.design.module(module).name.clone().unwrap_or_else(|| generator.to_owned());
		let readable = unique_name(params);
		let mut name = if readable.is_empty() {
			base.clone()
		}
		else {
			format!("{}({})", base, readable)
		};
		if !readable.is_empty() && Self::clashes(ctx, module, &name) {
			name = format!("{}({})", base, sha256::digest(params_key(params)));
		}
		ctx.design.set_module_name(module, &name)?;
		Ok(())
	}
}

impl ElabPass for RunGeneratorsPass {
	fn name(&self) -> &'static str {
		"RunGenerators"
	}

	fn expand_generator(&mut self, ctx: &mut ElabCtx, call: GeneratorCallId) -> Result<ModuleId, ElabError> {
		if let Some(m) = ctx.design.generator_call(call).result {
			return Ok(m);
		}

		let mut current = ctx.design.generator_call(call).call.clone();
		let mut chain = vec![];
		let module = loop {
			let key = (current.generator, params_key(&current.params));
			if let Some(m) = ctx.design.generated(&key) {
				break m;
			}

			let gen_name = ctx.design.generator(current.generator).name.clone();
			if chain.len() >= ctx.config.max_generator_depth {
				return Err(ctx.fail(ElabErrorKind::GeneratorDepthExceeded {
					name: gen_name,
					depth: ctx.config.max_generator_depth,
				}));
			}

			debug!("Expanding generator `{}` with ({})", gen_name, unique_name(&current.params));
			let first_new = ctx.design.module_count();
			let generated = ctx.design.run_generator(&current).map_err(|e| ctx.fail(e))?;
			chain.push(key);
			match generated {
				Generated::Module(m) => {
					if m.index() >= first_new {
						Self::name_generated(ctx, m, &gen_name, &current.params)
							.map_err(|e| e.in_context(&ctx.stack))?;
					}
					break m;
				},
				Generated::Call(next) => current = next,
			}
		};

		for key in chain {
			ctx.design.record_generated(key, module);
		}
		ctx.design.generator_call_mut(call).result = Some(module);
		Ok(module)
	}

	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		for inst in ctx.design.all_instances(module) {
			if let Instantiable::Generator(call) = ctx.design.instance(inst).of {
				let entry = ctx.design.generator_call(call);
				let target = entry.result.ok_or_else(|| {
					ElabErrorKind::UnexpandedGenerator(ctx.design.generator(entry.call.generator).name.clone())
				})?;
				ctx.design.instance_mut(inst).of = Instantiable::Module(target);
			}
		}
		Ok(())
	}
}
