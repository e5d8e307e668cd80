mod arrays_pass;
mod conn_types_pass;
mod flatten_bundles_pass;
mod full_elab;
mod generators_pass;
mod inst_bundles_pass;
mod mark_modules_pass;
mod orphanage_pass;
mod port_refs_pass;
mod slices_pass;

pub use full_elab::{elaborate, elaborate_all, FullElaborator};
use log::{debug, info};

use std::collections::HashSet;

use crate::design::{Design, GeneratorCallId, Instantiable, ModuleId, SourceInfo};

use super::{
	ElabConfig, ElabError, ElabErrorKind, ElabStackEntry, ElabStackKind, Elaboratable, Elaborator,
};

/// State shared by a pass while it walks the hierarchy
pub struct ElabCtx<'d> {
	pub design: &'d mut Design,
	pub config: &'d ElabConfig,
	stack: Vec<ElabStackEntry>,
	generator_depth: usize,
}

impl<'d> ElabCtx<'d> {
	fn new(design: &'d mut Design, config: &'d ElabConfig) -> Self {
		Self {
			design,
			config,
			stack: vec![],
			generator_depth: 0,
		}
	}

	/// Creates an error located at the current hierarchy path
	pub fn fail(&self, kind: impl Into<ElabErrorKind>) -> ElabError {
		ElabError {
			kind: kind.into(),
			path: self.stack.clone(),
		}
	}

	/// Joins `segments` into a name that is free in the module namespace
	///
	/// Collisions are avoided by appending underscores.
	pub fn flatname(&self, module: ModuleId, segments: &[&str]) -> Result<String, ElabError> {
		let mut name = segments.join("_");
		loop {
			if name.len() > self.config.max_name_len {
				return Err(self.fail(ElabErrorKind::NameSpaceExhausted {
					name: segments.join("_"),
					len: self.config.max_name_len,
				}));
			}
			if self.design.get(module, &name).is_none() {
				return Ok(name);
			}
			name.push('_');
		}
	}

	fn push(&mut self, kind: ElabStackKind, name: String, source: Option<SourceInfo>) {
		self.stack.push(ElabStackEntry { kind, name, source });
	}

	fn pop(&mut self) {
		self.stack.pop();
	}
}

/// Elaboration pass trait (for MultiPassElaborator)
///
/// Every pass walks the hierarchy depth first and is invoked once per
/// module, children before parents.
pub trait ElabPass {
	/// Returns name of the elaboration pass
	fn name(&self) -> &'static str;

	/// Ran before each run of the pass to reset its caches
	fn init(&mut self) {}

	/// Returns the module a generator call expanded to
	fn expand_generator(&mut self, ctx: &mut ElabCtx, call: GeneratorCallId) -> Result<ModuleId, ElabError> {
		let entry = ctx.design.generator_call(call);
		match entry.result {
			Some(m) => Ok(m),
			None => {
				let name = ctx.design.generator(entry.call.generator).name.clone();
				Err(ctx.fail(ElabErrorKind::UnexpandedGenerator(name)))
			},
		}
	}

	/// Runs the pass on a single module
	fn elaborate_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError>;
}

/// Depth-first hierarchy walk of a single pass
struct PassWalker<'p> {
	pass: &'p mut dyn ElabPass,
	done: HashSet<ModuleId>,
	pending: HashSet<ModuleId>,
}

impl<'p> PassWalker<'p> {
	fn new(pass: &'p mut dyn ElabPass) -> Self {
		Self {
			pass,
			done: HashSet::new(),
			pending: HashSet::new(),
		}
	}

	fn visit_root(&mut self, ctx: &mut ElabCtx, root: Elaboratable) -> Result<ModuleId, ElabError> {
		match root {
			Elaboratable::Module(m) => {
				self.visit_module(ctx, m)?;
				Ok(m)
			},
			Elaboratable::Generator(call) => self.visit_generator(ctx, call),
		}
	}

	fn visit_generator(&mut self, ctx: &mut ElabCtx, call: GeneratorCallId) -> Result<ModuleId, ElabError> {
		let name = ctx.design.generator(ctx.design.generator_call(call).call.generator).name.clone();
		if ctx.generator_depth >= ctx.config.max_generator_depth {
			return Err(ctx.fail(ElabErrorKind::GeneratorDepthExceeded {
				name,
				depth: ctx.config.max_generator_depth,
			}));
		}

		ctx.push(ElabStackKind::Generator, name, None);
		let module = self.pass.expand_generator(ctx, call)?;
		ctx.generator_depth += 1;
		self.visit_module(ctx, module)?;
		ctx.generator_depth -= 1;
		ctx.pop();
		Ok(module)
	}

	fn visit_module(&mut self, ctx: &mut ElabCtx, module: ModuleId) -> Result<(), ElabError> {
		if ctx.design.module(module).elaborated || self.done.contains(&module) {
			return Ok(());
		}
		let name = ctx.design.module_name(module).to_owned();
		if self.pending.contains(&module) {
			return Err(ctx.fail(ElabErrorKind::CircularDependency(name)));
		}
		if ctx.stack.len() >= ctx.config.max_hierarchy_depth {
			return Err(ctx.fail(ElabErrorKind::HierarchyTooDeep(ctx.config.max_hierarchy_depth)));
		}

		let source = ctx.design.module(module).source_info;
		ctx.push(ElabStackKind::Module, name, source);
		self.pending.insert(module);

		for inst in ctx.design.all_instances(module) {
			let entry = ctx.design.instance(inst);
			let (inst_name, of, source) = (entry.name.clone(), entry.of.clone(), entry.source_info);
			ctx.push(ElabStackKind::Instance, inst_name, source);
			match of {
				Instantiable::Module(m) => self.visit_module(ctx, m)?,
				Instantiable::Generator(call) => {
					self.visit_generator(ctx, call)?;
				},
				Instantiable::Primitive(_) | Instantiable::External(_) => {},
			}
			ctx.pop();
		}

		self.pending.remove(&module);
		debug!("{}: elaborating module `{}`", self.pass.name(), ctx.design.module_name(module));
		self.pass
			.elaborate_module(ctx, module)
			.map_err(|e| e.in_context(&ctx.stack))?;
		self.done.insert(module);
		ctx.pop();
		Ok(())
	}
}

/// Multi-pass design elaborator
///
/// Passes run one after another, each over the whole hierarchy below
/// every root.
pub struct MultiPassElaborator {
	config: ElabConfig,
	passes: Vec<Box<dyn ElabPass>>,
}

impl MultiPassElaborator {
	pub fn new(config: ElabConfig) -> Self {
		Self { config, passes: vec![] }
	}

	/// Adds a new pass to the elaborator
	pub fn add_pass(&mut self, pass: Box<dyn ElabPass>) {
		info!("Registering elaboration pass: {}", pass.name());
		self.passes.push(pass);
	}

	pub fn config(&self) -> &ElabConfig {
		&self.config
	}

	/// Runs every pass over all roots and returns the elaborated top modules
	pub fn elaborate_all(&mut self, design: &mut Design, roots: &[Elaboratable]) -> Result<Vec<ModuleId>, ElabError> {
		let mut roots = roots.to_vec();
		for pass in &mut self.passes {
			info!("Running elaboration pass: {}", pass.name());
			pass.init();
			let mut walker = PassWalker::new(pass.as_mut());
			let mut ctx = ElabCtx::new(design, &self.config);
			let mut next = Vec::with_capacity(roots.len());
			for root in &roots {
				next.push(Elaboratable::Module(walker.visit_root(&mut ctx, *root)?));
			}
			roots = next;
		}

		roots
			.into_iter()
			.map(|root| match root {
				Elaboratable::Module(m) => Ok(m),
				Elaboratable::Generator(call) => {
					let entry = design.generator_call(call);
					entry.result.ok_or_else(|| {
						let name = design.generator(entry.call.generator).name.clone();
						ElabError::new(ElabErrorKind::UnexpandedGenerator(name))
					})
				},
			})
			.collect()
	}
}

/// Elaborator trait implementation for MultiPassElaborator
impl Elaborator for MultiPassElaborator {
	fn elaborate(&mut self, design: &mut Design, root: Elaboratable) -> Result<ModuleId, ElabError> {
		let modules = self.elaborate_all(design, &[root])?;
		Ok(modules[0])
	}
}
