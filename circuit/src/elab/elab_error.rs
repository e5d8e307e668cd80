use std::fmt;
use thiserror::Error;

use crate::design::{DesignError, SourceInfo};

/// Kind of hierarchy level an elaboration error was raised in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElabStackKind {
	Module,
	Instance,
	Generator,
}

/// One level of the hierarchy being elaborated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElabStackEntry {
	pub kind: ElabStackKind,
	pub name: String,
	pub source: Option<SourceInfo>,
}

impl fmt::Display for ElabStackEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match self.kind {
			ElabStackKind::Module => "Module",
			ElabStackKind::Instance => "Instance",
			ElabStackKind::Generator => "Generator",
		};
		write!(f, "in {} `{}`", kind, self.name)?;
		if let Some(source) = &self.source {
			write!(f, " ({})", source)?;
		}
		Ok(())
	}
}

fn format_path(path: &[ElabStackEntry]) -> String {
	path.iter().map(|entry| format!("{}\n", entry)).collect()
}

#[derive(Clone, Debug, Error)]
pub enum ElabErrorKind {
	#[error(transparent)]
	Design(#[from] DesignError),

	#[error("Missing connection to Port `{port}` on Instance `{instance}` in Module `{module}`")]
	UnconnectedPort {
		port: String,
		instance: String,
		module: String,
	},

	#[error("Connection to invalid Port(s) {ports:?} on Instance `{instance}` in Module `{module}`")]
	InvalidPort {
		ports: Vec<String>,
		instance: String,
		module: String,
	},

	#[error("Width mismatch on Port `{port}` of Instance `{instance}`: port is {port_width} bits, connection is {width}")]
	WidthMismatch {
		port: String,
		instance: String,
		width: usize,
		port_width: usize,
	},

	#[error("Invalid connection of width {width} to Port `{port}` of InstanceArray `{instance}`, expected {port_width} or {array_width}")]
	ArrayWidthMismatch {
		port: String,
		instance: String,
		width: usize,
		port_width: usize,
		array_width: usize,
	},

	#[error("Bundle mismatch on Port `{port}` of Instance `{instance}`: {reason}")]
	BundleTypeMismatch {
		port: String,
		instance: String,
		reason: String,
	},

	#[error("Invalid connection to Port `{port}` of Instance `{instance}`: {reason}")]
	InvalidConnection {
		port: String,
		instance: String,
		reason: String,
	},

	#[error("No signal `{path}` available for bundle `{bundle}`")]
	MissingBundleSignal { bundle: String, path: String },

	#[error("InstanceBundle `{instance}` uses Bundle `{bundle}` which has sub-bundles")]
	NestedInstanceBundle { instance: String, bundle: String },

	#[error("Module `{0}` instantiates itself")]
	CircularDependency(String),

	#[error("NoConn connected to {refs} ports (expected exactly one)")]
	MultiplyConnectedNoConn { refs: usize },

	#[error("Net of `{net}` is driven by {count} distinct signals")]
	MultipleSources { net: String, count: usize },

	#[error("Module hierarchy deeper than {0} levels")]
	HierarchyTooDeep(usize),

	#[error("Generator `{name}` nested deeper than {depth} calls")]
	GeneratorDepthExceeded { name: String, depth: usize },

	#[error("Generator `{0}` has not been expanded")]
	UnexpandedGenerator(String),

	#[error("{kind} `{name}` in Module `{module}` belongs to {owner}")]
	Orphan {
		kind: &'static str,
		name: String,
		module: String,
		owner: String,
	},

	#[error("Unresolved {0} remains after reference resolution")]
	UnresolvedReference(String),

	#[error("No free name for `{name}` within {len} characters")]
	NameSpaceExhausted { name: String, len: usize },

	#[error("Module was never named")]
	UnnamedModule,
}

/// Elaboration failure along with the hierarchy path it happened in
#[derive(Clone, Debug, Error)]
#[error("{}{kind}", format_path(.path))]
pub struct ElabError {
	pub kind: ElabErrorKind,
	pub path: Vec<ElabStackEntry>,
}

impl ElabError {
	pub fn new(kind: ElabErrorKind) -> Self {
		Self { kind, path: vec![] }
	}

	/// Attaches a hierarchy path unless one is already present
	pub(crate) fn in_context(mut self, stack: &[ElabStackEntry]) -> Self {
		if self.path.is_empty() {
			self.path = stack.to_vec();
		}
		self
	}
}

impl From<ElabErrorKind> for ElabError {
	fn from(kind: ElabErrorKind) -> Self {
		Self::new(kind)
	}
}

impl From<DesignError> for ElabError {
	fn from(e: DesignError) -> Self {
		Self::new(e.into())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_display_with_path() {
		let err = ElabError {
			kind: ElabErrorKind::UnnamedModule,
			path: vec![
				ElabStackEntry {
					kind: ElabStackKind::Module,
					name: "top".into(),
					source: Some(SourceInfo { file: "top.rs", line: 3 }),
				},
				ElabStackEntry {
					kind: ElabStackKind::Instance,
					name: "u0".into(),
					source: None,
				},
			],
		};
		assert_eq!(
			err.to_string(),
			"in Module `top` (top.rs:3)\nin Instance `u0`\nModule was never named"
		);
	}
}
