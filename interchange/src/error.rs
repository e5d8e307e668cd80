use std::fmt;
use thiserror::Error;

use crate::{QualifiedName, Reference};

/// Errors raised while reading, validating or netlisting a package
#[derive(Debug, Error)]
pub enum InterchangeError {
	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	FormatError(#[from] fmt::Error),

	#[error("Reference `{0}` resolves to neither a local nor an external module")]
	UnknownReference(Reference),

	#[error("Module `{0}` is defined more than once")]
	DuplicateModule(QualifiedName),

	#[error("Unknown signal `{signal}` in module `{module}`")]
	UnknownSignal { module: String, signal: String },

	#[error("Duplicate signal `{signal}` in module `{module}`")]
	DuplicateSignal { module: String, signal: String },

	#[error("Invalid slice {signal}[{top}:{bot}] in module `{module}`")]
	InvalidSlice {
		module: String,
		signal: String,
		top: usize,
		bot: usize,
	},

	#[error("Empty concatenation in module `{module}`")]
	EmptyConcat { module: String },

	#[error("Unconnected port `{port}` on instance `{instance}` in module `{module}`")]
	UnconnectedPort {
		module: String,
		instance: String,
		port: String,
	},

	#[error("Connection to unknown port `{port}` on instance `{instance}` in module `{module}`")]
	UnknownPort {
		module: String,
		instance: String,
		port: String,
	},

	#[error("Port `{port}` of module `{module}` has no direction and cannot be written as Verilog")]
	UndirectedPort { module: String, port: String },

	#[error("Instance `{instance}` of primitive `{primitive}` cannot be written as Verilog")]
	PrimitiveInVerilog { instance: String, primitive: String },

	#[error("Unknown primitive `{0}`")]
	UnknownPrimitive(String),

	#[error("Invalid netlist format `{0}`")]
	InvalidFormat(String),
}
