use thiserror::Error;

/// Represents an error that can occur during design construction.
/// Elaboration errors are not accounted for here.
#[derive(Clone, Debug, Error)]
pub enum DesignError {
	#[error("Invalid name `{0}`")]
	InvalidName(String),

	#[error("Name `{name}` is already defined in {container}")]
	DuplicateName { name: String, container: String },

	#[error("Module `{0}` is elaborated and can no longer be modified")]
	ElaboratedModule(String),

	#[error("Signal `{0}` must be at least one bit wide")]
	InvalidWidth(String),

	#[error("Instance array `{0}` must have at least one element")]
	EmptyArray(String),

	#[error("Role `{role}` is not defined by Bundle `{bundle}`")]
	InvalidRole { role: String, bundle: String },

	#[error("Bundle `{0}` would contain itself")]
	RecursiveBundle(String),

	#[error("Bundle `{bundle}` has no attribute `{attr}`")]
	UnknownBundleAttr { bundle: String, attr: String },

	#[error("Attribute `{0}` is a signal and cannot be referenced as a bundle")]
	NotABundle(String),

	#[error("Port `{port}` is not defined on `{target}`")]
	UnknownPort { port: String, target: String },

	#[error("Ports of instance bundle `{0}` cannot be referenced")]
	PortRefOnInstanceBundle(String),

	#[error("Instance target `{0}` has not been generated yet")]
	UnresolvedTarget(String),

	#[error("Cannot slice a {0}")]
	NotSliceable(&'static str),

	#[error("Cannot concatenate a {0}")]
	NotConcatable(&'static str),

	#[error("{0} has no scalar width")]
	NotScalar(String),

	#[error("Index {index} out of range for width {width}")]
	SliceIndexOutOfRange { index: isize, width: usize },

	#[error("Invalid slice range [{start}:{stop}:{step}] for width {width}")]
	InvalidSliceRange {
		start: isize,
		stop: isize,
		step: isize,
		width: usize,
	},

	#[error("Slice step cannot be zero")]
	ZeroSliceStep,

	#[error("Concatenation must have at least one part")]
	EmptyConcat,

	#[error("{0} was already resolved")]
	AlreadyResolved(String),

	#[error("Generator `{name}` failed: {message}")]
	GeneratorFailed { name: String, message: String },
}
