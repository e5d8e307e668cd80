pub mod design;
pub mod elab;
pub mod exchange_error;
pub mod exports;
pub mod imports;

pub use design::{
	Connectable, Design, DesignError, Instantiable, ModuleId, ParamValue, Params, Primitive, PrimitiveCall, Signal,
	SignalId,
};
pub use elab::{elaborate, elaborate_all, ElabConfig, ElabError, ElabErrorKind, Elaboratable, Elaborator, FullElaborator};
pub use exchange_error::ExchangeError;
pub use exports::to_package;
pub use imports::{from_package, Imported};
