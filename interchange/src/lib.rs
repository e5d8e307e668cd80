pub mod error;
pub mod netlist;
pub mod package;

pub use error::InterchangeError;
pub use netlist::{netlist, sanitize, NetlistFormat, Netlister};
pub use package::{
	Concat, Connection, ExternalModule, Instance, Module, Package, ParamValue, Params, Port, PortDirection,
	QualifiedName, Reference, Signal, Slice, Target, PRIMITIVES_DOMAIN,
};
