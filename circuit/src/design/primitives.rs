use super::{Params, Signal};

/// Ideal circuit elements understood by every simulator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
	Resistor,
	Capacitor,
	Inductor,
	VoltageSource,
	CurrentSource,
	Mos,
	Diode,
}

impl Primitive {
	pub const ALL: [Primitive; 7] = [
		Primitive::Resistor,
		Primitive::Capacitor,
		Primitive::Inductor,
		Primitive::VoltageSource,
		Primitive::CurrentSource,
		Primitive::Mos,
		Primitive::Diode,
	];

	pub fn name(&self) -> &'static str {
		match self {
			Primitive::Resistor => "Resistor",
			Primitive::Capacitor => "Capacitor",
			Primitive::Inductor => "Inductor",
			Primitive::VoltageSource => "VoltageSource",
			Primitive::CurrentSource => "CurrentSource",
			Primitive::Mos => "Mos",
			Primitive::Diode => "Diode",
		}
	}

	pub fn from_name(name: &str) -> Option<Primitive> {
		Self::ALL.into_iter().find(|p| p.name() == name)
	}

	/// Fixed port list, all single-bit and undirected
	pub fn ports(&self) -> Vec<Signal> {
		let names: &[&str] = match self {
			Primitive::Mos => &["d", "g", "s", "b"],
			_ => &["p", "n"],
		};
		names.iter().map(|n| Signal::port(n, 1)).collect()
	}
}

/// Parameterized use of a primitive
#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveCall {
	pub prim: Primitive,
	pub params: Params,
}

impl PrimitiveCall {
	pub fn new(prim: Primitive, params: Params) -> Self {
		Self { prim, params }
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_names_round_trip() {
		for prim in Primitive::ALL {
			assert_eq!(Primitive::from_name(prim.name()), Some(prim));
		}
		assert_eq!(Primitive::from_name("Transistor"), None);
		assert_eq!(Primitive::Diode.ports().len(), 2);
	}
}
