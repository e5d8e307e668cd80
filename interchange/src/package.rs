use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::InterchangeError;

/// Domain under which the built-in primitives are exported
pub const PRIMITIVES_DOMAIN: &str = "hdl21.primitives";

/// Domain-qualified name of a module
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
	pub domain: String,
	pub name: String,
}

impl QualifiedName {
	pub fn new(domain: &str, name: &str) -> Self {
		Self {
			domain: domain.into(),
			name: name.into(),
		}
	}
}

impl fmt::Display for QualifiedName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.domain.is_empty() {
			write!(f, "{}", self.name)
		}
		else {
			write!(f, "{}.{}", self.domain, self.name)
		}
	}
}

/// Parameter value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
	Int(i64),
	Double(f64),
	String(String),
}

impl fmt::Display for ParamValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ParamValue::Int(v) => write!(f, "{}", v),
			ParamValue::Double(v) => write!(f, "{}", v),
			ParamValue::String(s) => write!(f, "{}", s),
		}
	}
}

impl From<i64> for ParamValue {
	fn from(v: i64) -> Self {
		ParamValue::Int(v)
	}
}

impl From<f64> for ParamValue {
	fn from(v: f64) -> Self {
		ParamValue::Double(v)
	}
}

impl From<&str> for ParamValue {
	fn from(v: &str) -> Self {
		ParamValue::String(v.into())
	}
}

/// Named parameter values, kept sorted by name
pub type Params = BTreeMap<String, ParamValue>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
	Input,
	Output,
	Inout,
	None,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
	pub name: String,
	pub width: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
	pub signal: Signal,
	pub direction: PortDirection,
}

/// Contiguous bit range of a signal, both bounds inclusive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
	pub signal: String,
	pub top: usize,
	pub bot: usize,
}

/// Concatenation, least significant part first
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concat {
	pub parts: Vec<Connection>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
	Sig(String),
	Slice(Slice),
	Concat(Concat),
}

/// Instance target
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
	Local(QualifiedName),
	External(QualifiedName),
}

impl fmt::Display for Reference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Reference::Local(qn) => write!(f, "{}", qn),
			Reference::External(qn) => write!(f, "external {}", qn),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
	pub name: String,
	pub module: Reference,
	#[serde(default)]
	pub parameters: Params,
	#[serde(default)]
	pub connections: IndexMap<String, Connection>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Module {
	pub name: QualifiedName,
	#[serde(default)]
	pub ports: Vec<Port>,
	#[serde(default)]
	pub signals: Vec<Signal>,
	#[serde(default)]
	pub instances: Vec<Instance>,
	/// Named parameter defaults
	#[serde(default)]
	pub parameters: Params,
}

impl Module {
	/// Looks up a port or internal signal by name
	pub fn get_signal(&self, name: &str) -> Option<&Signal> {
		self.ports
			.iter()
			.map(|p| &p.signal)
			.chain(self.signals.iter())
			.find(|s| s.name == name)
	}

	/// Width of a connection in the context of this module
	pub fn connection_width(&self, conn: &Connection) -> Result<usize, InterchangeError> {
		match conn {
			Connection::Sig(name) => Ok(self.signal_or_err(name)?.width),
			Connection::Slice(s) => {
				let sig = self.signal_or_err(&s.signal)?;
				if s.bot > s.top || s.top >= sig.width {
					return Err(InterchangeError::InvalidSlice {
						module: self.name.name.clone(),
						signal: s.signal.clone(),
						top: s.top,
						bot: s.bot,
					});
				}
				Ok(s.top - s.bot + 1)
			},
			Connection::Concat(c) => {
				if c.parts.is_empty() {
					return Err(InterchangeError::EmptyConcat {
						module: self.name.name.clone(),
					});
				}
				c.parts.iter().map(|p| self.connection_width(p)).sum()
			},
		}
	}

	fn signal_or_err(&self, name: &str) -> Result<&Signal, InterchangeError> {
		self.get_signal(name).ok_or_else(|| InterchangeError::UnknownSignal {
			module: self.name.name.clone(),
			signal: name.into(),
		})
	}
}

/// Module defined outside of the package
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalModule {
	pub name: QualifiedName,
	#[serde(default)]
	pub ports: Vec<Port>,
	#[serde(default)]
	pub parameters: Params,
}

/// Resolved instance target
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
	Module(&'a Module),
	External(&'a ExternalModule),
}

impl<'a> Target<'a> {
	pub fn name(&self) -> &'a QualifiedName {
		match self {
			Target::Module(m) => &m.name,
			Target::External(e) => &e.name,
		}
	}

	pub fn ports(&self) -> &'a [Port] {
		match self {
			Target::Module(m) => &m.ports,
			Target::External(e) => &e.ports,
		}
	}

	/// Checks if the target is one of the built-in primitives
	pub fn is_primitive(&self) -> bool {
		matches!(self, Target::External(e) if e.name.domain == PRIMITIVES_DOMAIN)
	}
}

/// Collection of elaborated modules and the external modules they reference
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Package {
	pub domain: String,
	#[serde(default)]
	pub modules: Vec<Module>,
	#[serde(default)]
	pub ext_modules: Vec<ExternalModule>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub desc: Option<String>,
}

impl Package {
	pub fn new(domain: &str) -> Self {
		Self {
			domain: domain.into(),
			modules: vec![],
			ext_modules: vec![],
			desc: None,
		}
	}

	pub fn from_json(json: &str) -> Result<Self, InterchangeError> {
		Ok(serde_json::from_str(json)?)
	}

	pub fn to_json(&self) -> Result<String, InterchangeError> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	/// Resolves an instance reference
	pub fn resolve(&self, reference: &Reference) -> Result<Target<'_>, InterchangeError> {
		let found = match reference {
			Reference::Local(qn) => self.modules.iter().find(|m| &m.name == qn).map(Target::Module),
			Reference::External(qn) => self.ext_modules.iter().find(|e| &e.name == qn).map(Target::External),
		};
		found.ok_or_else(|| InterchangeError::UnknownReference(reference.clone()))
	}

	/// Checks name uniqueness and that every instance reference resolves
	pub fn validate(&self) -> Result<(), InterchangeError> {
		let mut names = HashSet::new();
		let defined = self
			.modules
			.iter()
			.map(|m| &m.name)
			.chain(self.ext_modules.iter().map(|e| &e.name));
		for name in defined {
			if !names.insert(name) {
				return Err(InterchangeError::DuplicateModule(name.clone()));
			}
		}

		for module in &self.modules {
			let mut signal_names = HashSet::new();
			for sig in module.ports.iter().map(|p| &p.signal).chain(module.signals.iter()) {
				if !signal_names.insert(&sig.name) {
					return Err(InterchangeError::DuplicateSignal {
						module: module.name.name.clone(),
						signal: sig.name.clone(),
					});
				}
			}

			for inst in &module.instances {
				self.resolve(&inst.module)?;
				for conn in inst.connections.values() {
					module.connection_width(conn)?;
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn inverter_package() -> Package {
		let mut pkg = Package::new("lib");
		pkg.ext_modules.push(ExternalModule {
			name: QualifiedName::new("pdk", "inv"),
			ports: vec![
				Port {
					signal: Signal { name: "i".into(), width: 1 },
					direction: PortDirection::Input,
				},
				Port {
					signal: Signal { name: "z".into(), width: 1 },
					direction: PortDirection::Output,
				},
			],
			parameters: Params::new(),
		});
		let mut connections = IndexMap::new();
		connections.insert("i".into(), Connection::Sig("a".into()));
		connections.insert(
			"z".into(),
			Connection::Slice(Slice {
				signal: "b".into(),
				top: 1,
				bot: 1,
			}),
		);
		pkg.modules.push(Module {
			name: QualifiedName::new("lib", "top"),
			ports: vec![Port {
				signal: Signal { name: "a".into(), width: 1 },
				direction: PortDirection::Input,
			}],
			signals: vec![Signal { name: "b".into(), width: 2 }],
			instances: vec![Instance {
				name: "u0".into(),
				module: Reference::External(QualifiedName::new("pdk", "inv")),
				parameters: Params::new(),
				connections,
			}],
			parameters: Params::new(),
		});
		pkg
	}

	#[test]
	fn test_json_round_trip_keeps_qualified_names() -> Result<(), InterchangeError> {
		let pkg = inverter_package();
		let back = Package::from_json(&pkg.to_json()?)?;
		assert_eq!(back, pkg);
		assert_eq!(back.ext_modules[0].name, QualifiedName::new("pdk", "inv"));
		Ok(())
	}

	#[test]
	fn test_unknown_reference() {
		let mut pkg = inverter_package();
		pkg.modules[0].instances[0].module = Reference::External(QualifiedName::new("other", "inv"));
		assert!(matches!(pkg.validate(), Err(InterchangeError::UnknownReference(_))));
	}

	#[test]
	fn test_local_reference_needs_matching_domain() {
		let mut pkg = inverter_package();
		pkg.modules[0].instances[0].module = Reference::Local(QualifiedName::new("pdk", "top"));
		assert!(matches!(pkg.validate(), Err(InterchangeError::UnknownReference(_))));
	}

	#[test]
	fn test_slice_out_of_range() {
		let mut pkg = inverter_package();
		pkg.modules[0].instances[0]
			.connections
			.insert("z".into(), Connection::Slice(Slice {
				signal: "b".into(),
				top: 2,
				bot: 0,
			}));
		assert!(matches!(pkg.validate(), Err(InterchangeError::InvalidSlice { .. })));
	}

	#[test]
	fn test_param_values_from_json() -> Result<(), InterchangeError> {
		let params: Params = serde_json::from_str(r#"{"w": {"double": 1.5}, "n": {"int": 3}, "m": {"string": "nch"}}"#)?;
		assert_eq!(params["w"], ParamValue::Double(1.5));
		assert_eq!(params["n"], ParamValue::Int(3));
		assert_eq!(params["m"].to_string(), "nch");
		Ok(())
	}
}
