use std::collections::HashSet;

use super::utils::checked_name;
use super::{Design, DesignError, ExternalModuleId, Params, Signal};

/// Module defined outside of the design, known only by its ports
#[derive(Clone, Debug)]
pub struct ExternalModule {
	/// Namespace the module lives in, e.g. a PDK name
	pub domain: String,
	pub name: String,
	pub ports: Vec<Signal>,
	pub desc: Option<String>,
}

impl ExternalModule {
	pub fn new(domain: &str, name: &str, ports: Vec<Signal>) -> Self {
		Self {
			domain: domain.into(),
			name: name.into(),
			ports,
			desc: None,
		}
	}
}

/// Parameterized use of an external module
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalModuleCall {
	pub module: ExternalModuleId,
	pub params: Params,
}

impl ExternalModuleCall {
	pub fn new(module: ExternalModuleId, params: Params) -> Self {
		Self { module, params }
	}
}

impl Design {
	/// Declares an external module
	pub fn add_external_module(&mut self, module: ExternalModule) -> Result<ExternalModuleId, DesignError> {
		checked_name(&module.name)?;
		let mut seen = HashSet::new();
		for port in &module.ports {
			checked_name(&port.name)?;
			if port.width == 0 {
				return Err(DesignError::InvalidWidth(port.name.clone()));
			}
			if !seen.insert(port.name.as_str()) {
				return Err(DesignError::DuplicateName {
					name: port.name.clone(),
					container: format!("ExternalModule `{}`", module.name),
				});
			}
		}
		let id = ExternalModuleId {
			id: self.external_modules.len(),
		};
		self.external_modules.push(module);
		Ok(id)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_duplicate_external_ports() -> Result<(), DesignError> {
		let mut d = Design::new();
		let ok = d.add_external_module(ExternalModule::new(
			"pdk",
			"nch",
			vec![Signal::inout("d", 1), Signal::inout("g", 1)],
		))?;
		assert_eq!(d.external_module(ok).domain, "pdk");
		let res = d.add_external_module(ExternalModule::new(
			"pdk",
			"bad",
			vec![Signal::inout("d", 1), Signal::input("d", 1)],
		));
		assert!(matches!(res, Err(DesignError::DuplicateName { .. })));
		Ok(())
	}
}
