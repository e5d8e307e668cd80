use super::{BundleId, ModuleId, SourceInfo};

/// Whether a signal is visible outside of its module
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
	Internal,
	Port,
}

/// Port direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDir {
	Input,
	Output,
	Inout,
	None,
}

/// Named, fixed-width wire
///
/// `src` and `dest` name bundle roles and only matter for signals
/// declared inside a bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
	pub name: String,
	pub width: usize,
	pub visibility: Visibility,
	pub direction: PortDir,
	pub src: Option<String>,
	pub dest: Option<String>,
	pub desc: Option<String>,
}

impl Signal {
	/// Creates an internal signal
	pub fn new(name: &str, width: usize) -> Self {
		Self {
			name: name.into(),
			width,
			visibility: Visibility::Internal,
			direction: PortDir::None,
			src: None,
			dest: None,
			desc: None,
		}
	}

	/// Creates an undirected port
	pub fn port(name: &str, width: usize) -> Self {
		Self {
			visibility: Visibility::Port,
			..Self::new(name, width)
		}
	}

	pub fn input(name: &str, width: usize) -> Self {
		Self::port(name, width).with_direction(PortDir::Input)
	}

	pub fn output(name: &str, width: usize) -> Self {
		Self::port(name, width).with_direction(PortDir::Output)
	}

	pub fn inout(name: &str, width: usize) -> Self {
		Self::port(name, width).with_direction(PortDir::Inout)
	}

	pub fn with_direction(mut self, direction: PortDir) -> Self {
		self.direction = direction;
		self
	}

	/// Sets the role driving this signal within a bundle
	pub fn with_src(mut self, role: &str) -> Self {
		self.src = Some(role.into());
		self
	}

	/// Sets the role receiving this signal within a bundle
	pub fn with_dest(mut self, role: &str) -> Self {
		self.dest = Some(role.into());
		self
	}

	pub fn with_desc(mut self, desc: &str) -> Self {
		self.desc = Some(desc.into());
		self
	}

	pub fn is_port(&self) -> bool {
		self.visibility == Visibility::Port
	}

	/// Copy of this signal as a plain internal wire with a new name
	pub fn internal_copy(&self, name: &str) -> Self {
		Self {
			desc: self.desc.clone(),
			..Self::new(name, self.width)
		}
	}
}

/// Container owning a signal or a bundle instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
	Module(ModuleId),
	Bundle(BundleId),
}

/// Signal stored in a design
#[derive(Clone, Debug)]
pub struct SignalEntry {
	pub signal: Signal,
	pub owner: Owner,
	pub source_info: Option<SourceInfo>,
}
