use indexmap::IndexMap;
use std::fmt;

use super::utils::checked_name;
use super::{
	AnonymousBundleId, BundleId, BundleInstanceId, BundleRefId, Connectable, Design, DesignError, Owner, Signal,
	SignalId, SourceInfo,
};

/// Item stored in a bundle definition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleAttr {
	Signal(SignalId),
	Bundle(BundleInstanceId),
}

/// Item that can be added to a bundle definition
#[derive(Clone, Debug)]
pub enum BundleItem {
	Signal(Signal),
	Bundle(BundleInstance),
}

impl From<Signal> for BundleItem {
	fn from(s: Signal) -> Self {
		BundleItem::Signal(s)
	}
}

impl From<BundleInstance> for BundleItem {
	fn from(b: BundleInstance) -> Self {
		BundleItem::Bundle(b)
	}
}

/// Named group of signals and sub-bundles with optional roles
#[derive(Clone, Debug)]
pub struct Bundle {
	pub name: String,
	pub roles: Vec<String>,
	pub namespace: IndexMap<String, BundleAttr>,
	pub source_info: Option<SourceInfo>,
}

/// Use of a bundle definition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleInstance {
	pub name: String,
	pub of: BundleId,
	pub port: bool,
	pub role: Option<String>,
	pub desc: Option<String>,
}

impl BundleInstance {
	/// Creates an internal bundle instance
	pub fn new(name: &str, of: BundleId) -> Self {
		Self {
			name: name.into(),
			of,
			port: false,
			role: None,
			desc: None,
		}
	}

	/// Creates a bundle-valued port, optionally taking one of the bundle's roles
	pub fn port(name: &str, of: BundleId, role: Option<&str>) -> Self {
		Self {
			port: true,
			role: role.map(String::from),
			..Self::new(name, of)
		}
	}
}

/// Bundle instance stored in a design
#[derive(Clone, Debug)]
pub struct BundleInstanceEntry {
	pub inst: BundleInstance,
	pub owner: Owner,
	/// Bundle references handed out for this instance, by attribute name
	pub refs: IndexMap<String, BundleRefId>,
	pub source_info: Option<SourceInfo>,
}

/// Ad-hoc collection of named connectables matching a bundle shape
#[derive(Clone, Debug, Default)]
pub struct AnonymousBundle {
	pub members: IndexMap<String, Connectable>,
}

impl AnonymousBundle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: &str, conn: impl Into<Connectable>) -> Self {
		self.members.insert(name.into(), conn.into());
		self
	}
}

/// Path from a bundle instance down to one of its leaves
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundlePath(pub Vec<String>);

impl BundlePath {
	pub fn leaf(name: &str) -> Self {
		Self(vec![name.into()])
	}

	/// Underscore-joined form used for flattened signal names
	pub fn to_name(&self) -> String {
		self.0.join("_")
	}

	pub fn starts_with(&self, prefix: &[String]) -> bool {
		self.0.starts_with(prefix)
	}

	/// Path with the first `n` segments removed
	pub fn strip(&self, n: usize) -> BundlePath {
		BundlePath(self.0[n.min(self.0.len())..].to_vec())
	}

	/// Path with `head` prepended
	pub fn prefixed(&self, head: &str) -> BundlePath {
		let mut segs = Vec::with_capacity(self.0.len() + 1);
		segs.push(head.to_owned());
		segs.extend(self.0.iter().cloned());
		BundlePath(segs)
	}
}

impl fmt::Display for BundlePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.join("."))
	}
}

impl Design {
	/// Creates a new bundle definition without roles
	#[track_caller]
	pub fn new_bundle(&mut self, name: &str) -> Result<BundleId, DesignError> {
		self.new_bundle_with_roles(name, &[])
	}

	/// Creates a new bundle definition with a set of roles
	#[track_caller]
	pub fn new_bundle_with_roles(&mut self, name: &str, roles: &[&str]) -> Result<BundleId, DesignError> {
		checked_name(name)?;
		for role in roles {
			checked_name(role)?;
		}
		let id = BundleId { id: self.bundles.len() };
		self.bundles.push(Bundle {
			name: name.into(),
			roles: roles.iter().map(|r| String::from(*r)).collect(),
			namespace: IndexMap::new(),
			source_info: Some(SourceInfo::caller()),
		});
		Ok(id)
	}

	/// Adds a signal or a sub-bundle to a bundle definition
	#[track_caller]
	pub fn add_to_bundle(&mut self, bundle: BundleId, item: impl Into<BundleItem>) -> Result<BundleAttr, DesignError> {
		let item = item.into();
		let source_info = Some(SourceInfo::caller());
		let name = match &item {
			BundleItem::Signal(s) => s.name.clone(),
			BundleItem::Bundle(b) => b.name.clone(),
		};
		checked_name(&name)?;
		if self.bundle(bundle).namespace.contains_key(&name) {
			return Err(DesignError::DuplicateName {
				name,
				container: format!("Bundle `{}`", self.bundle(bundle).name),
			});
		}

		let attr = match item {
			BundleItem::Signal(sig) => {
				let roles = &self.bundle(bundle).roles;
				for role in sig.src.iter().chain(sig.dest.iter()) {
					if !roles.contains(role) {
						return Err(DesignError::InvalidRole {
							role: role.clone(),
							bundle: self.bundle(bundle).name.clone(),
						});
					}
				}
				BundleAttr::Signal(self.push_signal(sig, Owner::Bundle(bundle), source_info)?)
			},
			BundleItem::Bundle(bi) => {
				if self.bundle_contains(bi.of, bundle) {
					return Err(DesignError::RecursiveBundle(self.bundle(bundle).name.clone()));
				}
				BundleAttr::Bundle(self.push_bundle_instance(bi, Owner::Bundle(bundle), source_info)?)
			},
		};
		self.bundles[bundle.id].namespace.insert(name, attr);
		Ok(attr)
	}

	/// Checks whether `outer` is `inner` or contains it at any depth
	fn bundle_contains(&self, outer: BundleId, inner: BundleId) -> bool {
		if outer == inner {
			return true;
		}
		self.bundle(outer).namespace.values().any(|attr| match attr {
			BundleAttr::Bundle(bi) => self.bundle_contains(self.bundle_instance(*bi).inst.of, inner),
			BundleAttr::Signal(_) => false,
		})
	}

	/// Returns the signals declared directly in a bundle, in order
	pub fn bundle_signals(&self, bundle: BundleId) -> Vec<SignalId> {
		self.bundle(bundle)
			.namespace
			.values()
			.filter_map(|attr| match attr {
				BundleAttr::Signal(id) => Some(*id),
				BundleAttr::Bundle(_) => None,
			})
			.collect()
	}

	/// Checks if the bundle declares any sub-bundles
	pub fn bundle_has_sub_bundles(&self, bundle: BundleId) -> bool {
		self.bundle(bundle)
			.namespace
			.values()
			.any(|attr| matches!(attr, BundleAttr::Bundle(_)))
	}

	/// Leaf signals of a bundle definition, depth first, keyed by path
	pub fn bundle_leaves(&self, bundle: BundleId) -> Vec<(BundlePath, SignalId)> {
		let mut leaves = vec![];
		for (name, attr) in &self.bundle(bundle).namespace {
			match attr {
				BundleAttr::Signal(id) => leaves.push((BundlePath::leaf(name), *id)),
				BundleAttr::Bundle(bi) => {
					let sub = self.bundle_leaves(self.bundle_instance(*bi).inst.of);
					leaves.extend(sub.into_iter().map(|(path, id)| (path.prefixed(name), id)));
				},
			}
		}
		leaves
	}

	/// Registers an anonymous bundle
	pub fn add_anonymous_bundle(&mut self, bundle: AnonymousBundle) -> Result<AnonymousBundleId, DesignError> {
		for name in bundle.members.keys() {
			checked_name(name)?;
		}
		let id = AnonymousBundleId {
			id: self.anon_bundles.len(),
		};
		self.anon_bundles.push(bundle);
		Ok(id)
	}
}
