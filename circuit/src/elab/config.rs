/// Limits applied during elaboration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElabConfig {
	/// Longest name a generated signal or instance may get
	pub max_name_len: usize,

	/// Deepest module hierarchy walked before giving up
	pub max_hierarchy_depth: usize,

	/// Deepest nesting of generator calls
	pub max_generator_depth: usize,
}

impl Default for ElabConfig {
	fn default() -> Self {
		Self {
			max_name_len: 511,
			max_hierarchy_depth: 1024,
			max_generator_depth: 64,
		}
	}
}
