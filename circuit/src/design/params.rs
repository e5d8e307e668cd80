pub use interchange::{ParamValue, Params};

/// Longest readable parameter name kept as is
const MAX_READABLE_LEN: usize = 128;

/// Deterministic name for a set of parameter values
///
/// Short sets produce `k1=v1 k2=v2`. Longer ones are replaced by a
/// SHA-256 digest of their JSON form.
pub fn unique_name(params: &Params) -> String {
	let name = params
		.iter()
		.map(|(k, v)| format!("{}={}", k, v))
		.collect::<Vec<_>>()
		.join(" ");
	if name.len() < MAX_READABLE_LEN {
		return name;
	}
	sha256::digest(params_key(params))
}

/// Canonical JSON form of a set of parameter values
///
/// Values keep their type tag, so `1` and `"1"` never share a key.
pub fn params_key(params: &Params) -> String {
	serde_json::to_string(params).unwrap_or_default()
}
