use lazy_static::lazy_static;
use regex::Regex;

use super::DesignError;

lazy_static! {
	static ref VALID_ID_REGEX: Regex = Regex::new(r"^[a-zA-Z_][0-9a-zA-Z_]*$").unwrap();
}

/// Checks if given name is a valid attribute name
pub(super) fn is_name_valid(name: &str) -> bool {
	VALID_ID_REGEX.is_match(name)
}

/// Returns the name back if it is valid
pub(super) fn checked_name(name: &str) -> Result<&str, DesignError> {
	if is_name_valid(name) {
		Ok(name)
	}
	else {
		Err(DesignError::InvalidName(name.into()))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_valid_names() {
		assert!(is_name_valid("inp"));
		assert!(is_name_valid("bus222"));
		assert!(is_name_valid("x_p_"));
		assert!(is_name_valid("_lorem__ipsum_22_33_whatever"));
	}

	#[test]
	fn test_invalid_names() {
		assert!(!is_name_valid("$$fff"));
		assert!(!is_name_valid("1horse"));
		assert!(!is_name_valid("hor!se"));
		assert!(!is_name_valid("hor se"));
		assert!(checked_name("a.b").is_err());
	}
}
