//! Validation of branch and ref names before they reach a git command line.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::errors::GitError;

fn dangerous_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[;&|$(){}\[\]<>'"\\]"#).expect("static regex is valid"))
}

/// Check that `name` is safe to interpolate into git command arguments.
///
/// Rejects empty names, shell metacharacters, a leading or trailing `/`,
/// and `..` sequences.
pub fn validate_ref_name(name: &str) -> Result<(), GitError> {
    let invalid = |reason: &str| GitError::InvalidRefName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if dangerous_chars().is_match(name) {
        return Err(invalid("contains invalid characters"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("cannot start or end with '/'"));
    }
    if name.contains("..") {
        return Err(invalid("cannot contain '..'"));
    }
    Ok(())
}
