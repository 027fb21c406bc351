//! Identifier validation
//!
//! Content and grantee ids come from callers verbatim; they are checked
//! before any repository call is made for them.

use once_cell::sync::Lazy;
use regex::Regex;

use steward_core::{GranteeRef, Result, StewardError};

/// Maximum length of a content or grantee id
pub const MAX_ID_LENGTH: usize = 255;

/// Letters, digits and `._:@-`, starting with a letter or digit
static ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._:@-]*$").expect("id pattern compiles"));

/// Check that `id` is usable as a content or grantee id
pub fn validate_id(field: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(StewardError::invalid_input(format!("{field} is required")));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(StewardError::invalid_input(format!(
            "{field} must be at most {MAX_ID_LENGTH} characters"
        )));
    }
    if !ID_REGEX.is_match(id) {
        return Err(StewardError::invalid_input(format!(
            "{field} '{id}' contains unsupported characters"
        )));
    }
    Ok(())
}

pub fn validate_content_id(id: &str) -> Result<()> {
    validate_id("content id", id)
}

pub fn validate_grantee(grantee: &GranteeRef) -> Result<()> {
    validate_id("grantee id", &grantee.id)
}
