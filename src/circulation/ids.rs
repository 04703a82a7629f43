//! Sequential human-readable identifiers (`BK-001`, `MEM-042`, ...)

use thiserror::Error;

pub const BOOK_PREFIX: &str = "BK";
pub const MEMBER_PREFIX: &str = "MEM";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Malformed identifier '{0}': expected PREFIX-NUMBER")]
    Malformed(String),
}

/// Next identifier after `last_id`, zero-padded to at least three digits.
///
/// Only the numeric suffix after the last `-` of `last_id` is used; its prefix
/// is not compared with `prefix`.
pub fn generate_id(prefix: &str, last_id: Option<&str>) -> Result<String, IdError> {
    let next = match last_id.filter(|id| !id.is_empty()) {
        Some(last) => parse_sequence(last)?
            .checked_add(1)
            .ok_or_else(|| IdError::Malformed(last.to_string()))?,
        None => 1,
    };
    Ok(format!("{}-{:03}", prefix, next))
}

/// Numeric suffix of an identifier shaped `PREFIX-NUMBER`.
pub fn parse_sequence(id: &str) -> Result<u32, IdError> {
    let malformed = || IdError::Malformed(id.to_string());

    let (prefix, digits) = id.rsplit_once('-').ok_or_else(malformed)?;
    if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    digits.parse::<u32>().map_err(|_| malformed())
}

/// Sort key placing `BK-999` before `BK-1000`.
pub fn sequence_order(id: &str) -> (usize, &str) {
    (id.len(), id)
}
