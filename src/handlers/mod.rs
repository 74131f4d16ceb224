pub mod auth;
pub mod health;
pub mod poll;
pub mod vote;

use crate::error::ApiError;
use crate::utils::validation::parse_id;

/// Parses an id path segment, naming the resource in the 400 message.
fn id_param(raw: &str, what: &'static str) -> Result<i64, ApiError> {
    parse_id(raw).ok_or_else(|| ApiError::Validation(format!("invalid {what} ID")))
}
