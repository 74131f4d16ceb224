use regex::Regex;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Validates a username at signup.
///
/// Rules:
/// 1. Length between 3 and 32 characters
/// 2. ASCII letters, digits, `_`, `.` and `-` only
pub fn validate_username(username: &str) -> Result<(), String> {
    // 1. Length check
    // Byte length is fine here: step 2 rejects anything that isn't ASCII anyway.
    if username.len() < 3 {
        return Err("username must be at least 3 characters long".to_string());
    }
    if username.len() > 32 {
        return Err("username must be at most 32 characters long".to_string());
    }

    // 2. Charset check
    // No spaces, no quotes, no emoji. Usernames end up in logs and URLs.
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static regex"));

    if !re.is_match(username) {
        return Err(
            "username may only contain letters, digits, '_', '.' and '-'".to_string(),
        );
    }

    Ok(())
}

/// Length is the only rule. Anything else is the user's business.
pub fn validate_password(password: &str) -> Result<(), String> {
    // Counted in characters, so a passphrase in any script gets the same deal.
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    Ok(())
}

/// Fails with the standard "missing field" message when any value is blank.
///
/// `fields` is listed in the message in order so clients know what to send.
pub fn require_fields(values: &[&str], fields: &[&str]) -> Result<(), String> {
    // Whitespace-only counts as missing. "   " is not a poll title.
    if values.iter().any(|v| v.trim().is_empty()) {
        // Every required field gets named, not just the blank ones. Clients
        // already rely on this exact wording.
        let names: Vec<String> = fields.iter().map(|f| format!("'{f}'")).collect();
        return Err(format!(
            "missing one or more required field [{}]",
            names.join(", ")
        ));
    }
    Ok(())
}

/// Parses a numeric id from a path segment.
///
/// Ids come from BIGSERIAL columns, so zero and negatives can't exist and are
/// treated as garbage along with everything else.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.l-i_c3").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username("alice;drop").is_err());
    }

    #[test]
    fn passwords() {
        assert!(validate_password("pw123456").is_ok());
        assert!(validate_password("pw12345").is_err());
    }

    #[test]
    fn missing_fields_message() {
        let err = require_fields(&["alice", ""], &["username", "password"]).unwrap_err();
        assert_eq!(err, "missing one or more required field ['username', 'password']");
        assert!(require_fields(&["alice", "pw"], &["username", "password"]).is_ok());
        assert!(require_fields(&["   "], &["title"]).is_err());
    }

    #[test]
    fn ids() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
    }
}
