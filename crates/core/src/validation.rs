//! Input sanitization and length checks
//!
//! Everything typed by a user passes through here before it is sent or
//! stored. Sanitizing strips HTML metacharacters; lengths are counted in
//! characters after sanitizing.

use crate::error::{Error, Result};

/// Maximum chat message length
pub const MAX_MESSAGE_CHARS: usize = 500;
/// Nickname length bounds
pub const MIN_NICKNAME_CHARS: usize = 3;
pub const MAX_NICKNAME_CHARS: usize = 20;
/// Maximum bio length
pub const MAX_BIO_CHARS: usize = 100;

const STRIPPED: [char; 5] = ['<', '>', '"', '\'', '&'];

/// Remove HTML metacharacters, keeping everything else in order
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !STRIPPED.contains(c)).collect()
}

fn clean(text: &str) -> String {
    sanitize(text).trim().to_string()
}

/// Sanitize an outgoing chat message and check its length
pub fn validate_message(text: &str) -> Result<String> {
    let cleaned = clean(text);
    let len = cleaned.chars().count();
    if len == 0 {
        return Err(Error::Validation("message is empty".into()));
    }
    if len > MAX_MESSAGE_CHARS {
        return Err(Error::Validation(format!(
            "message too long ({len} chars, max {MAX_MESSAGE_CHARS})"
        )));
    }
    Ok(cleaned)
}

pub fn validate_nickname(nickname: &str) -> Result<String> {
    let cleaned = clean(nickname);
    let len = cleaned.chars().count();
    if !(MIN_NICKNAME_CHARS..=MAX_NICKNAME_CHARS).contains(&len) {
        return Err(Error::Validation(format!(
            "nickname must be {MIN_NICKNAME_CHARS}-{MAX_NICKNAME_CHARS} characters"
        )));
    }
    Ok(cleaned)
}

pub fn validate_bio(bio: &str) -> Result<String> {
    let cleaned = clean(bio);
    if cleaned.chars().count() > MAX_BIO_CHARS {
        return Err(Error::Validation(format!(
            "bio must be at most {MAX_BIO_CHARS} characters"
        )));
    }
    Ok(cleaned)
}
