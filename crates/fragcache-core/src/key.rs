//! Cache key validation.
//!
//! Keys are built by integrator code, never by end users, so a key that
//! fails validation is a programming mistake. Validation never transforms
//! the key: what the caller passed is exactly what gets stored.

use std::fmt;
use thiserror::Error;

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Punctuation allowed in keys besides ASCII letters and digits.
pub const KEY_PUNCTUATION: &str = "~_!&=|.-+ ";

/// Reasons a string cannot be used as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key is longer than [`MAX_KEY_LEN`] bytes.
    #[error("key is {len} bytes long, the limit is {MAX_KEY_LEN}")]
    TooLong {
        /// Length of the rejected key in bytes
        len: usize,
    },

    /// The key contains a character outside the allowed set.
    #[error("key contains invalid character {found:?}")]
    InvalidChars {
        /// First offending character
        found: char,
    },
}

/// Returns true if `c` may appear in a cache key.
pub fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || KEY_PUNCTUATION.contains(c)
}

/// Validates `key`, returning it unchanged as a [`ValidKey`].
///
/// # Example
///
/// ```
/// use fragcache_core::{KeyError, validate_key};
///
/// assert_eq!(validate_key("post 42|en").unwrap().as_str(), "post 42|en");
/// assert!(matches!(validate_key("a/b"), Err(KeyError::InvalidChars { found: '/' })));
/// ```
pub fn validate_key(key: &str) -> Result<ValidKey, KeyError> {
    if key.len() > MAX_KEY_LEN {
        return Err(KeyError::TooLong { len: key.len() });
    }

    if let Some(found) = key.chars().find(|c| !is_key_char(*c)) {
        return Err(KeyError::InvalidChars { found });
    }

    Ok(ValidKey(key.to_string()))
}

/// A key that passed [`validate_key`].
///
/// Storage backends only accept this type, so every path into storage
/// has been through validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidKey(String);

impl ValidKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ValidKey {
    type Error = KeyError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        validate_key(key)
    }
}

impl AsRef<str> for ValidKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
