//! Common type definitions and newtypes for fragcache.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CacheError, Result};
use crate::key::{MAX_KEY_LEN, is_key_char};

/// Profile identifier.
///
/// A profile name doubles as the storage namespace of its entries, so it
/// obeys the key character set and may not be empty, `.` or `..`.
///
/// # Example
///
/// ```
/// use fragcache_core::ProfileName;
///
/// let name = ProfileName::parse("Footer").unwrap();
/// assert_eq!(name.as_str(), "Footer");
/// assert!(ProfileName::parse("..").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileName(String);

impl ProfileName {
    /// Validates and wraps a profile name.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(CacheError::invalid_profile(name, "name cannot be empty"));
        }
        if name == "." || name == ".." {
            return Err(CacheError::invalid_profile(name, "reserved name"));
        }
        if name.len() > MAX_KEY_LEN {
            return Err(CacheError::invalid_profile(
                name,
                format!("longer than {MAX_KEY_LEN} bytes"),
            ));
        }
        if let Some(found) = name.chars().find(|c| !is_key_char(*c)) {
            return Err(CacheError::invalid_profile(
                name,
                format!("invalid character {found:?}"),
            ));
        }

        Ok(Self(name))
    }

    /// Returns the profile name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ProfileName {
    type Error = CacheError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<ProfileName> for String {
    fn from(name: ProfileName) -> Self {
        name.0
    }
}

impl AsRef<str> for ProfileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ProfileName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Name of a host event that may invalidate profiles.
///
/// Event names are opaque to the engine; they are only compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
    /// Creates a new EventName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the event name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for EventName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Splits a comma separated event list, trimming entries and dropping
/// empty ones.
///
/// # Example
///
/// ```
/// use fragcache_core::parse_event_list;
///
/// let events = parse_event_list(" save_post, ,wp_update_nav_menu ");
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[0].as_str(), "save_post");
/// ```
pub fn parse_event_list(list: &str) -> Vec<EventName> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(EventName::from)
        .collect()
}
