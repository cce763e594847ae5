//! Error types for fragcache.
//!
//! This module defines the error hierarchy used throughout the cache
//! engine. All errors implement the standard `std::error::Error` trait
//! via `thiserror`.
//!
//! # Error Handling Philosophy
//!
//! Only *usage* mistakes are errors. A cache miss of any kind (absent,
//! expired, invalidated, corrupt) is an expected outcome and never shows
//! up here; storage write failures are logged and swallowed by the engine.
//!
//! # Example
//!
//! ```
//! use fragcache_core::{CacheError, Result};
//!
//! fn lookup(profile: &str) -> Result<()> {
//!     if profile.is_empty() {
//!         return Err(CacheError::profile_not_found(profile));
//!     }
//!     Ok(())
//! }
//!
//! assert!(lookup("").unwrap_err().is_usage_error());
//! ```

use std::io;
use thiserror::Error;

use crate::key::KeyError;

/// Main error type for cache operations.
///
/// Every variant except [`CacheError::Io`] is a programming or
/// configuration mistake made by the integrator: it is surfaced
/// immediately and never retried.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The identifier is not usable as a cache key.
    #[error("invalid cache key: {0}")]
    InvalidKey(#[from] KeyError),

    /// A dealer was requested for a profile that was never registered.
    #[error("cache profile '{name}' not found")]
    ProfileNotFound {
        /// The requested profile name
        name: String,
    },

    /// A profile name cannot be used as a storage namespace.
    #[error("invalid profile name '{name}': {reason}")]
    InvalidProfile {
        /// The rejected name
        name: String,
        /// Why it's invalid
        reason: String,
    },

    /// Writing cached output to the caller's sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CacheError {
    /// Creates a ProfileNotFound error.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcache_core::CacheError;
    ///
    /// let error = CacheError::profile_not_found("Footer");
    /// assert!(error.is_profile_not_found());
    /// assert!(error.to_string().contains("Footer"));
    /// ```
    pub fn profile_not_found(name: impl Into<String>) -> Self {
        Self::ProfileNotFound { name: name.into() }
    }

    /// Creates an InvalidProfile error.
    pub fn invalid_profile(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProfile {
            name: name.into(),
            reason: reason.into(),
        }
    }

    // ============================================
    // Query methods
    // ============================================

    /// Returns true if the identifier failed key validation.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey(_))
    }

    /// Returns true if the requested profile does not exist.
    pub fn is_profile_not_found(&self) -> bool {
        matches!(self, Self::ProfileNotFound { .. })
    }

    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if this error is an integrator mistake rather than
    /// an environmental failure.
    pub fn is_usage_error(&self) -> bool {
        !self.is_io_error()
    }
}

/// Type alias for Results with CacheError.
pub type Result<T> = std::result::Result<T, CacheError>;
