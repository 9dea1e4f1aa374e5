//! Group — a named set of devices selected by glob patterns.
//!
//! Patterns follow the usual shell conventions over `/`-separated paths:
//!
//! | Syntax | Matches |
//! |--------|---------|
//! | `*` | any run of characters within one segment |
//! | `**` | any number of whole segments (only as a full segment) |
//! | `?` | a single character within one segment |
//! | `[abc]`, `[!abc]` | one character from (or not from) the set |
//! | `{a,b}` | either alternative |
//!
//! Patterns written against the `integrations/...` alias are rewritten to
//! the canonical `devices/...` form before compiling.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::path::canonicalize;

/// Static group configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Display name, defaults to the configuration key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Glob patterns over device paths.
    pub devices: Vec<String>,
}

/// A compiled device glob pattern.
#[derive(Debug, Clone)]
pub struct DevicePattern {
    matcher: GlobMatcher,
}

impl DevicePattern {
    /// Compile a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPattern`] for unbalanced brackets or
    /// braces, or a misplaced `**`.
    pub fn new(pattern: &str) -> Result<Self, ValidationError> {
        let glob = GlobBuilder::new(&canonicalize(pattern))
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|err| ValidationError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.kind().to_string(),
            })?;

        Ok(Self {
            matcher: glob.compile_matcher(),
        })
    }

    /// Whether `path` (canonical form) matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}
