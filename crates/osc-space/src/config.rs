//! Address space configuration

use serde::{Deserialize, Serialize};

use crate::Result;

/// Handling of bracket ranges whose start is greater than their end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Keep the range; it never matches
    #[default]
    Lenient,
    /// Fail pattern parsing with [`crate::Error::InvalidRange`]
    Reject,
}

/// Order in which `{...}` alternatives are tried
///
/// Alternatives are single-shot: the first one that prefixes the remaining
/// candidate wins, so the order decides which one is committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlternativeOrder {
    /// Longest alternative first, ties in declared order
    #[default]
    Longest,
    /// Declared order
    Declared,
}

/// Options applied while tokenizing patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternOptions {
    pub range_policy: RangePolicy,
    pub alternative_order: AlternativeOrder,
}

/// Address space configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpaceConfig {
    /// Also reject space, `#`, `}` and `]` in registered names
    #[serde(default)]
    pub strict_names: bool,
    /// Re-registering a path replaces the existing method (default: true)
    #[serde(default = "default_replace_existing")]
    pub replace_existing: bool,
    /// Malformed range handling for lookups
    #[serde(default)]
    pub range_policy: RangePolicy,
    /// Brace alternative tie-break for lookups
    #[serde(default)]
    pub alternative_order: AlternativeOrder,
}

fn default_replace_existing() -> bool {
    true
}

impl Default for AddressSpaceConfig {
    fn default() -> Self {
        Self {
            strict_names: false,
            replace_existing: true,
            range_policy: RangePolicy::Lenient,
            alternative_order: AlternativeOrder::Longest,
        }
    }
}

impl AddressSpaceConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Options used when tokenizing lookup patterns
    pub fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            range_policy: self.range_policy,
            alternative_order: self.alternative_order,
        }
    }
}
