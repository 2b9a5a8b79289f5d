//! Hook visibility scope.
//!
//! A scope decides how far a hook travels when its declaring instance is
//! merged into a parent. Visibility only ever widens upward through merges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Visibility level of a registered hook, ordered least to most visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Visible only to routes declared on the registering instance.
    Local,
    /// Visible to the registering instance and the one parent it is merged into.
    Scoped,
    /// Visible to the registering instance and every ancestor.
    #[default]
    Global,
}

impl Scope {
    /// Maps the boolean `scoped` flag: `true` keeps a hook local,
    /// `false` lets it propagate to every ancestor.
    pub fn from_scoped_flag(scoped: bool) -> Self {
        if scoped { Self::Local } else { Self::Global }
    }

    /// Returns the scope a hook carries after crossing one merge boundary,
    /// or `None` when it does not cross at all.
    pub fn after_merge(self) -> Option<Self> {
        match self {
            Self::Local => None,
            Self::Scoped => Some(Self::Local),
            Self::Global => Some(Self::Global),
        }
    }

    /// Returns the string name of this scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Scoped => "scoped",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "scoped" => Ok(Self::Scoped),
            "global" => Ok(Self::Global),
            other => Err(AppError::validation(format!(
                "Unknown hook scope '{other}' (expected local, scoped or global)"
            ))),
        }
    }
}

impl From<bool> for Scope {
    fn from(scoped: bool) -> Self {
        Self::from_scoped_flag(scoped)
    }
}
