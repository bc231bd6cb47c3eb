//! Instrument universes.
//!
//! A universe is either a named set whose membership the engine resolves per
//! date (index constituents change over time) or a fixed list of codes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A named instrument universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    codes: Option<BTreeSet<String>>,
}

impl Universe {
    /// A universe whose point-in-time membership is stored in the engine.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codes: None,
        }
    }

    /// A universe with the same fixed members on every date.
    pub fn from_codes<I, S>(name: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            codes: Some(codes.into_iter().map(Into::into).collect()),
        }
    }

    /// Universe name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed members, if this is a static universe.
    pub const fn codes(&self) -> Option<&BTreeSet<String>> {
        self.codes.as_ref()
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.codes {
            Some(codes) => write!(f, "{} ({} codes)", self.name, codes.len()),
            None => write!(f, "{}", self.name),
        }
    }
}
