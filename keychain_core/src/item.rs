//! Keychain item model
//!
//! An [`Item`] is the identity and metadata of one credential. It never holds
//! the password; secrets are addressed separately by identifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata map attached to an item
pub type Options = BTreeMap<String, OptionValue>;

/// A single metadata value
///
/// The set of variants is closed so every backend can serialize options
/// without guessing at dynamic types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<u8>> for OptionValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// One credential's identity and metadata
///
/// Items are values: once handed to a [`crate::Keychain`] they are never
/// mutated in place. Updating a stored item means replacing it with a new
/// value that has the same identifier.
///
/// `PartialEq` compares every attribute. Store operations match items by
/// identifier only, see [`Item::same_identity`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    identifier: String,
    invisible: bool,
    #[serde(default)]
    options: Options,
}

impl Item {
    /// Create a new item
    pub fn new(identifier: impl Into<String>, invisible: bool, options: Options) -> Self {
        Self {
            identifier: identifier.into(),
            invisible,
            options,
        }
    }

    /// Create a visible item without options
    pub fn visible(identifier: impl Into<String>) -> Self {
        Self::new(identifier, false, Options::new())
    }

    /// Add an option while building the value
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn invisible(&self) -> bool {
        self.invisible
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// Whether both values address the same stored item
    pub fn same_identity(&self, other: &Item) -> bool {
        self.identifier == other.identifier
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Option values may hold account details; keys are enough for logs.
        f.debug_struct("Item")
            .field("identifier", &self.identifier)
            .field("invisible", &self.invisible)
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .finish()
    }
}
