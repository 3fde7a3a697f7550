//! Query options accepted by read requests.
//!
//! Keys such as `filter[firstname]` belong to the family named before the
//! first `[`; only the family is checked against the whitelist.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Option families recognized by current webservice versions.
pub const CURRENT_OPTIONS: &[&str] = &["filter", "display", "sort", "limit", "schema", "date", "id_shop"];

/// Option families recognized by older webservice versions.
pub const LEGACY_OPTIONS: &[&str] = &["filter", "display", "sort", "limit", "schema"];

/// Set of accepted option families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionWhitelist {
    families: Vec<String>,
}

impl OptionWhitelist {
    pub fn new<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            families: families.into_iter().map(Into::into).collect(),
        }
    }

    pub fn current() -> Self {
        Self::new(CURRENT_OPTIONS.iter().copied())
    }

    pub fn legacy() -> Self {
        Self::new(LEGACY_OPTIONS.iter().copied())
    }

    pub fn contains(&self, family: &str) -> bool {
        self.families.iter().any(|f| f == family)
    }

    /// Fail with every unsupported family, in first-seen order.
    pub fn validate(&self, options: &QueryOptions) -> Result<()> {
        let mut unsupported: Vec<String> = Vec::new();
        for key in options.keys() {
            let family = family(key);
            if !self.contains(family) && !unsupported.iter().any(|u| u == family) {
                unsupported.push(family.to_string());
            }
        }
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(Error::UnsupportedOptions(unsupported))
        }
    }
}

impl Default for OptionWhitelist {
    fn default() -> Self {
        Self::current()
    }
}

/// The part of an option key before any `[...]` suffix.
pub fn family(key: &str) -> &str {
    key.split('[').next().unwrap_or(key)
}

/// Ordered option name → value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions(IndexMap<String, String>);

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `key=value` pairs joined by `&`, both sides percent-encoded. With
    /// `debug` set, `debug=true` is appended unless already present.
    pub fn to_query_string(&self, debug: bool) -> String {
        let mut pairs: Vec<String> = self
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect();
        if debug && !self.0.contains_key("debug") {
            pairs.push("debug=true".to_string());
        }
        pairs.join("&")
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}
