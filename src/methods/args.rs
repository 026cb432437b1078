//! Method argument parsing
//!
//! Method arguments arrive as one string of comma-separated `key=value`
//! pairs (`api_url=http://host:8080/v1,model=tgi`). Values stay strings; each
//! method owns any further coercion through the typed accessors below.

use anyhow::Context;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A `key=value` pair that does not contain exactly one `=`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid method argument '{pair}': expected exactly one '=' in key=value")]
pub struct ArgumentParseError {
    pub pair: String,
}

/// Flat string-to-string argument map handed to method factories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodArgs {
    values: BTreeMap<String, String>,
}

/// Parse `"k=v,k=v"` into [`MethodArgs`]
///
/// An empty string yields no arguments. Later duplicates overwrite earlier
/// ones.
///
/// # Examples
///
/// ```
/// use rankbench::methods::parse_method_args;
///
/// let args = parse_method_args("a=1,b=2").unwrap();
/// assert_eq!(args.get("a"), Some("1"));
/// assert_eq!(args.get("b"), Some("2"));
///
/// assert!(parse_method_args("").unwrap().is_empty());
/// assert!(parse_method_args("a=1,b").is_err());
/// ```
pub fn parse_method_args(raw: &str) -> Result<MethodArgs, ArgumentParseError> {
    let mut args = MethodArgs::new();
    if raw.is_empty() {
        return Ok(args);
    }

    for pair in raw.split(',') {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => args.insert(key, value),
            _ => {
                return Err(ArgumentParseError {
                    pair: pair.to_string(),
                })
            }
        }
    }

    Ok(args)
}

impl MethodArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or an error naming the missing argument
    pub fn require(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key)
            .ok_or_else(|| anyhow::anyhow!("missing required method argument '{}'", key))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse `key` as `T`, falling back to `default` when absent
    pub fn parse_or<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid value '{}' for method argument '{}'", raw, key)),
            None => Ok(default),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for MethodArgs {
    type Err = ArgumentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_method_args(s)
    }
}

impl<K, V> FromIterator<(K, V)> for MethodArgs
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (key, value) in iter {
            args.insert(key, value);
        }
        args
    }
}

impl fmt::Display for MethodArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let args = parse_method_args("a=1,b=2").unwrap();
        let expected: MethodArgs = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_parse_empty() {
        let args = parse_method_args("").unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_missing_equals() {
        let err = parse_method_args("a=1,b").unwrap_err();
        assert_eq!(err.pair, "b");
    }

    #[test]
    fn test_parse_two_equals() {
        let err = parse_method_args("url=http://h/?x=1").unwrap_err();
        assert_eq!(err.pair, "url=http://h/?x=1");
    }

    #[test]
    fn test_parse_empty_pair_rejected() {
        assert!(parse_method_args("a=1,,b=2").is_err());
        assert!(parse_method_args("a=1,").is_err());
    }

    #[test]
    fn test_parse_empty_value_allowed() {
        let args = parse_method_args("api_key=").unwrap();
        assert_eq!(args.get("api_key"), Some(""));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let args = parse_method_args("ms=5,ms=7").unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("ms"), Some("7"));
    }

    #[test]
    fn test_typed_accessors() {
        let args = parse_method_args("ms=25,model=tgi").unwrap();
        assert_eq!(args.parse_or::<u64>("ms", 10).unwrap(), 25);
        assert_eq!(args.parse_or::<u64>("missing", 10).unwrap(), 10);
        assert_eq!(args.get_or("api_key", "none"), "none");
        assert_eq!(args.require("model").unwrap(), "tgi");
        assert!(args.require("api_url").is_err());
        assert!(args.parse_or::<u64>("model", 0).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let args = parse_method_args("b=2,a=1").unwrap();
        assert_eq!(args.to_string(), "a=1,b=2");
        assert_eq!(args.to_string().parse::<MethodArgs>().unwrap(), args);
    }
}
