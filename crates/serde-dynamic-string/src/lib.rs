//! A `String` wrapper that expands environment-variable references at deserialization time.
//!
//! Two interpolation styles are supported inside a TOML string value:
//!
//! - `${VAR}` / `$VAR` — shell-style substitution.
//! - `{{ env.VAR }}` — the style used throughout the rest of the configuration surface.
//!
//! Both forms are resolved eagerly from [`std::env::var`]; a reference to an unset variable is
//! an error rather than being silently left in place or replaced with an empty string.

use std::{fmt, marker::PhantomData, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;

/// A value of type `T` parsed from a string after expanding environment variable references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicString<T>(T);

impl<T> DynamicString<T> {
    /// Unwraps into the inner, already-parsed value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("dynamic string pattern is valid")
    })
}

/// Expands every `${VAR}`/`{{ env.VAR }}` reference in `input`, failing on the first unset
/// variable encountered.
pub fn expand(input: &str) -> Result<String, String> {
    let pattern = env_pattern();
    let mut result = String::with_capacity(input.len());
    let mut last_end = 0;

    for captures in pattern.captures_iter(input) {
        let whole = captures.get(0).expect("capture 0 always matches");
        let name = captures
            .get(1)
            .or_else(|| captures.get(2))
            .or_else(|| captures.get(3))
            .expect("one alternative always captures the variable name")
            .as_str();

        let value = std::env::var(name).map_err(|_| format!("environment variable '{name}' is not set"))?;

        result.push_str(&input[last_end..whole.start()]);
        result.push_str(&value);
        last_end = whole.end();
    }

    result.push_str(&input[last_end..]);

    Ok(result)
}

impl<T> FromStr for DynamicString<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expanded = expand(s)?;
        let value = expanded.parse::<T>().map_err(|e| e.to_string())?;

        Ok(DynamicString(value))
    }
}

impl<'de, T> Deserialize<'de> for DynamicString<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor<T>(PhantomData<T>);

        impl<T> serde::de::Visitor<'_> for Visitor<T>
        where
            T: FromStr,
            T::Err: fmt::Display,
        {
            type Value = DynamicString<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, optionally containing ${VAR} or {{ env.VAR }} references")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                DynamicString::from_str(v).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(Visitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_curly_env_style() {
        unsafe { std::env::set_var("SDS_TEST_A", "hello") };
        assert_eq!(expand("${SDS_TEST_A} world").unwrap(), "hello world");
    }

    #[test]
    fn expands_mustache_env_style() {
        unsafe { std::env::set_var("SDS_TEST_B", "mustache") };
        assert_eq!(expand("{{ env.SDS_TEST_B }}").unwrap(), "mustache");
    }

    #[test]
    fn passes_through_plain_strings() {
        assert_eq!(expand("no variables here").unwrap(), "no variables here");
    }

    #[test]
    fn fails_on_unset_variable() {
        assert!(expand("${SDS_TEST_DEFINITELY_UNSET}").is_err());
    }
}
