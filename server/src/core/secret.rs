//! Redacting wrapper for credentials
//!
//! Keeps API keys out of `Debug` output and logs. The raw value is only
//! reachable through [`Secret::expose`].

use std::fmt;

const REDACTED: &str = "***";

#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    value: String,
    source: Option<&'static str>,
}

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: None,
        }
    }

    /// Attach the name of the variable the value was read from
    pub fn with_source(mut self, source: &'static str) -> Self {
        self.source = Some(source);
        self
    }

    /// Read the first non-empty variable from `vars` using `lookup`
    pub fn from_vars<F>(vars: &[&'static str], lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        vars.iter().find_map(|var| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| Self::new(v).with_source(var))
        })
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> Option<&'static str> {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(source) => write!(f, "Secret({REDACTED}, from {source})"),
            None => write!(f, "Secret({REDACTED})"),
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_redacts_debug_and_display() {
        let secret = Secret::new("sk-live-123");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "sk-live-123");
    }

    #[test]
    fn test_secret_from_vars_takes_first_non_empty() {
        let lookup = |var: &str| match var {
            "A" => Some("  ".to_string()),
            "B" => Some("key-b".to_string()),
            "C" => Some("key-c".to_string()),
            _ => None,
        };
        let secret = Secret::from_vars(&["A", "B", "C"], lookup).unwrap();
        assert_eq!(secret.expose(), "key-b");
        assert_eq!(secret.source(), Some("B"));
        assert_eq!(format!("{secret:?}"), "Secret(***, from B)");
    }

    #[test]
    fn test_secret_from_vars_none_when_unset() {
        assert!(Secret::from_vars(&["A"], |_| None).is_none());
    }
}
