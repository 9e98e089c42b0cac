//! Handshake header collection.
//!
//! Header names compare case-insensitively; insertion order is preserved so
//! handshake requests are reproducible. Built fresh per open call, never
//! persisted on the connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Header name carrying the bearer auth token.
pub(crate) const AUTHORIZATION: &str = "Authorization";

// ============================================================================
// Headers
// ============================================================================

/// Ordered collection of handshake headers with case-insensitive names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header collection.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any existing value under a
    /// case-insensitively equal name.
    ///
    /// Replacement keeps the original entry's position and original name
    /// casing is overwritten by the new one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            *entry = (name, value);
        } else {
            self.entries.push((name, value));
        }
    }

    /// Returns the value for `name`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if a header with `name` exists (case-insensitive).
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of headers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the collection is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Merges a bearer auth token under the `Authorization` header.
    ///
    /// A caller-supplied `Authorization` header (any casing) wins over the
    /// token.
    pub(crate) fn merge_auth_token(&mut self, auth_token: Option<&str>) {
        if let Some(token) = auth_token {
            if !self.contains(AUTHORIZATION) {
                self.insert(AUTHORIZATION, token);
            }
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, _) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("X-Custom", "1");

        assert_eq!(headers.get("x-custom"), Some("1"));
        assert_eq!(headers.get("X-CUSTOM"), Some("1"));
        assert_eq!(headers.get("x-other"), None);
    }

    #[test]
    fn test_insert_replaces_case_insensitive_match() {
        let mut headers = Headers::new();
        headers.insert("authorization", "a");
        headers.insert("Authorization", "b");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("AUTHORIZATION"), Some("b"));
    }

    #[test]
    fn test_iteration_preserves_insertion_order() {
        let headers: Headers = [("One", "1"), ("Two", "2"), ("Three", "3")]
            .into_iter()
            .collect();

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["One", "Two", "Three"]);
    }

    #[test]
    fn test_auth_token_merge() {
        let mut headers = Headers::new();
        headers.merge_auth_token(Some("abc"));

        assert_eq!(headers.get("authorization"), Some("abc"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_caller_supplied_authorization_wins() {
        let mut headers = Headers::new();
        headers.insert("AUTHORIZATION", "caller");
        headers.merge_auth_token(Some("token"));

        assert_eq!(headers.get("Authorization"), Some("caller"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_merge_without_token_is_noop() {
        let mut headers = Headers::new();
        headers.merge_auth_token(None);
        assert!(headers.is_empty());
    }
}
