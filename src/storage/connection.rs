//! Connection descriptor parsing
//!
//! A descriptor has the shape `scheme://host/container?params`. The scheme picks
//! the provider; everything after it is interpreted by that provider. Parsing is
//! eager and strict: whitespace, user info and fragments are rejected instead of
//! being silently dropped.

use super::error::ConnectionError;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Typed view of a connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    url: Url,
}

impl ConnectionDescriptor {
    pub fn parse(input: &str) -> Result<Self, ConnectionError> {
        if input.is_empty() {
            return Err(ConnectionError::Missing);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(ConnectionError::Ambiguous("whitespace"));
        }
        if !input.contains("://") {
            return Err(ConnectionError::Malformed(redact(input)));
        }

        let url = Url::parse(input).map_err(|_| ConnectionError::Malformed(redact(input)))?;

        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConnectionError::Ambiguous("user info"));
        }
        if url.fragment().is_some() {
            return Err(ConnectionError::Ambiguous("a fragment"));
        }

        Ok(Self { url })
    }

    /// Provider name selected by this descriptor
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str().filter(|h| !h.is_empty())
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// Non-empty path segments, still percent-encoded
    pub fn path_segments(&self) -> Vec<&str> {
        self.url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Raw query string, exactly as given
    pub fn query(&self) -> Option<&str> {
        self.url.query().filter(|q| !q.is_empty())
    }

    /// Percent-decoded value of a query parameter
    ///
    /// A literal `+` is kept as-is: pasted tokens use it as data, not as a space.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query()?;
        let mut literal = self.url.clone();
        literal.set_query(Some(&query.replace('+', "%2B")));
        let value = literal
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned());
        value
    }

    /// Local path for `file://` descriptors
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.url.to_file_path().ok()
    }

    /// Full descriptor; contains credentials, never log it
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Descriptor with the query (SAS tokens, access tokens) masked
    pub fn redacted(&self) -> String {
        redact(self.url.as_str())
    }
}

fn redact(input: &str) -> String {
    match input.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => input.to_string(),
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("scheme", &self.scheme())
            .field("host", &self.host())
            .field("path_segments", &self.path_segments())
            .field("query", &self.query().map(|_| "<redacted>"))
            .finish()
    }
}
