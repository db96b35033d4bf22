//! URL normalization and reference resolution
//!
//! [`NewsUrl`] wraps an absolute URL whose query and fragment have been
//! unconditionally stripped at construction. Only the scheme, authority
//! (userinfo, host, port) and path are kept; the "essential form"
//! (authority + path, single trailing `/` removed) is the stable
//! identity used wherever a document must be hashed, de-duplicated or
//! compared.
//!
//! Reference resolution follows RFC 3986 §5.2: an absolute reference is
//! taken as-is, a reference starting with `/` replaces the base path,
//! and any other reference replaces the last path segment of the base,
//! with `.` and `..` segments collapsed afterwards.

use std::fmt;
use thiserror::Error;
use url::Url;

/// URL parsing and resolution errors
#[derive(Error, Debug)]
pub enum UrlError {
    /// Malformed string at construction, or missing scheme/host
    #[error("Invalid URL: {0}")]
    Invalid(String),

    /// A reference could not be resolved against its base
    #[error("Cannot resolve reference: {0}")]
    Unresolvable(String),
}

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// An absolute URL with query and fragment stripped
///
/// Hosts are ASCII-lowercased during parsing, so the essential form is
/// host-case-insensitive. Values are cheaply cloneable and immutable
/// after construction.
#[derive(Debug, Clone)]
pub struct NewsUrl {
    inner: Url,
}

impl NewsUrl {
    /// Parse an absolute URL string
    ///
    /// The query and fragment are dropped after parsing and never
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns [`UrlError::Invalid`] when the string lacks a scheme or
    /// the scheme/host cannot be parsed.
    pub fn parse(s: &str) -> UrlResult<Self> {
        let mut inner = Url::parse(s).map_err(|e| UrlError::Invalid(format!("{s}: {e}")))?;

        if inner.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::Invalid(format!("{s}: missing host")));
        }

        inner.set_query(None);
        inner.set_fragment(None);

        Ok(Self { inner })
    }

    /// Build a URL from a host and a path, with the `https` scheme
    ///
    /// Some references are relative within a host; this constructor
    /// covers callers that hold the two parts separately.
    ///
    /// # Errors
    ///
    /// Returns [`UrlError::Invalid`] if the combined URL does not parse.
    pub fn from_host_path(host: &str, path: &str) -> UrlResult<Self> {
        Self::from_parts("https", host, path)
    }

    /// Build a URL from an explicit scheme, host and path
    ///
    /// # Errors
    ///
    /// Returns [`UrlError::Invalid`] if the combined URL does not parse.
    pub fn from_parts(scheme: &str, host: &str, path: &str) -> UrlResult<Self> {
        let sep = if path.starts_with('/') { "" } else { "/" };
        Self::parse(&format!("{scheme}://{host}{sep}{path}"))
    }

    /// The essential part of the URL: `authority + path` with a single
    /// trailing `/` removed
    ///
    /// This is the stable identity used everywhere a URL must be
    /// hashed, de-duplicated, or compared.
    pub fn essential(&self) -> String {
        let mut out = self.authority();
        out.push_str(self.inner.path());
        if out.ends_with('/') {
            out.pop();
        }
        out
    }

    /// The authority component: `[user[:password]@]host[:port]`
    pub fn authority(&self) -> String {
        let mut out = String::with_capacity(32);

        let user = self.inner.username();
        if !user.is_empty() {
            out.push_str(user);
            if let Some(pass) = self.inner.password() {
                out.push(':');
                out.push_str(pass);
            }
            out.push('@');
        }
        if let Some(host) = self.inner.host_str() {
            out.push_str(host);
        }
        if let Some(port) = self.inner.port() {
            out.push(':');
            out.push_str(&port.to_string());
        }

        out
    }

    /// The URL scheme, e.g. `https`
    pub fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    /// The host, lowercased
    pub fn host(&self) -> &str {
        // a NewsUrl cannot be constructed without a host
        self.inner.host_str().unwrap_or_default()
    }

    /// The path component, always starting with `/` for http(s) URLs
    pub fn path(&self) -> &str {
        self.inner.path()
    }

    /// Resolve a reference found in this document against this URL
    ///
    /// If `reference` parses as an absolute URL it is returned as-is
    /// (query and fragment stripped). Otherwise RFC 3986 §5.2
    /// resolution applies: scheme and, unless the reference carries
    /// one, authority come from the base; a reference path starting
    /// with `/` is used verbatim; any other reference replaces the last
    /// path segment of the base. Dot-segments are collapsed in the
    /// result. Whitespace inside the reference is stripped before
    /// parsing.
    ///
    /// # Errors
    ///
    /// Returns [`UrlError::Unresolvable`] when the reference cannot be
    /// turned into an absolute URL.
    pub fn resolve(&self, reference: &str) -> UrlResult<Self> {
        let reference: String = reference.chars().filter(|c| !c.is_whitespace()).collect();
        if reference.is_empty() {
            return Err(UrlError::Unresolvable("empty reference".to_string()));
        }

        // An absolute reference stands on its own.
        if let Ok(absolute) = Self::parse(&reference) {
            return Ok(absolute);
        }

        let mut joined = self
            .inner
            .join(&reference)
            .map_err(|e| UrlError::Unresolvable(format!("{reference}: {e}")))?;

        joined.set_query(None);
        joined.set_fragment(None);

        if joined.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::Unresolvable(format!("{reference}: no host")));
        }

        Ok(Self { inner: joined })
    }

    /// The full URL as a string slice
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }
}

impl fmt::Display for NewsUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

// Equality of the essential form defines document identity.
impl PartialEq for NewsUrl {
    fn eq(&self, other: &Self) -> bool {
        self.essential() == other.essential()
    }
}

impl Eq for NewsUrl {}

impl std::hash::Hash for NewsUrl {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.essential().hash(state);
    }
}
