//! Request line parsing and upstream target resolution.
//!
//! Only the first line of the request is ever interpreted; everything after
//! it is treated as opaque bytes.

use std::fmt;
use percent_encoding::{percent_encode, CONTROLS};
use thiserror::Error;
use url::{Host, Url};

/// Port used when neither the target nor its scheme names one.
pub const DEFAULT_PORT: u16 = 80;

/// The three tokens of an HTTP request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    /// Target as text; bytes outside ASCII are percent-encoded.
    pub target: String,
    pub version: String,
    /// Byte offset of `method` within the raw request.
    pub offset: usize,
    raw_method: Vec<u8>,
    raw_target: Vec<u8>,
}

impl RequestLine {
    /// Parse the first line of a raw request.
    ///
    /// The line runs up to the first `\n` (or the whole buffer when there is
    /// none) and is trimmed. It is split on single spaces; `None` is returned
    /// when fewer than three tokens result. Tokens are cut from the raw
    /// bytes, so they match the request exactly whatever its encoding.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let end = memchr::memchr(b'\n', raw).unwrap_or(raw.len());
        let line = &raw[..end];
        let offset = line.len() - line.trim_ascii_start().len();

        let mut parts = line.trim_ascii().split(|&b| b == b' ');
        let method = parts.next()?;
        let target = parts.next()?;
        let version = parts.next()?;

        Some(Self {
            method: String::from_utf8_lossy(method).into_owned(),
            target: percent_encode(target, CONTROLS).to_string(),
            version: String::from_utf8_lossy(version).into_owned(),
            offset,
            raw_method: method.to_vec(),
            raw_target: target.to_vec(),
        })
    }

    /// The `"<method> <target>"` prefix exactly as the client sent it.
    pub fn method_and_target(&self) -> Vec<u8> {
        [&self.raw_method[..], b" ", &self.raw_target[..]].concat()
    }

    /// The method as sent followed by `target`.
    pub fn method_with(&self, target: &str) -> Vec<u8> {
        [&self.raw_method[..], b" ", target.as_bytes()].concat()
    }

    /// Resolve the request target to the upstream it names.
    pub fn upstream(&self) -> Result<UpstreamTarget, TargetError> {
        UpstreamTarget::resolve(&self.target)
    }
}

/// Why a request target could not be resolved.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid request target '{target}': {source}")]
    Invalid {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request target '{0}' does not name a host")]
    MissingHost(String),
}

/// Where a request is relayed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub host: String,
    pub port: u16,
    /// Origin-form target: path plus `?query` when present.
    pub path: String,
}

impl UpstreamTarget {
    /// Resolve an absolute-URI target, retrying with an `http://` prefix
    /// when a scheme-less target does not parse to a URI with a host.
    pub fn resolve(target: &str) -> Result<Self, TargetError> {
        // Origin-form has no authority; prefixing it would turn the first
        // path segment into a host.
        if target.starts_with('/') {
            return Err(TargetError::MissingHost(target.to_string()));
        }

        // Only scheme-less targets get the `http://` retry; prefixing a
        // target that already has one would make its scheme the host.
        let has_scheme = target.contains("://");
        match Url::parse(target) {
            Ok(url) => {
                if let Some(upstream) = Self::from_url(&url) {
                    return Ok(upstream);
                }
                if has_scheme {
                    return Err(TargetError::MissingHost(target.to_string()));
                }
            }
            Err(source) if has_scheme => {
                return Err(TargetError::Invalid {
                    target: target.to_string(),
                    source,
                });
            }
            Err(_) => {}
        }

        let url = Url::parse(&format!("http://{target}")).map_err(|source| TargetError::Invalid {
            target: target.to_string(),
            source,
        })?;

        Self::from_url(&url).ok_or_else(|| TargetError::MissingHost(target.to_string()))
    }

    fn from_url(url: &Url) -> Option<Self> {
        let host = match url.host()? {
            Host::Domain(domain) if domain.is_empty() => return None,
            Host::Domain(domain) => domain.to_string(),
            Host::Ipv4(addr) => addr.to_string(),
            Host::Ipv6(addr) => addr.to_string(),
        };

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Some(Self {
            host,
            port: url.port_or_known_default().unwrap_or(DEFAULT_PORT),
            path,
        })
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
