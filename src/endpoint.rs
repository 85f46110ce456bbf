//! Connection endpoint: URL components and their validation.

use crate::error::{Error, Result};

/// Default port for the `ws` scheme.
pub const DEFAULT_WS_PORT: u16 = 80;

/// A validated connection endpoint.
///
/// Produced either by [`Endpoint::parse`] from a URL string or by
/// [`Endpoint::from_parts`] from individually configured components.
/// Construction is total: every `Endpoint` satisfies the connection
/// preconditions (scheme is `ws`, host non-empty, port non-zero, path
/// begins with `/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Validate individually configured URL components.
    ///
    /// # Errors
    ///
    /// - [`Error::MissedParameter`] naming the first missing or malformed
    ///   component.
    /// - [`Error::TlsNotSupported`] for the `wss` scheme.
    pub fn from_parts(
        scheme: Option<&str>,
        host: Option<&str>,
        port: Option<u16>,
        path: Option<&str>,
    ) -> Result<Self> {
        let scheme = match scheme {
            Some("ws") => "ws",
            Some("wss") => return Err(Error::TlsNotSupported),
            Some(_) | None => return Err(Error::MissedParameter("scheme")),
        };
        let host = match host {
            Some(h) if !h.is_empty() => h,
            _ => return Err(Error::MissedParameter("host")),
        };
        let port = match port {
            Some(p) if p > 0 => p,
            _ => return Err(Error::MissedParameter("port")),
        };
        let path = match path {
            Some(p) if p.starts_with('/') => p,
            _ => return Err(Error::MissedParameter("path")),
        };
        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Parse a `ws://host[:port]/path` URL into an endpoint.
    ///
    /// The port defaults to 80 and the path to `/` when omitted.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Endpoint::from_parts`].
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or(Error::MissedParameter("scheme"))?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_str)) => {
                let port: u16 = port_str
                    .parse()
                    .map_err(|_| Error::MissedParameter("port"))?;
                (host, Some(port))
            }
            None => (authority, Some(DEFAULT_WS_PORT)),
        };

        Self::from_parts(Some(scheme), Some(host), port, Some(path))
    }

    /// URL scheme, always `ws`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Remote host name or address literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Request path, beginning with `/`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value for the `Host` header: the port is omitted when it equals
    /// the scheme default.
    #[must_use]
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_WS_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Value for the `Origin` header.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host_header())
    }

    /// `host:port` pair for the OS resolver.
    #[must_use]
    pub fn authority(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host_header(), self.path)
    }
}
