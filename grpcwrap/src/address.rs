//! Address resolution.
//!
//! Turns the raw `address` configuration value into an ordered list of host
//! endpoints. Resolution is purely syntactic: no DNS lookup happens here.

use http::Uri;

use crate::ConnectError;

/// Ordered, non-empty list of host endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAddress {
    hosts: Vec<String>,
}

/// Resolve a comma-separated address list.
///
/// All whitespace is stripped, the result is split on `,` and empty segments
/// are discarded. Fails when nothing remains.
///
/// ```
/// let resolved = grpcwrap::resolve(" 10.0.0.1:9000 , 10.0.0.2:9000 ").unwrap();
/// assert_eq!(resolved.first(), "10.0.0.1:9000");
/// assert_eq!(resolved.len(), 2);
/// ```
pub fn resolve(raw: &str) -> Result<ResolvedAddress, ConnectError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let hosts: Vec<String> = compact
        .split(',')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();

    if hosts.is_empty() {
        return Err(ConnectError::InvalidAddress {
            address: raw.to_owned(),
        });
    }

    Ok(ResolvedAddress { hosts })
}

impl ResolvedAddress {
    /// The endpoint that gets dialed.
    pub fn first(&self) -> &str {
        // non-empty by construction
        &self.hosts[0]
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Build the cleartext base URI for a `host:port` endpoint.
    ///
    /// An explicit `http://` prefix is accepted. Any other scheme, a missing
    /// authority or a path component is a [`ConnectError::Dial`].
    pub fn endpoint_uri(host: &str) -> Result<Uri, ConnectError> {
        let candidate = if host.contains("://") {
            host.to_owned()
        } else {
            format!("http://{host}")
        };

        let uri: Uri = candidate
            .parse()
            .map_err(|e: http::uri::InvalidUri| ConnectError::dial(host, e))?;

        if uri.scheme_str() != Some("http") {
            return Err(ConnectError::dial(
                host,
                "only cleartext http/2 endpoints are supported",
            ));
        }
        if uri.authority().is_none() {
            return Err(ConnectError::dial(host, "missing host"));
        }
        if !matches!(uri.path(), "" | "/") {
            return Err(ConnectError::dial(host, "endpoint must not carry a path"));
        }

        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_splits_and_trims() {
        let resolved = resolve(" a:1 ,\tb:2,, c:3 ").unwrap();
        assert_eq!(resolved.hosts(), ["a:1", "b:2", "c:3"]);
        assert_eq!(resolved.first(), "a:1");
    }

    #[test]
    fn test_resolve_single() {
        let resolved = resolve("127.0.0.1:9102").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.iter().collect::<Vec<_>>(), vec!["127.0.0.1:9102"]);
    }

    #[test]
    fn test_resolve_rejects_empty() {
        for raw in ["", "   ", ",", " , ,\n"] {
            assert_eq!(
                resolve(raw),
                Err(ConnectError::InvalidAddress {
                    address: raw.to_owned()
                })
            );
        }
    }

    #[test]
    fn test_resolve_whitespace_inside_host() {
        let resolved = resolve("local host:80").unwrap();
        assert_eq!(resolved.first(), "localhost:80");
    }

    #[test]
    fn test_endpoint_uri() {
        let uri = ResolvedAddress::endpoint_uri("10.0.0.1:9000").unwrap();
        assert_eq!(uri.scheme_str(), Some("http"));
        assert_eq!(uri.authority().unwrap().as_str(), "10.0.0.1:9000");

        let uri = ResolvedAddress::endpoint_uri("http://svc:80").unwrap();
        assert_eq!(uri.host(), Some("svc"));
    }

    #[test]
    fn test_endpoint_uri_rejects() {
        assert!(matches!(
            ResolvedAddress::endpoint_uri("https://svc:443"),
            Err(ConnectError::Dial { .. })
        ));
        assert!(matches!(
            ResolvedAddress::endpoint_uri("svc:80/api"),
            Err(ConnectError::Dial { .. })
        ));
        assert!(matches!(
            ResolvedAddress::endpoint_uri("bad host^:80"),
            Err(ConnectError::Dial { .. })
        ));
    }
}
