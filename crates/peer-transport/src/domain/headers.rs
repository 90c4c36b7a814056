//! # Protocol Headers
//!
//! Every request and response between peers carries `magic`, `version`,
//! `os` and `port` headers. Inbound requests are checked against the local
//! identity before any endpoint runs; outbound responses are checked before
//! the remote is (re)registered.

use serde::Serialize;

use super::errors::TransportError;

pub const HEADER_MAGIC: &str = "magic";
pub const HEADER_VERSION: &str = "version";
pub const HEADER_OS: &str = "os";
pub const HEADER_PORT: &str = "port";

pub const MAX_MAGIC_LEN: usize = 8;
pub const MAX_VERSION_LEN: usize = 11;
pub const MAX_OS_LEN: usize = 64;

/// This node's identity, fixed once the transport is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolHeaders {
    pub os: String,
    pub version: String,
    pub port: u16,
    pub magic: String,
}

impl ProtocolHeaders {
    /// Header name/value pairs in wire form.
    pub fn pairs(&self) -> [(&'static str, String); 4] {
        [
            (HEADER_OS, self.os.clone()),
            (HEADER_VERSION, self.version.clone()),
            (HEADER_PORT, self.port.to_string()),
            (HEADER_MAGIC, self.magic.clone()),
        ]
    }
}

/// Raw protocol header values as found on a request or response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    pub magic: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub port: Option<String>,
}

impl HeaderSet {
    /// Collect the protocol headers from any `(name, value)` iterator.
    /// Names are matched case-insensitively.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::default();
        for (name, value) in pairs {
            let slot = if name.eq_ignore_ascii_case(HEADER_MAGIC) {
                &mut set.magic
            } else if name.eq_ignore_ascii_case(HEADER_VERSION) {
                &mut set.version
            } else if name.eq_ignore_ascii_case(HEADER_OS) {
                &mut set.os
            } else if name.eq_ignore_ascii_case(HEADER_PORT) {
                &mut set.port
            } else {
                continue;
            };
            *slot = Some(value.to_string());
        }
        set
    }

    /// The `port` header as an integer in `1..=65535`, if it is one.
    pub fn valid_port(&self) -> Option<u16> {
        let port: i64 = self.port.as_deref()?.trim().parse().ok()?;
        u16::try_from(port).ok().filter(|p| *p > 0)
    }
}

/// Result of checking an inbound request's headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundIdentity {
    /// No `version` header: served, but never registered as a peer.
    Anonymous,
    /// A participating peer. `port` is only set when it is in range.
    Peer {
        version: String,
        os: Option<String>,
        port: Option<u16>,
    },
}

/// Validate inbound headers against the local identity.
///
/// The network magic is checked first; a request for another network is
/// rejected whatever else it carries.
pub fn check_inbound(
    headers: &HeaderSet,
    local: &ProtocolHeaders,
) -> Result<InboundIdentity, TransportError> {
    let received = headers.magic.as_deref().unwrap_or_default();
    if received != local.magic {
        return Err(TransportError::NetworkMismatch {
            expected: local.magic.clone(),
            received: received.to_string(),
        });
    }

    if let Some(os) = &headers.os {
        if os.chars().count() > MAX_OS_LEN {
            return Err(TransportError::InvalidHeaders(format!(
                "os must be at most {MAX_OS_LEN} characters"
            )));
        }
    }

    let Some(version) = headers.version.as_ref().filter(|v| !v.is_empty()) else {
        return Ok(InboundIdentity::Anonymous);
    };
    if version.chars().count() > MAX_VERSION_LEN {
        return Err(TransportError::InvalidHeaders(format!(
            "version must be at most {MAX_VERSION_LEN} characters"
        )));
    }

    Ok(InboundIdentity::Peer {
        version: version.clone(),
        os: headers.os.clone(),
        port: headers.valid_port(),
    })
}

/// Identity a remote advertised on a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub port: u16,
    pub version: String,
    pub os: Option<String>,
}

/// Validate response headers: `port`, `magic` and `version` are required and
/// bounded like inbound headers. `None` means the response carries no usable
/// identity and the caller must skip reputation updates.
pub fn check_response(headers: &HeaderSet) -> Option<RemoteIdentity> {
    let port = headers.valid_port()?;
    let magic = headers.magic.as_ref()?;
    let version = headers.version.as_ref()?;
    if magic.chars().count() > MAX_MAGIC_LEN || version.chars().count() > MAX_VERSION_LEN {
        return None;
    }
    if headers
        .os
        .as_ref()
        .is_some_and(|os| os.chars().count() > MAX_OS_LEN)
    {
        return None;
    }
    Some(RemoteIdentity {
        port,
        version: version.clone(),
        os: headers.os.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> ProtocolHeaders {
        ProtocolHeaders {
            os: "linux".into(),
            version: "1.2.0".into(),
            port: 4096,
            magic: "594fe0f3".into(),
        }
    }

    fn headers(magic: &str, version: Option<&str>, port: Option<&str>) -> HeaderSet {
        HeaderSet {
            magic: Some(magic.into()),
            version: version.map(Into::into),
            os: Some("linux".into()),
            port: port.map(Into::into),
        }
    }

    #[test]
    fn test_from_pairs_case_insensitive() {
        let set = HeaderSet::from_pairs([
            ("Magic", "m"),
            ("VERSION", "1.0"),
            ("content-type", "application/json"),
            ("port", "80"),
        ]);
        assert_eq!(set.magic.as_deref(), Some("m"));
        assert_eq!(set.version.as_deref(), Some("1.0"));
        assert_eq!(set.valid_port(), Some(80));
        assert!(set.os.is_none());
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let err = check_inbound(&headers("deadbeef", Some("1.2.0"), Some("4096")), &local())
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::NetworkMismatch {
                expected: "594fe0f3".into(),
                received: "deadbeef".into(),
            }
        );
    }

    #[test]
    fn test_missing_magic_rejected() {
        let set = HeaderSet {
            version: Some("1.2.0".into()),
            ..Default::default()
        };
        assert!(matches!(
            check_inbound(&set, &local()),
            Err(TransportError::NetworkMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_version_is_anonymous() {
        let identity = check_inbound(&headers("594fe0f3", None, Some("4096")), &local()).unwrap();
        assert_eq!(identity, InboundIdentity::Anonymous);
    }

    #[test]
    fn test_port_only_kept_in_range() {
        for (raw, expected) in [
            ("4096", Some(4096)),
            ("0", None),
            ("65536", None),
            ("-1", None),
            ("abc", None),
        ] {
            let identity =
                check_inbound(&headers("594fe0f3", Some("1.2.0"), Some(raw)), &local()).unwrap();
            let InboundIdentity::Peer { port, .. } = identity else {
                panic!("expected peer identity");
            };
            assert_eq!(port, expected, "port header {raw}");
        }
    }

    #[test]
    fn test_version_too_long() {
        let result = check_inbound(
            &headers("594fe0f3", Some("1.2.3.4.5.6.7"), Some("1")),
            &local(),
        );
        assert!(matches!(result, Err(TransportError::InvalidHeaders(_))));
    }

    #[test]
    fn test_check_response_requires_identity() {
        assert!(check_response(&headers("594fe0f3", Some("1.2.0"), Some("4096"))).is_some());
        assert!(check_response(&headers("594fe0f3", None, Some("4096"))).is_none());
        assert!(check_response(&headers("594fe0f3", Some("1.2.0"), None)).is_none());
        assert!(check_response(&headers("594fe0f3", Some("1.2.0"), Some("70000"))).is_none());
        assert!(check_response(&headers("toolongmagic", Some("1.2.0"), Some("1"))).is_none());
    }

    #[test]
    fn test_pairs_render_port() {
        let pairs = local().pairs();
        assert!(pairs.contains(&(HEADER_PORT, "4096".to_string())));
        assert!(pairs.contains(&(HEADER_MAGIC, "594fe0f3".to_string())));
    }
}
