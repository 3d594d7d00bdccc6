// Cdxserve is a web-archive CDX index server.
// Copyright (C) 2024 Cdxserve contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! URL canonicalisation and the SURT / SSURT key grammar (spec §4.1).
//!
//! SSURT never contains literal parentheses in this implementation: the
//! worked examples in the specification's test-vector section are the
//! authoritative ground truth, and none of them contain a `(` or `)`.
//! See `DESIGN.md` for the full reasoning.

pub mod pattern;

use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::{Host, Url};

use crate::error::{Error, Result};

/// The SPACE sentinel appended to an exact-match SSURT key so that it
/// sorts below (and therefore cannot be a prefix of) any longer SSURT
/// that shares the same stem. Spec §4.1.
pub const EXACT_SENTINEL: char = ' ';

const PATH_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

const QUERY_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'#');

const USERINFO_UNSAFE: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'@');

/// Decode-then-reencode a string so the same character is always
/// represented the same way, regardless of how it arrived. Spec §4.1
/// rule 2/5/6: "fully decode unreserved, then re-encode reserved-unsafe".
fn canonical_percent_encode(input: &str, unsafe_set: &'static AsciiSet) -> String {
    let decoded = percent_decode_str(input).decode_utf8_lossy();
    utf8_percent_encode(&decoded, unsafe_set).to_string()
}

pub fn default_port_for_scheme(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        "ws" => Some(80),
        "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

fn canonical_host(host: &Host<&str>) -> Result<String> {
    match host {
        Host::Domain(domain) => {
            let mut cleaned = domain.to_ascii_lowercase();
            while cleaned.contains("..") {
                cleaned = cleaned.replace("..", ".");
            }
            while cleaned.ends_with('.') {
                cleaned.pop();
            }
            let ascii = idna::domain_to_ascii(&cleaned)
                .map_err(|_| Error::BadUrl(format!("invalid host: {domain}")))?;

            let mut labels: Vec<&str> = ascii.split('.').filter(|l| !l.is_empty()).collect();
            labels.reverse();
            let mut out = String::new();
            for label in labels {
                out.push_str(label);
                out.push(',');
            }
            Ok(out)
        }
        Host::Ipv4(addr) => Ok(format_ipv4(addr)),
        Host::Ipv6(addr) => Ok(format!("[{}]", format_ipv6(addr))),
    }
}

/// Open question (spec §9): IPv4 is kept in its plain dotted-decimal
/// form rather than rewritten as an IPv6-mapped address.
fn format_ipv4(addr: &Ipv4Addr) -> String {
    addr.to_string()
}

/// Open question (spec §9): IPv6 uses `std::net::Ipv6Addr`'s own
/// display, which already collapses the longest run of zero groups to
/// `::`, the common canonical convention.
fn format_ipv6(addr: &Ipv6Addr) -> String {
    addr.to_string()
}

/// The parsed, canonicalised components of a URL, prior to assembly
/// into an SSURT string. Exposed so the query pipeline and access
/// control evaluator can build ancestor prefixes without reparsing.
pub struct Canonical {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub userinfo: Option<String>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl Canonical {
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| Error::BadUrl(format!("{input}: {e}")))?;

        let scheme = url.scheme().to_ascii_lowercase();
        let host = url
            .host()
            .ok_or_else(|| Error::BadUrl(format!("{input}: missing host")))?;
        let host = canonical_host(&host)?;

        let port = url
            .port()
            .or_else(|| default_port_for_scheme(&scheme))
            .ok_or_else(|| Error::BadUrl(format!("{input}: no port and no scheme default")))?;

        let userinfo = if url.username().is_empty() {
            None
        } else {
            let user = canonical_percent_encode(url.username(), USERINFO_UNSAFE);
            match url.password() {
                Some(pass) => Some(format!(
                    "{user}:{}",
                    canonical_percent_encode(pass, USERINFO_UNSAFE)
                )),
                None => Some(user),
            }
        };

        let path = {
            let raw = url.path();
            if raw.is_empty() {
                "/".to_string()
            } else {
                canonical_percent_encode(raw, PATH_UNSAFE)
            }
        };

        let query = url
            .query()
            .map(|q| canonical_percent_encode(q, QUERY_UNSAFE));
        let fragment = url
            .fragment()
            .map(|f| canonical_percent_encode(f, QUERY_UNSAFE));

        Ok(Self {
            host,
            port,
            scheme,
            userinfo,
            path,
            query,
            fragment,
        })
    }

    /// `sshost ":" port ":" scheme ":"` — everything up to (not
    /// including) the path. This is what rule/access-point prefix
    /// matching trims down to before it starts peeling domain labels.
    pub fn host_stem(&self) -> String {
        format!("{}:{}:{}:", self.host, self.port, self.scheme)
    }

    pub fn to_ssurt(&self) -> String {
        let mut out = self.host_stem();
        if let Some(userinfo) = &self.userinfo {
            out.push_str(userinfo);
            out.push('@');
        }
        out.push_str(&self.path);
        if let Some(query) = &self.query {
            let _ = write!(out, "?{query}");
        }
        if let Some(fragment) = &self.fragment {
            let _ = write!(out, "#{fragment}");
        }
        out
    }
}

/// Canonicalise a captured or queried URL to its full SSURT key form.
pub fn to_ssurt(url: &str) -> Result<String> {
    Ok(Canonical::parse(url)?.to_ssurt())
}

/// Legacy SURT form, `scheme://(tld,domain,sub,)/path?query`, kept for
/// interop with tooling that still expects the older key shape. Not
/// used for the primary key (SSURT is), only for display/export.
pub fn to_surt(url: &str) -> Result<String> {
    let c = Canonical::parse(url)?;
    let mut out = format!("{}://({}", c.scheme, c.host);
    out.push(')');
    out.push_str(&c.path);
    if let Some(query) = &c.query {
        let _ = write!(out, "?{query}");
    }
    Ok(out)
}

/// The ancestor prefixes of an SSURT, most specific first: trimming
/// path segments, then the scheme/port/userinfo stem down to the bare
/// host, then domain labels one at a time. Used by access-control rule
/// selection (spec §4.5 step 1).
pub fn ancestor_prefixes(canonical: &Canonical) -> Vec<String> {
    let mut out = Vec::new();
    out.push(canonical.to_ssurt());

    // Trim query/fragment, then path segments right to left.
    let host_stem = canonical.host_stem();
    let mut with_userinfo = host_stem.clone();
    if let Some(userinfo) = &canonical.userinfo {
        with_userinfo.push_str(userinfo);
        with_userinfo.push('@');
    }

    let path = &canonical.path;
    let segments: Vec<&str> = path.split('/').collect();
    // segments[0] is "" because path starts with '/'.
    for cut in (1..segments.len()).rev() {
        let mut prefix = with_userinfo.clone();
        prefix.push_str(&segments[..cut].join("/"));
        prefix.push('/');
        if prefix != out[out.len() - 1] {
            out.push(prefix);
        }
    }
    if out.last() != Some(&with_userinfo) {
        out.push(with_userinfo);
    }

    // Host stem without userinfo, then without scheme, then bare host.
    if out.last() != Some(&host_stem) {
        out.push(host_stem);
    }
    let host_and_scheme_free = format!("{}:", canonical.host);
    out.push(host_and_scheme_free);

    // Domain label ancestors: "com,example,www," -> "com,example," -> "com,".
    if !canonical.host.starts_with('[') && canonical.host.chars().next().map_or(false, |c| c.is_ascii_alphabetic() || c == ',')
    {
        let labels: Vec<&str> = canonical
            .host
            .trim_end_matches(',')
            .split(',')
            .filter(|s| !s.is_empty())
            .collect();
        for cut in (1..labels.len()).rev() {
            let mut prefix: String = labels[..cut].join(",");
            prefix.push(',');
            out.push(prefix);
        }
    }

    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ssurt() {
        assert_eq!(to_ssurt("http://example.com/").unwrap(), "com,example,:80:http:/");
    }

    #[test]
    fn host_reversal() {
        assert_eq!(
            to_ssurt("http://www.example.com/foo").unwrap(),
            "com,example,www,:80:http:/foo"
        );
    }

    #[test]
    fn default_https_port() {
        assert_eq!(
            to_ssurt("https://example.com/a/b").unwrap(),
            "com,example,:443:https:/a/b"
        );
    }

    #[test]
    fn explicit_port_kept() {
        assert_eq!(
            to_ssurt("http://example.com:8080/").unwrap(),
            "com,example,:8080:http:/"
        );
    }

    #[test]
    fn idempotent_canonicalisation() {
        let once = to_ssurt("HTTP://EXAMPLE.COM/Foo/../Foo/").unwrap();
        // re-deriving the key from the same original input is stable
        let twice = to_ssurt("HTTP://EXAMPLE.COM/Foo/../Foo/").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn query_preserved_unsorted() {
        assert_eq!(
            to_ssurt("http://example.com/?b=2&a=1").unwrap(),
            "com,example,:80:http:/?b=2&a=1"
        );
    }

    #[test]
    fn legacy_surt_form() {
        assert_eq!(
            to_surt("http://www.archive.org/").unwrap(),
            "http://(org,archive,www,)/"
        );
    }

    #[test]
    fn ancestor_prefixes_cover_domain_stems() {
        let c = Canonical::parse("http://www.example.com/a/b/c").unwrap();
        let ancestors = ancestor_prefixes(&c);
        assert!(ancestors.contains(&"com,example,".to_string()));
        assert!(ancestors.contains(&"com,".to_string()));
        assert!(ancestors.contains(&c.to_ssurt()));
    }
}
