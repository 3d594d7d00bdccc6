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

//! The query pipeline (spec §4.4): canonicalise, resolve a single
//! alias hop, compute a scan prefix from the match type, stream
//! matching captures out of the index, filter by access control and
//! user-supplied regexes, sort, and cap at a limit.

pub mod format;

use regex::Regex;

use crate::access::{self, AccessPolicy, AccessRule, Decision};
use crate::canon::{self, ancestor_prefixes, Canonical};
use crate::error::Result;
use crate::index::Index;
use crate::record::Capture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Prefix,
    Host,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Default,
    Reverse,
    /// Order by absolute distance from this capture timestamp, closest
    /// first (spec §6 supplement `sort=closest`).
    Closest(u64),
}

/// `[!]field:pattern`, e.g. `statuscode:200` or `!mimetype:text/html`
/// (spec §6 supplement, repeatable `filter` parameter).
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub pattern: Regex,
    pub negate: bool,
}

impl FieldFilter {
    pub fn parse(raw: &str) -> Result<Self> {
        let (negate, raw) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (field, pattern) = raw.split_once(':').ok_or_else(|| {
            crate::error::Error::BadRequest(format!("filter must be field:pattern, got {raw}"))
        })?;
        let pattern = Regex::new(pattern)
            .map_err(|e| crate::error::Error::BadRequest(format!("bad filter regex: {e}")))?;
        Ok(Self {
            field: field.to_string(),
            pattern,
            negate,
        })
    }

    fn matches(&self, capture: &Capture) -> bool {
        let value = format::field_value(capture, &self.field);
        let hit = self.pattern.is_match(&value);
        hit != self.negate
    }
}

pub struct QueryParams {
    pub url: String,
    pub match_type: MatchType,
    pub from_timestamp: Option<u64>,
    pub to_timestamp: Option<u64>,
    pub limit: usize,
    pub filters: Vec<FieldFilter>,
    pub sort: Sort,
    pub fields: Option<Vec<String>>,
    /// The audience making the request (spec §4.4: "optional access
    /// point"), evaluated against `AccessPolicy.accessPoints` when
    /// access control is enabled. Ignored otherwise.
    pub access_point: String,
}

/// `None` disables access-control filtering entirely (the collection
/// has `experimental_access_control` off). `Some` carries the snapshot
/// of rules/policies to evaluate against.
pub struct AccessContext<'a> {
    pub rules: &'a [AccessRule],
    pub policies: &'a [AccessPolicy],
    pub default_decision: Decision,
}

/// Computes the raw key-space prefix a given match type scans (spec
/// §4.4 step 3). `Exact` appends the capture key's own field
/// separator (not the pattern-grammar SPACE sentinel, which only
/// applies to standalone SSURT strings such as access-rule prefixes)
/// so the scan cannot also pick up a longer key sharing the same
/// stem, e.g. `/a` must not also return `/ab`.
pub fn compute_prefix(url: &str, match_type: MatchType) -> Result<Vec<u8>> {
    match match_type {
        MatchType::Exact => {
            let c = Canonical::parse(url)?;
            let mut prefix = c.to_ssurt().into_bytes();
            prefix.push(crate::record::codec::KEY_SEPARATOR);
            Ok(prefix)
        }
        MatchType::Prefix => Ok(canon::pattern::to_ssurt_prefix(url)?.into_bytes()),
        MatchType::Host => Ok(Canonical::parse(url)?.host_stem().into_bytes()),
        MatchType::Domain => Ok(Canonical::parse(url)?.host.into_bytes()),
    }
}

/// Runs the full pipeline and returns the final, ordered, capped page
/// of results. `index.scan_prefix` already bounds memory to the live
/// window rather than materialising the whole collection; this
/// function only buffers the (already filtered, already access
/// checked) page that survives to the `limit`.
pub fn run(index: &Index, params: &QueryParams, access_ctx: Option<&AccessContext>) -> Result<Vec<Capture>> {
    let target = Canonical::parse(&params.url)?;
    let target_ssurt = target.to_ssurt();

    // alias resolution is a single hop: spec §3 explicitly rejects
    // alias chains, so there is no loop here to guard against cycles.
    // Only an exact-match query can land on one side of an alias pair,
    // since aliases equate two single full SSURT keys, not prefixes.
    let alias_target = if params.match_type == MatchType::Exact {
        index.get_alias(&target_ssurt)?
    } else {
        None
    };

    let prefix = match &alias_target {
        Some(target_surt) => {
            let mut prefix = target_surt.clone().into_bytes();
            prefix.push(crate::record::codec::KEY_SEPARATOR);
            prefix
        }
        None => compute_prefix(&params.url, params.match_type)?,
    };

    let access_time = access::now_access_time();

    let mut out = Vec::new();
    for item in index.scan_prefix(&prefix)? {
        let mut capture = item?;

        // spec §4.4 step 4a: a query resolved through an alias shows
        // the requested alias URL, not the stored target URL, in the
        // emitted capture's originalUrl field.
        if alias_target.is_some() {
            capture.original_url = params.url.clone();
        }

        if let Some(from) = params.from_timestamp {
            if capture.timestamp < from {
                continue;
            }
        }
        if let Some(to) = params.to_timestamp {
            if capture.timestamp > to {
                continue;
            }
        }

        if let Some(ctx) = access_ctx {
            let canonical = match Canonical::parse(&capture.original_url) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let ancestors = ancestor_prefixes(&canonical);
            let decision = access::check_access(
                &params.access_point,
                &ancestors,
                capture.timestamp,
                access_time,
                ctx.rules,
                ctx.policies,
                ctx.default_decision,
            );
            if decision == Decision::Deny {
                continue;
            }
        }

        if params.filters.iter().all(|f| f.matches(&capture)) {
            out.push(capture);
        }
    }

    match params.sort {
        Sort::Default => {}
        Sort::Reverse => out.reverse(),
        Sort::Closest(anchor) => {
            out.sort_by_key(|c| c.timestamp.abs_diff(anchor));
        }
    }

    out.truncate(params.limit);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    fn seed(index: &Index) {
        let mut batch = index.begin_update();
        batch
            .put_capture(&Capture::new(
                "com,example,:80:http:/".to_string(),
                20_200_101_000_000,
                "http://example.com/".to_string(),
            ))
            .unwrap();
        batch
            .put_capture(&Capture::new(
                "com,example,:80:http:/".to_string(),
                20_210_101_000_000,
                "http://example.com/".to_string(),
            ))
            .unwrap();
        batch
            .put_capture(&Capture::new(
                "com,example,www,:80:http:/".to_string(),
                20_200_101_000_000,
                "http://www.example.com/".to_string(),
            ))
            .unwrap();
        batch.commit().unwrap();
    }

    #[test]
    fn exact_match_excludes_other_paths() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        let mut batch = index.begin_update();
        batch
            .put_capture(&Capture::new(
                "com,example,:80:http:/a".to_string(),
                1,
                "http://example.com/a".to_string(),
            ))
            .unwrap();
        batch
            .put_capture(&Capture::new(
                "com,example,:80:http:/ab".to_string(),
                1,
                "http://example.com/ab".to_string(),
            ))
            .unwrap();
        batch.commit().unwrap();

        let params = QueryParams {
            url: "http://example.com/a".to_string(),
            match_type: MatchType::Exact,
            from_timestamp: None,
            to_timestamp: None,
            limit: 100,
            filters: vec![],
            sort: Sort::Default,
            fields: None,
            access_point: "public".to_string(),
        };
        let results = run(&index, &params, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url_key, "com,example,:80:http:/a");
    }

    #[test]
    fn domain_match_includes_subdomains() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        seed(&index);

        let params = QueryParams {
            url: "http://example.com/".to_string(),
            match_type: MatchType::Domain,
            from_timestamp: None,
            to_timestamp: None,
            limit: 100,
            filters: vec![],
            sort: Sort::Default,
            fields: None,
            access_point: "public".to_string(),
        };
        let results = run(&index, &params, None).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn closest_sort_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        seed(&index);

        let params = QueryParams {
            url: "http://example.com/".to_string(),
            match_type: MatchType::Prefix,
            from_timestamp: None,
            to_timestamp: None,
            limit: 100,
            filters: vec![],
            sort: Sort::Closest(20_210_601_000_000),
            fields: None,
            access_point: "public".to_string(),
        };
        let results = run(&index, &params, None).unwrap();
        assert_eq!(results[0].timestamp, 20_210_101_000_000);
    }

    #[test]
    fn access_control_denies_matching_rule() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        seed(&index);

        let policies = vec![AccessPolicy {
            id: 1,
            name: "staff-only".to_string(),
            access_points: vec!["staff".to_string()],
        }];
        let rules = vec![AccessRule {
            id: 1,
            surt_prefix: "com,example,".to_string(),
            policy_id: 1,
            pinned: false,
            from_timestamp: None,
            to_timestamp: None,
            from_access_time: None,
            to_access_time: None,
        }];
        let ctx = AccessContext {
            rules: &rules,
            policies: &policies,
            default_decision: Decision::Allow,
        };

        let params = QueryParams {
            url: "http://example.com/".to_string(),
            match_type: MatchType::Domain,
            from_timestamp: None,
            to_timestamp: None,
            limit: 100,
            filters: vec![],
            sort: Sort::Default,
            fields: None,
            access_point: "public".to_string(),
        };
        let results = run(&index, &params, Some(&ctx)).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn field_filter_excludes_non_matching_status() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        let mut batch = index.begin_update();
        let mut c = Capture::new(
            "com,example,:80:http:/".to_string(),
            1,
            "http://example.com/".to_string(),
        );
        c.status = 404;
        batch.put_capture(&c).unwrap();
        batch.commit().unwrap();

        let params = QueryParams {
            url: "http://example.com/".to_string(),
            match_type: MatchType::Exact,
            from_timestamp: None,
            to_timestamp: None,
            limit: 100,
            filters: vec![FieldFilter::parse("statuscode:200").unwrap()],
            sort: Sort::Default,
            fields: None,
            access_point: "public".to_string(),
        };
        let results = run(&index, &params, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn aliased_query_relabels_original_url_with_the_request_form() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        let mut batch = index.begin_update();
        batch
            .put_capture(&Capture::new(
                "com,example,:80:http:/".to_string(),
                1,
                "http://example.com/".to_string(),
            ))
            .unwrap();
        batch
            .put_alias(&crate::record::Alias {
                alias_surt: "com,example,www,:80:http:/".to_string(),
                target_surt: "com,example,:80:http:/".to_string(),
            })
            .unwrap();
        batch.commit().unwrap();

        let params = QueryParams {
            url: "http://www.example.com/".to_string(),
            match_type: MatchType::Exact,
            from_timestamp: None,
            to_timestamp: None,
            limit: 100,
            filters: vec![],
            sort: Sort::Default,
            fields: None,
            access_point: "public".to_string(),
        };
        let results = run(&index, &params, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].original_url, "http://www.example.com/");
    }
}
