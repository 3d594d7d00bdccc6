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

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::Query;
use serde::Deserialize;

use crate::access::store as access_store;
use crate::access::Decision;
use crate::canon::ancestor_prefixes;
use crate::canon::Canonical;
use crate::error::{Error, Result};
use crate::query::{self, AccessContext, FieldFilter, MatchType, QueryParams, Sort};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RawParams {
    url: String,
    #[serde(rename = "matchType", default)]
    match_type: Option<String>,
    from: Option<u64>,
    to: Option<u64>,
    limit: Option<usize>,
    #[serde(default)]
    filter: Vec<String>,
    fl: Option<String>,
    sort: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(rename = "accessPoint")]
    access_point: Option<String>,
}

/// The audience assumed for a query that doesn't name one explicitly.
const DEFAULT_ACCESS_POINT: &str = "public";

pub async fn query(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(raw): Query<RawParams>,
) -> Result<Response> {
    let index = state.data_store.get_index(&collection)?;

    let match_type = match raw.match_type.as_deref() {
        Some("prefix") => MatchType::Prefix,
        Some("host") => MatchType::Host,
        Some("domain") => MatchType::Domain,
        Some("exact") | None => MatchType::Exact,
        Some(other) => return Err(Error::BadRequest(format!("unknown matchType {other}"))),
    };

    let sort = match raw.sort.as_deref() {
        None => Sort::Default,
        Some("reverse") => Sort::Reverse,
        Some(s) => match s.strip_prefix("closest:") {
            Some(anchor) => Sort::Closest(anchor.parse().map_err(|_| {
                Error::BadRequest(format!("bad sort=closest anchor: {anchor}"))
            })?),
            None => return Err(Error::BadRequest(format!("unknown sort {s}"))),
        },
    };

    let filters = raw
        .filter
        .iter()
        .map(|f| FieldFilter::parse(f))
        .collect::<Result<Vec<_>>>()?;

    let fields = raw
        .fl
        .as_ref()
        .map(|fl| fl.split(',').map(|s| s.trim().to_string()).collect());

    let limit = raw.limit.unwrap_or(state.config.max_query_limit).min(state.config.max_query_limit);

    let params = QueryParams {
        url: raw.url,
        match_type,
        from_timestamp: raw.from,
        to_timestamp: raw.to,
        limit,
        filters,
        sort,
        fields,
        access_point: raw
            .access_point
            .unwrap_or_else(|| DEFAULT_ACCESS_POINT.to_string()),
    };

    let access_ctx = if state.config.experimental_access_control {
        let rules = access_store::list_rules(&index)?;
        let policies = access_store::list_policies(&index)?;
        Some((rules, policies))
    } else {
        None
    };
    let access_ctx = access_ctx.as_ref().map(|(rules, policies)| AccessContext {
        rules,
        policies,
        default_decision: if state.config.default_access_deny {
            Decision::Deny
        } else {
            Decision::Allow
        },
    });

    let results = query::run(&index, &params, access_ctx.as_ref())?;

    let body = match raw.output.as_deref() {
        Some("text") => query::format::to_text(&results, params.fields.as_deref()),
        Some("xml") => query::format::to_xml(&results, params.fields.as_deref())?,
        Some("json") | None => query::format::to_json(&results, params.fields.as_deref())?,
        Some(other) => return Err(Error::BadRequest(format!("unknown output format {other}"))),
    };

    Ok(body.into_response())
}

/// Resolves the ancestor prefixes a single URL needs for an access
/// check outside the query pipeline (used by the `check`/`check/bulk`
/// endpoints, which have no capture to derive them from).
pub(crate) fn ancestors_for(url: &str) -> Result<Vec<String>> {
    let canonical = Canonical::parse(url)?;
    Ok(ancestor_prefixes(&canonical))
}
