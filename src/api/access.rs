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

//! Access-rule/policy CRUD and the `check`/`check/bulk` evaluator
//! endpoints (spec §4.5, §6 supplement).
//!
//! The `ap` path segment names the access point: for `rules`/`policies`
//! it is only a grouping label in the URL (this implementation keeps
//! one rule/policy table per collection rather than per access point,
//! since nothing in the data model distinguishes rules across access
//! points within a collection); for `check`/`check/bulk` it is the
//! audience `checkAccess` evaluates `AccessPolicy.accessPoints` against.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::access::{self, now_access_time, store as access_store, AccessPolicy, AccessRule, Decision};
use crate::error::Result;

use super::query::ancestors_for;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRuleBody {
    surt_prefix: String,
    policy_id: u64,
    #[serde(default)]
    pinned: bool,
    from_timestamp: Option<u64>,
    to_timestamp: Option<u64>,
    from_access_time: Option<u64>,
    to_access_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePolicyBody {
    name: String,
    access_points: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckParams {
    url: String,
    timestamp: u64,
    /// Defaults to `now` (spec §4.5 `checkAccess(.., accessTime=now)`).
    access_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CheckBulkBody {
    targets: Vec<CheckParams>,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    allowed: bool,
}

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Path((collection, _ap)): Path<(String, String)>,
) -> Result<Json<Vec<AccessRule>>> {
    let index = state.data_store.get_index(&collection)?;
    Ok(Json(access_store::list_rules(&index)?))
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Path((collection, _ap)): Path<(String, String)>,
    Json(body): Json<CreateRuleBody>,
) -> Result<Json<AccessRule>> {
    let index = state.data_store.get_or_create_index(&collection)?;
    let rule = access_store::create_rule(
        &index,
        body.surt_prefix,
        body.policy_id,
        body.pinned,
        body.from_timestamp,
        body.to_timestamp,
        body.from_access_time,
        body.to_access_time,
    )?;
    Ok(Json(rule))
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path((collection, _ap, id)): Path<(String, String, u64)>,
) -> Result<()> {
    let index = state.data_store.get_index(&collection)?;
    access_store::delete_rule(&index, id)
}

pub async fn list_policies(
    State(state): State<Arc<AppState>>,
    Path((collection, _ap)): Path<(String, String)>,
) -> Result<Json<Vec<AccessPolicy>>> {
    let index = state.data_store.get_index(&collection)?;
    Ok(Json(access_store::list_policies(&index)?))
}

pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Path((collection, _ap)): Path<(String, String)>,
    Json(body): Json<CreatePolicyBody>,
) -> Result<Json<AccessPolicy>> {
    let index = state.data_store.get_or_create_index(&collection)?;
    let policy = access_store::create_policy(&index, body.name, body.access_points)?;
    Ok(Json(policy))
}

pub async fn check(
    State(state): State<Arc<AppState>>,
    Path((collection, ap)): Path<(String, String)>,
    Query(params): Query<CheckParams>,
) -> Result<Json<CheckResult>> {
    let index = state.data_store.get_index(&collection)?;
    let rules = access_store::list_rules(&index)?;
    let policies = access_store::list_policies(&index)?;
    let ancestors = ancestors_for(&params.url)?;
    let access_time = params.access_time.unwrap_or_else(now_access_time);

    let default_decision = if state.config.default_access_deny {
        Decision::Deny
    } else {
        Decision::Allow
    };
    let decision = access::check_access(
        &ap,
        &ancestors,
        params.timestamp,
        access_time,
        &rules,
        &policies,
        default_decision,
    );
    Ok(Json(CheckResult {
        allowed: decision == Decision::Allow,
    }))
}

pub async fn check_bulk(
    State(state): State<Arc<AppState>>,
    Path((collection, ap)): Path<(String, String)>,
    Json(body): Json<CheckBulkBody>,
) -> Result<Json<Vec<CheckResult>>> {
    let index = state.data_store.get_index(&collection)?;
    let rules = access_store::list_rules(&index)?;
    let policies = access_store::list_policies(&index)?;
    let default_decision = if state.config.default_access_deny {
        Decision::Deny
    } else {
        Decision::Allow
    };

    let mut targets = Vec::with_capacity(body.targets.len());
    for target in &body.targets {
        let access_time = target.access_time.unwrap_or_else(now_access_time);
        targets.push((ancestors_for(&target.url)?, target.timestamp, access_time));
    }

    let decisions = access::check_access_bulk(&ap, &targets, &rules, &policies, default_decision);
    Ok(Json(
        decisions
            .into_iter()
            .map(|d| CheckResult {
                allowed: d == Decision::Allow,
            })
            .collect(),
    ))
}
