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

//! Access control (spec §4.5): rules bind an SSURT prefix, a
//! capture-time window, and an access-time window to a policy; a query
//! picks the single best-matching rule by walking the target URL's
//! ancestor prefixes, then the policy decides whether the supplied
//! access point may see the result.

pub mod store;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
}

/// A named audience: the set of access points permitted to view
/// captures a rule routes to this policy (spec §3 `AccessPolicy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub id: u64,
    pub name: String,
    pub access_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: u64,
    pub surt_prefix: String,
    pub policy_id: u64,
    /// A pinned rule always outranks an unpinned one, regardless of
    /// specificity (spec §4.5 step 4).
    pub pinned: bool,
    /// Capture-timestamp window the rule applies to, using the same
    /// 14-digit `YYYYMMDDhhmmss` encoding as `Capture::timestamp`.
    /// `None` means unbounded on that side.
    pub from_timestamp: Option<u64>,
    pub to_timestamp: Option<u64>,
    /// Access-timestamp window: when the *request* (not the capture)
    /// must fall for the rule to apply, same 14-digit encoding. This
    /// crate implements only the absolute form of spec §3's access-time
    /// window; see DESIGN.md for the relative-to-capture open question.
    pub from_access_time: Option<u64>,
    pub to_access_time: Option<u64>,
}

impl AccessRule {
    fn covers_capture_time(&self, capture_time: u64) -> bool {
        in_window(self.from_timestamp, self.to_timestamp, capture_time)
    }

    fn covers_access_time(&self, access_time: u64) -> bool {
        in_window(self.from_access_time, self.to_access_time, access_time)
    }
}

fn in_window(from: Option<u64>, to: Option<u64>, value: u64) -> bool {
    if let Some(from) = from {
        if value < from {
            return false;
        }
    }
    if let Some(to) = to {
        if value > to {
            return false;
        }
    }
    true
}

/// `now`, encoded the same 14-digit way as `Capture::timestamp`, for
/// `checkAccess`'s `accessTime = now` default (spec §4.5).
pub fn now_access_time() -> u64 {
    chrono::Utc::now()
        .format("%Y%m%d%H%M%S")
        .to_string()
        .parse()
        .expect("chrono format is always 14 ASCII digits")
}

/// Picks the best rule among those bound to `ancestor_prefixes` (most
/// specific first, as produced by `canon::ancestor_prefixes`), resolves
/// it through `policies`, and decides whether `access_point` may see
/// the result. Falls back to `default_decision` when nothing matches
/// (spec §4.5 step 6).
///
/// Ranking among matching rules, most to least important:
/// 1. pinned before unpinned,
/// 2. more specific prefix (earlier in `ancestor_prefixes`) before less,
/// 3. higher rule id (created more recently) before lower, as the tie
///    a human editing rules through the API would expect: "the rule I
///    just added wins".
pub fn check_access(
    access_point: &str,
    ancestor_prefixes: &[String],
    capture_time: u64,
    access_time: u64,
    rules: &[AccessRule],
    policies: &[AccessPolicy],
    default_decision: Decision,
) -> Decision {
    let mut best: Option<(usize, &AccessRule)> = None;

    for (specificity, prefix) in ancestor_prefixes.iter().enumerate() {
        for rule in rules {
            if rule.surt_prefix != *prefix
                || !rule.covers_capture_time(capture_time)
                || !rule.covers_access_time(access_time)
            {
                continue;
            }
            best = Some(match best {
                None => (specificity, rule),
                Some((best_specificity, best_rule)) => {
                    if rank(specificity, rule) > rank(best_specificity, best_rule) {
                        (specificity, rule)
                    } else {
                        (best_specificity, best_rule)
                    }
                }
            });
        }
    }

    match best {
        Some((_, rule)) => match policies.iter().find(|p| p.id == rule.policy_id) {
            Some(policy) if policy.access_points.iter().any(|ap| ap == access_point) => {
                Decision::Allow
            }
            Some(_) => Decision::Deny,
            None => default_decision,
        },
        None => default_decision,
    }
}

/// Bulk variant of `check_access`: one decision per `(ancestor_prefixes,
/// capture_time, access_time)` triple, sharing `access_point` and the
/// same rule/policy snapshot so the result set is consistent even if
/// rules change mid-request.
pub fn check_access_bulk(
    access_point: &str,
    targets: &[(Vec<String>, u64, u64)],
    rules: &[AccessRule],
    policies: &[AccessPolicy],
    default_decision: Decision,
) -> Vec<Decision> {
    targets
        .iter()
        .map(|(ancestors, capture_time, access_time)| {
            check_access(
                access_point,
                ancestors,
                *capture_time,
                *access_time,
                rules,
                policies,
                default_decision,
            )
        })
        .collect()
}

/// Encodes (pinned, specificity, id) as a single comparable key: pinned
/// dominates, then specificity (inverted, since a lower index is more
/// specific), then id.
fn rank(specificity: usize, rule: &AccessRule) -> (u8, usize, u64) {
    (rule.pinned as u8, usize::MAX - specificity, rule.id)
}
