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

//! CRUD for `AccessRule`/`AccessPolicy`, layered on the Index's generic
//! id-keyed column families. Ids come from `Index::allocate_rule_id`/
//! `allocate_policy_id`, which is also where the invariant "ids are
//! monotonic and never reused" is enforced (spec §3).

use super::{AccessPolicy, AccessRule};
use crate::error::{Error, Result};
use crate::index::Index;

pub fn create_rule(
    index: &Index,
    surt_prefix: String,
    policy_id: u64,
    pinned: bool,
    from_timestamp: Option<u64>,
    to_timestamp: Option<u64>,
    from_access_time: Option<u64>,
    to_access_time: Option<u64>,
) -> Result<AccessRule> {
    let id = index.allocate_rule_id()?;
    let rule = AccessRule {
        id,
        surt_prefix,
        policy_id,
        pinned,
        from_timestamp,
        to_timestamp,
        from_access_time,
        to_access_time,
    };
    let bytes = serde_json::to_vec(&rule)?;
    let mut batch = index.begin_update();
    batch.put_access_rule(id, &bytes)?;
    batch.commit()?;
    Ok(rule)
}

pub fn delete_rule(index: &Index, id: u64) -> Result<()> {
    let mut batch = index.begin_update();
    batch.delete_access_rule(id)?;
    batch.commit()
}

pub fn list_rules(index: &Index) -> Result<Vec<AccessRule>> {
    index
        .list_access_rules()?
        .into_iter()
        .map(|(_, bytes)| decode_rule(&bytes))
        .collect()
}

pub fn create_policy(index: &Index, name: String, access_points: Vec<String>) -> Result<AccessPolicy> {
    let id = index.allocate_policy_id()?;
    let policy = AccessPolicy {
        id,
        name,
        access_points,
    };
    let bytes = serde_json::to_vec(&policy)?;
    let mut batch = index.begin_update();
    batch.put_access_policy(id, &bytes)?;
    batch.commit()?;
    Ok(policy)
}

pub fn delete_policy(index: &Index, id: u64) -> Result<()> {
    let mut batch = index.begin_update();
    batch.delete_access_policy(id)?;
    batch.commit()
}

pub fn list_policies(index: &Index) -> Result<Vec<AccessPolicy>> {
    index
        .list_access_policies()?
        .into_iter()
        .map(|(_, bytes)| decode_policy(&bytes))
        .collect()
}

fn decode_rule(bytes: &[u8]) -> Result<AccessRule> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::CorruptRecord(format!("access rule: {e}")))
}

fn decode_policy(bytes: &[u8]) -> Result<AccessPolicy> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::CorruptRecord(format!("access policy: {e}")))
}
