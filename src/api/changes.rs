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

//! The replication feed a secondary polls (spec §4.7, §6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::replication::Update;

use super::ingest::bearer_token;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangesParams {
    since: u64,
}

pub async fn changes(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<ChangesParams>,
) -> Result<Json<Vec<Update>>> {
    let index = state.data_store.get_index(&collection)?;
    Ok(Json(index.updates_since(params.since)?))
}

#[derive(Debug, Serialize)]
pub struct SequenceResponse {
    sequence_number: u64,
}

pub async fn sequence(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<SequenceResponse>> {
    let index = state.data_store.get_index(&collection)?;
    Ok(Json(SequenceResponse {
        sequence_number: index.latest_sequence_number(),
    }))
}

/// fsyncs and truncates the replication WAL so a secondary can request
/// a fresh baseline (spec §4.3 `flushWal`). A write operation, so it is
/// gated the same way ingest is.
pub async fn truncate_replication(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    headers: HeaderMap,
) -> Result<()> {
    if !state.config.allowed(bearer_token(&headers)) {
        return Err(Error::Unauthorized);
    }
    let index = state.data_store.get_index(&collection)?;
    index.flush_wal()
}
