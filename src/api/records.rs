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

//! Raw record listing and deletion (spec §4.3 `capturesAfter`/
//! `listAliases`/`Batch.deleteCapture`, §6 supplement).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::canon::Canonical;
use crate::error::{Error, Result};
use crate::record::{Alias, Capture};

use super::ingest::bearer_token;
use super::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StartParams {
    #[serde(default)]
    start: Option<String>,
}

pub async fn list_captures(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<StartParams>,
) -> Result<Json<Vec<Capture>>> {
    let index = state.data_store.get_index(&collection)?;
    let start = params.start.unwrap_or_default();
    let captures: Vec<Capture> = index.captures_after(&start)?.collect::<Result<_>>()?;
    Ok(Json(captures))
}

pub async fn list_aliases(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<StartParams>,
) -> Result<Json<Vec<Alias>>> {
    let index = state.data_store.get_index(&collection)?;
    let start = params.start.unwrap_or_default();
    let aliases: Vec<Alias> = index.list_aliases(&start)?.collect::<Result<_>>()?;
    Ok(Json(aliases))
}

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    url: String,
    timestamp: u64,
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(body): Json<DeleteBody>,
) -> Result<()> {
    if !state.config.allowed(bearer_token(&headers)) {
        return Err(Error::Unauthorized);
    }

    let index = state.data_store.get_index(&collection)?;
    let url_key = Canonical::parse(&body.url)?.to_ssurt();
    let capture = Capture::new(url_key, body.timestamp, body.url);

    let mut batch = index.begin_update();
    batch.delete_capture(&capture)?;
    batch.commit()
}
