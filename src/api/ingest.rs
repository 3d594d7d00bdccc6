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

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::cdx_line::{self, IngestItem, IngestReport};
use crate::error::{Error, Result};

use super::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct IngestParams {
    #[serde(rename = "badLines", default)]
    bad_lines: Option<String>,
}

pub(super) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<IngestParams>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<IngestReport>> {
    if !state.config.allowed(bearer_token(&headers)) {
        return Err(Error::Unauthorized);
    }

    let skip_bad_lines = params.bad_lines.as_deref() == Some("skip");
    let (items, report) = cdx_line::parse_batch(&body, skip_bad_lines)?;

    let index = state.data_store.get_or_create_index(&collection)?;
    let mut batch = index.begin_update();
    for item in &items {
        match item {
            IngestItem::Capture(capture) => batch.put_capture(capture)?,
            IngestItem::Alias(alias) => batch.put_alias(alias)?,
        }
    }
    batch.commit()?;

    Ok(Json(report))
}
