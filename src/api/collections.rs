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
use axum::response::Html;
use axum::Json;

use crate::error::Result;

use super::AppState;

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.data_store.list_collections()?))
}

/// A minimal, unstyled stats page. Not meant to be a dashboard, just
/// enough for an operator curling the URL to see the collection is
/// alive (spec §6 supplement).
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Html<String>> {
    let index = state.data_store.get_index(&collection)?;
    let record_count = index.estimated_record_count()?;
    let sequence_number = index.latest_sequence_number();

    Ok(Html(format!(
        "<html><body><h1>{collection}</h1><ul><li>records (estimated): {record_count}</li><li>sequence number: {sequence_number}</li></ul></body></html>"
    )))
}
