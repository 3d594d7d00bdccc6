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

//! The HTTP surface (spec §6), assembled the way the teacher's own
//! `search_server.rs` builds its axum `Router`: one `AppState` behind
//! an `Arc`, one module per family of endpoints, CORS always on.

pub mod access;
pub mod changes;
pub mod collections;
pub mod ingest;
pub mod query;
pub mod records;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::datastore::DataStore;

pub struct AppState {
    pub data_store: DataStore,
    pub config: Config,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/collections", get(collections::list))
        .route("/:collection/cdx", get(query::query))
        .route("/:collection/ingest", post(ingest::ingest))
        .route("/:collection/delete", post(records::delete))
        .route("/:collection/captures", get(records::list_captures))
        .route("/:collection/aliases", get(records::list_aliases))
        .route("/:collection/changes", get(changes::changes))
        .route("/:collection/sequence", get(changes::sequence))
        .route(
            "/:collection/truncate_replication",
            post(changes::truncate_replication),
        )
        .route("/:collection/ap/:ap/rules", get(access::list_rules).post(access::create_rule))
        .route("/:collection/ap/:ap/rules/:id", axum::routing::delete(access::delete_rule))
        .route("/:collection/ap/:ap/policies", get(access::list_policies).post(access::create_policy))
        .route("/:collection/ap/:ap/check", get(access::check))
        .route("/:collection/ap/:ap/check/bulk", post(access::check_bulk))
        .route("/:collection/stats", get(collections::stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
