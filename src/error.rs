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

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed url: {0}")]
    BadUrl(String),

    #[error("malformed cdx line {lineno}: {reason} ({line})")]
    BadCdxLine {
        line: String,
        lineno: usize,
        reason: String,
    },

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("kv store error")]
    Kv(#[from] rocksdb::Error),

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("json error")]
    Json(#[from] serde_json::Error),

    #[error("invalid collection name: {0}")]
    BadCollectionName(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::BadUrl(_) | Error::BadCdxLine { .. } | Error::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::CorruptRecord(_) | Error::Kv(_) | Error::Io(_) | Error::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::BadCollectionName(_) => StatusCode::BAD_REQUEST,
        };

        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!("{:?}", self);
        }

        (status, self.to_string()).into_response()
    }
}
