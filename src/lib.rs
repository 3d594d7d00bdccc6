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

pub mod access;
pub mod api;
pub mod canon;
pub mod cdx_line;
pub mod config;
pub mod datastore;
pub mod error;
pub mod index;
pub mod query;
pub mod record;

pub use config::Config;
pub use datastore::DataStore;
pub use error::{Error, Result};
