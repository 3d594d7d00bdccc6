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

pub mod codec;

use serde::{Deserialize, Serialize};

/// One observation of one URL at one instant (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub url_key: String,
    pub timestamp: u64,
    pub original_url: String,
    pub mime_type: String,
    pub status: u16,
    pub digest: String,
    pub redirect_url: String,
    pub robot_flags: String,
    pub length: u64,
    pub offset: u64,
    pub file: String,
}

impl Capture {
    pub fn new(url_key: String, timestamp: u64, original_url: String) -> Self {
        Self {
            url_key,
            timestamp,
            original_url,
            mime_type: "-".to_string(),
            status: 0,
            digest: "-".to_string(),
            redirect_url: "-".to_string(),
            robot_flags: "-".to_string(),
            length: 0,
            offset: 0,
            file: "-".to_string(),
        }
    }
}

/// A directed canonicalisation equivalence: `alias_surt -> target_surt`
/// (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub alias_surt: String,
    pub target_surt: String,
}
