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

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: SocketAddr,
    pub data_dir: PathBuf,

    #[serde(default)]
    pub is_secondary: bool,

    #[serde(default)]
    pub accepts_writes: bool,

    #[serde(default)]
    pub experimental_access_control: bool,

    #[serde(default)]
    pub default_access_deny: bool,

    #[serde(default = "default_max_query_limit")]
    pub max_query_limit: usize,

    pub write_permission_token: Option<String>,
}

fn default_max_query_limit() -> usize {
    1000
}

impl Config {
    /// Whether a write request carrying `token` is allowed to mutate state.
    ///
    /// A secondary only accepts writes when explicitly configured to
    /// (`accepts_writes`), per spec §4.7.
    pub fn allowed(&self, token: Option<&str>) -> bool {
        if self.is_secondary && !self.accepts_writes {
            return false;
        }

        match &self.write_permission_token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }
}

pub fn load_toml_config<T, P>(path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<std::path::Path>,
{
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            host: "127.0.0.1:8080".parse().unwrap(),
            data_dir: PathBuf::from("/tmp/cdxserve-test"),
            is_secondary: false,
            accepts_writes: false,
            experimental_access_control: false,
            default_access_deny: false,
            max_query_limit: 1000,
            write_permission_token: None,
        }
    }

    #[test]
    fn secondary_rejects_writes_by_default() {
        let mut config = base_config();
        config.is_secondary = true;
        assert!(!config.allowed(None));
    }

    #[test]
    fn secondary_accepts_writes_when_configured() {
        let mut config = base_config();
        config.is_secondary = true;
        config.accepts_writes = true;
        assert!(config.allowed(None));
    }

    #[test]
    fn token_gate() {
        let mut config = base_config();
        config.write_permission_token = Some("secret".to_string());
        assert!(!config.allowed(None));
        assert!(!config.allowed(Some("wrong")));
        assert!(config.allowed(Some("secret")));
    }
}
