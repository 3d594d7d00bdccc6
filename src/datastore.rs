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

//! Process-wide registry of open collections (spec §4.6). One
//! `Index` is opened per collection name, lazily, and kept open for
//! the life of the process; `DataStore` is the single owner every HTTP
//! handler reaches the KV layer through.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::index::Index;

static COLLECTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() || !COLLECTION_NAME.is_match(name) {
        return Err(Error::BadCollectionName(name.to_string()));
    }
    Ok(())
}

pub struct DataStore {
    data_dir: PathBuf,
    open: RwLock<HashMap<String, Arc<Index>>>,
}

impl DataStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            open: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Returns the already-open or freshly-opened index for `name`,
    /// creating it on disk if it does not yet exist.
    pub fn get_or_create_index(&self, name: &str) -> Result<Arc<Index>> {
        validate_collection_name(name)?;

        if let Some(index) = self.open.read().expect("lock poisoned").get(name) {
            return Ok(index.clone());
        }

        let mut guard = self.open.write().expect("lock poisoned");
        // another writer may have opened it while we waited for the lock.
        if let Some(index) = guard.get(name) {
            return Ok(index.clone());
        }

        let index = Arc::new(Index::open(self.path_for(name))?);
        guard.insert(name.to_string(), index.clone());
        Ok(index)
    }

    /// Returns the index for `name` only if it already exists on disk
    /// or is already open; never creates a new collection. Used by
    /// read-only endpoints (query, stats) so a typo in a collection
    /// name does not silently create an empty one.
    pub fn get_index(&self, name: &str) -> Result<Arc<Index>> {
        validate_collection_name(name)?;

        if let Some(index) = self.open.read().expect("lock poisoned").get(name) {
            return Ok(index.clone());
        }

        if !self.path_for(name).is_dir() {
            return Err(Error::NotFound(format!("collection {name}")));
        }

        self.get_or_create_index(name)
    }

    /// Lists every collection directory under `data_dir`, whether or
    /// not it is currently open. Grounded on directory layout alone so
    /// this works even right after a process restart before any query
    /// has touched a given collection.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        list_collections(&self.data_dir)
    }

    pub fn close(&self) {
        self.open.write().expect("lock poisoned").clear();
    }
}

pub fn list_collections(data_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !data_dir.is_dir() {
        return Ok(names);
    }
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                if validate_collection_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
    }
    names.sort();
    Ok(names)
}
