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

//! Atomic multi-record writes (spec §4.3 `beginUpdate`/`Batch.commit`).
//!
//! Grounded on the teacher's `webgraph/store.rs`, which accumulates
//! edge puts into a `rocksdb::WriteBatch` and flushes it with a single
//! `db.write`. Commit is all-or-nothing; an uncommitted batch that is
//! simply dropped touches nothing.

use rocksdb::WriteBatch;

use super::{Index, CF_ACCESS_POLICY, CF_ACCESS_RULE, CF_ALIAS, CF_CAPTURES};
use crate::error::Result;
use crate::record::{codec, Alias, Capture};

pub struct Batch<'a> {
    index: &'a Index,
    inner: WriteBatch,
}

impl<'a> Batch<'a> {
    pub(super) fn new(index: &'a Index) -> Self {
        Self {
            index,
            inner: WriteBatch::default(),
        }
    }

    pub fn put_capture(&mut self, capture: &Capture) -> Result<()> {
        let cf = self.index.cf(CF_CAPTURES)?;
        let key = codec::encode_capture_key(&capture.url_key, capture.timestamp);
        let value = codec::encode_capture_value(capture)?;
        self.inner.put_cf(cf, key, value);
        Ok(())
    }

    pub fn delete_capture(&mut self, capture: &Capture) -> Result<()> {
        let cf = self.index.cf(CF_CAPTURES)?;
        let key = codec::encode_capture_key(&capture.url_key, capture.timestamp);
        self.inner.delete_cf(cf, key);
        Ok(())
    }

    pub fn put_alias(&mut self, alias: &Alias) -> Result<()> {
        let cf = self.index.cf(CF_ALIAS)?;
        self.inner.put_cf(
            cf,
            codec::encode_alias_key(&alias.alias_surt),
            codec::encode_alias_value(&alias.target_surt),
        );
        Ok(())
    }

    pub fn delete_alias(&mut self, alias_surt: &str) -> Result<()> {
        let cf = self.index.cf(CF_ALIAS)?;
        self.inner.delete_cf(cf, codec::encode_alias_key(alias_surt));
        Ok(())
    }

    /// Raw access used by the access-control store, which owns its own
    /// id-keyed encoding for rules and policies.
    pub fn put_access_rule(&mut self, id: u64, bytes: &[u8]) -> Result<()> {
        let cf = self.index.cf(CF_ACCESS_RULE)?;
        self.inner.put_cf(cf, id.to_be_bytes(), bytes);
        Ok(())
    }

    pub fn delete_access_rule(&mut self, id: u64) -> Result<()> {
        let cf = self.index.cf(CF_ACCESS_RULE)?;
        self.inner.delete_cf(cf, id.to_be_bytes());
        Ok(())
    }

    pub fn put_access_policy(&mut self, id: u64, bytes: &[u8]) -> Result<()> {
        let cf = self.index.cf(CF_ACCESS_POLICY)?;
        self.inner.put_cf(cf, id.to_be_bytes(), bytes);
        Ok(())
    }

    pub fn delete_access_policy(&mut self, id: u64) -> Result<()> {
        let cf = self.index.cf(CF_ACCESS_POLICY)?;
        self.inner.delete_cf(cf, id.to_be_bytes());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Writes every accumulated put/delete as one rocksdb write, which
    /// is also what lands in the WAL the replication feed reads from.
    pub fn commit(self) -> Result<()> {
        self.index.db.write(self.inner)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    #[test]
    fn uncommitted_batch_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        {
            let mut batch = index.begin_update();
            batch
                .put_capture(&Capture::new(
                    "com,example,:80:http:/".to_string(),
                    1,
                    "http://example.com/".to_string(),
                ))
                .unwrap();
            // dropped without commit
        }
        let remaining: Vec<_> = index
            .scan_prefix(b"com,example,")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn batch_len_tracks_operations() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(dir.path()).unwrap();
        let mut batch = index.begin_update();
        assert!(batch.is_empty());
        batch
            .put_capture(&Capture::new(
                "com,example,:80:http:/".to_string(),
                1,
                "http://example.com/".to_string(),
            ))
            .unwrap();
        batch
            .put_alias(&Alias {
                alias_surt: "com,example,:80:http:/old".to_string(),
                target_surt: "com,example,:80:http:/new".to_string(),
            })
            .unwrap();
        assert_eq!(batch.len(), 2);
    }
}
