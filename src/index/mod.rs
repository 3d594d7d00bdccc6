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

//! One KV database per collection (spec §4.3), grounded on the
//! teacher's `kv/rocksdb_store.rs` open-options pattern and
//! `webgraph/store.rs`'s batched-write/prefix-iterator idiom.

pub mod batch;
pub mod replication;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};

use crate::error::{Error, Result};
use crate::record::{codec, Alias, Capture};

pub use batch::Batch;

pub const CF_CAPTURES: &str = "default";
pub const CF_ALIAS: &str = "alias";
pub const CF_ACCESS_RULE: &str = "access-rule";
pub const CF_ACCESS_POLICY: &str = "access-policy";

const NEXT_RULE_ID_KEY: &[u8] = b"__next_rule_id__";
const NEXT_POLICY_ID_KEY: &[u8] = b"__next_policy_id__";

fn db_options() -> Options {
    let mut options = Options::default();
    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.set_max_open_files(512);
    options
}

/// A single collection's KV database plus the monotonic id counters
/// access control rules/policies draw from (spec §4.3, §4.5).
pub struct Index {
    pub(crate) db: DB,
    path: PathBuf,
    // Persisting the counter and handing out the next value must be
    // one critical section: rocksdb has no atomic increment-and-fetch
    // primitive for a single key without a merge operator, so this
    // crate uses a short-held Mutex rather than the fully lock-free
    // scheme spec §5 describes in the abstract. See DESIGN.md.
    next_rule_id: Mutex<u64>,
    next_policy_id: Mutex<u64>,
}

impl Index {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_CAPTURES, Options::default()),
            ColumnFamilyDescriptor::new(CF_ALIAS, Options::default()),
            ColumnFamilyDescriptor::new(CF_ACCESS_RULE, Options::default()),
            ColumnFamilyDescriptor::new(CF_ACCESS_POLICY, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_options(), &path, cfs)?;

        let next_rule_id = load_counter(&db, CF_ACCESS_RULE, NEXT_RULE_ID_KEY)?;
        let next_policy_id = load_counter(&db, CF_ACCESS_POLICY, NEXT_POLICY_ID_KEY)?;

        Ok(Self {
            db,
            path,
            next_rule_id: Mutex::new(next_rule_id),
            next_policy_id: Mutex::new(next_policy_id),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::CorruptRecord(format!("missing column family {name}")))
    }

    /// Opens a prefix iterator at `url_key_start` and yields decoded
    /// captures in key order (spec §4.3 `capturesAfter`). Finite,
    /// forward-only; the caller applies its own limit.
    pub fn captures_after(
        &self,
        url_key_start: &str,
    ) -> Result<impl Iterator<Item = Result<Capture>> + '_> {
        let cf = self.cf(CF_CAPTURES)?;
        let iter = self.db.iterator_cf(
            cf,
            IteratorMode::From(url_key_start.as_bytes(), Direction::Forward),
        );
        Ok(iter.map(|item| {
            let (key, value) = item.map_err(Error::from)?;
            codec::decode_capture(&key, &value)
        }))
    }

    /// Scans every capture whose key starts with `prefix` (raw bytes,
    /// already including any SPACE sentinel). Used by the query
    /// pipeline (spec §4.4).
    pub fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> Result<impl Iterator<Item = Result<Capture>> + 'a> {
        let cf = self.cf(CF_CAPTURES)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        Ok(iter
            .take_while(move |item| match item {
                Ok((key, _)) => key.starts_with(prefix),
                Err(_) => true,
            })
            .map(|item| {
                let (key, value) = item.map_err(Error::from)?;
                codec::decode_capture(&key, &value)
            }))
    }

    pub fn get_alias(&self, alias_surt: &str) -> Result<Option<String>> {
        let cf = self.cf(CF_ALIAS)?;
        match self.db.get_cf(cf, alias_surt.as_bytes())? {
            Some(value) => Ok(Some(String::from_utf8(value).map_err(|e| {
                Error::CorruptRecord(format!("alias value not utf8: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn list_aliases(&self, start: &str) -> Result<impl Iterator<Item = Result<Alias>> + '_> {
        let cf = self.cf(CF_ALIAS)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(start.as_bytes(), Direction::Forward));
        Ok(iter.map(|item| {
            let (key, value) = item.map_err(Error::from)?;
            codec::decode_alias(&key, &value)
        }))
    }

    /// Every stored access rule, as `(id, serialized bytes)`. The
    /// counter key is a 16-byte ASCII literal and every real rule id is
    /// an 8-byte big-endian integer, so length tells them apart without
    /// the access-control module needing to know the counter's name.
    pub fn list_access_rules(&self) -> Result<Vec<(u64, Vec<u8>)>> {
        self.list_id_keyed(CF_ACCESS_RULE)
    }

    pub fn list_access_policies(&self) -> Result<Vec<(u64, Vec<u8>)>> {
        self.list_id_keyed(CF_ACCESS_POLICY)
    }

    fn list_id_keyed(&self, cf_name: &str) -> Result<Vec<(u64, Vec<u8>)>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            if key.len() != 8 {
                continue;
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&key);
            out.push((u64::from_be_bytes(buf), value.to_vec()));
        }
        Ok(out)
    }

    pub fn begin_update(&self) -> Batch<'_> {
        Batch::new(self)
    }

    pub fn estimated_record_count(&self) -> Result<u64> {
        Ok(self
            .db
            .property_int_value("rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }

    pub fn latest_sequence_number(&self) -> u64 {
        self.db.latest_sequence_number()
    }

    /// The replication feed (spec §4.7): every committed batch with
    /// `sequenceNumber >= since + 1`.
    pub fn updates_since(&self, since: u64) -> Result<Vec<replication::Update>> {
        replication::updates_since(&self.db, since)
    }

    /// fsync and truncate the WAL so a secondary can request a fresh
    /// baseline (spec §4.3 `flushWal`).
    pub fn flush_wal(&self) -> Result<()> {
        self.db.flush_wal(true)?;
        Ok(())
    }

    pub fn allocate_rule_id(&self) -> Result<u64> {
        let mut guard = self.next_rule_id.lock().expect("mutex poisoned");
        let id = *guard;
        *guard += 1;
        self.persist_counter(CF_ACCESS_RULE, NEXT_RULE_ID_KEY, *guard)?;
        Ok(id)
    }

    pub fn allocate_policy_id(&self) -> Result<u64> {
        let mut guard = self.next_policy_id.lock().expect("mutex poisoned");
        let id = *guard;
        *guard += 1;
        self.persist_counter(CF_ACCESS_POLICY, NEXT_POLICY_ID_KEY, *guard)?;
        Ok(id)
    }

    fn persist_counter(&self, cf_name: &str, key: &[u8], value: u64) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, value.to_be_bytes())?;
        Ok(())
    }
}

fn load_counter(db: &DB, cf_name: &str, key: &[u8]) -> Result<u64> {
    let cf = db
        .cf_handle(cf_name)
        .ok_or_else(|| Error::CorruptRecord(format!("missing column family {cf_name}")))?;
    match db.get_cf(cf, key)? {
        Some(bytes) if bytes.len() == 8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes);
            Ok(u64::from_be_bytes(buf))
        }
        _ => Ok(1),
    }
}
