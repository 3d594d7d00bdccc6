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

//! Replication feed (spec §4.7): a secondary pulls every committed
//! batch since a sequence number and replays it against its own copy
//! of the same database.
//!
//! rocksdb already keeps this log for us; there is no bespoke change
//! feed to maintain. `DB::get_updates_since` returns exactly the
//! `(sequenceNumber, opaqueWriteBatchBytes)` pairs spec §4.7 asks for,
//! so this module is a thin, typed wrapper around it rather than a
//! reimplementation.

use rocksdb::{WriteBatch, DB};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One committed batch, identified by the sequence number of its last
/// write. `batch_bytes` is opaque to everything except `apply`: callers
/// must not inspect or reorder it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub sequence_number: u64,
    #[serde(with = "base64_bytes")]
    pub batch_bytes: Vec<u8>,
}

pub fn updates_since(db: &DB, since: u64) -> Result<Vec<Update>> {
    let mut out = Vec::new();
    let iter = db.get_updates_since(since + 1)?;
    for item in iter {
        let (sequence_number, batch) = item?;
        out.push(Update {
            sequence_number,
            batch_bytes: batch.data().to_vec(),
        });
    }
    Ok(out)
}

/// Applies a batch pulled from a primary's replication feed. Used by a
/// secondary collection that is not itself accepting direct writes
/// (spec §5 "secondary" role).
pub fn apply(db: &DB, update: &Update) -> Result<()> {
    let batch = WriteBatch::from_data(&update.batch_bytes);
    db.write(batch)?;
    Ok(())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;
    use crate::record::Capture;

    #[test]
    fn replays_onto_a_fresh_database() {
        let primary_dir = tempfile::tempdir().unwrap();
        let primary = Index::open(primary_dir.path()).unwrap();

        let baseline = primary.latest_sequence_number();

        let mut batch = primary.begin_update();
        batch
            .put_capture(&Capture::new(
                "com,example,:80:http:/".to_string(),
                1,
                "http://example.com/".to_string(),
            ))
            .unwrap();
        batch.commit().unwrap();

        let updates = primary.updates_since(baseline).unwrap();
        assert_eq!(updates.len(), 1);

        let secondary_dir = tempfile::tempdir().unwrap();
        let secondary = Index::open(secondary_dir.path()).unwrap();
        for update in &updates {
            apply(&secondary.db, update).unwrap();
        }

        let replayed: Vec<_> = secondary
            .scan_prefix(b"com,example,")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(replayed.len(), 1);
    }

    #[test]
    fn update_round_trips_through_base64_json() {
        let update = Update {
            sequence_number: 42,
            batch_bytes: vec![1, 2, 3, 255, 0],
        };
        let json = serde_json::to_string(&update).unwrap();
        let decoded: Update = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.sequence_number, 42);
        assert_eq!(decoded.batch_bytes, vec![1, 2, 3, 255, 0]);
    }
}
