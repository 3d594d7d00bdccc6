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

//! Binary key/value encodings for `Capture` and `Alias` (spec §4.2).
//!
//! The big-endian timestamp suffix is the same trick the teacher's
//! webgraph edge store uses for its node-id keys: fixed-width
//! big-endian integers sort identically as bytes and as numbers, so a
//! rocksdb prefix iterator walks captures in timestamp order for free.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use super::Capture;
use crate::error::{Error, Result};

pub(crate) const KEY_SEPARATOR: u8 = 0x00;

pub fn encode_capture_key(url_key: &str, timestamp: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(url_key.len() + 1 + 8);
    out.extend_from_slice(url_key.as_bytes());
    out.push(KEY_SEPARATOR);
    out.write_u64::<BigEndian>(timestamp).expect("write to Vec never fails");
    out
}

pub fn decode_capture_key(key: &[u8]) -> Result<(String, u64)> {
    if key.len() < 9 {
        return Err(Error::CorruptRecord("capture key too short".to_string()));
    }
    let split_at = key.len() - 8;
    if key[split_at - 1] != KEY_SEPARATOR {
        return Err(Error::CorruptRecord(
            "capture key missing separator".to_string(),
        ));
    }
    let url_key = String::from_utf8(key[..split_at - 1].to_vec())
        .map_err(|e| Error::CorruptRecord(format!("capture key not utf8: {e}")))?;
    let timestamp = BigEndian::read_u64(&key[split_at..]);
    Ok((url_key, timestamp))
}

fn write_string(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    buf.write_u32::<BigEndian>(s.len() as u32)?;
    buf.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cursor
        .read_u32::<BigEndian>()
        .map_err(|e| Error::CorruptRecord(format!("truncated string length: {e}")))? as usize;
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|e| Error::CorruptRecord(format!("truncated string body: {e}")))?;
    String::from_utf8(buf).map_err(|e| Error::CorruptRecord(format!("value not utf8: {e}")))
}

/// Field order is part of the wire contract (spec §4.2): originalUrl,
/// status, mimeType, digest, redirectUrl, robotFlags, length, offset,
/// file. `url_key`/`timestamp` live only in the key, not the value.
pub fn encode_capture_value(capture: &Capture) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_string(&mut out, &capture.original_url)?;
    out.write_u16::<BigEndian>(capture.status)?;
    write_string(&mut out, &capture.mime_type)?;
    write_string(&mut out, &capture.digest)?;
    write_string(&mut out, &capture.redirect_url)?;
    write_string(&mut out, &capture.robot_flags)?;
    out.write_u64::<BigEndian>(capture.length)?;
    out.write_u64::<BigEndian>(capture.offset)?;
    write_string(&mut out, &capture.file)?;
    Ok(out)
}

pub fn decode_capture(key: &[u8], value: &[u8]) -> Result<Capture> {
    let (url_key, timestamp) = decode_capture_key(key)?;
    let mut cursor = Cursor::new(value);

    let original_url = read_string(&mut cursor)?;
    let status = cursor
        .read_u16::<BigEndian>()
        .map_err(|e| Error::CorruptRecord(format!("truncated status: {e}")))?;
    let mime_type = read_string(&mut cursor)?;
    let digest = read_string(&mut cursor)?;
    let redirect_url = read_string(&mut cursor)?;
    let robot_flags = read_string(&mut cursor)?;
    let length = cursor
        .read_u64::<BigEndian>()
        .map_err(|e| Error::CorruptRecord(format!("truncated length: {e}")))?;
    let offset = cursor
        .read_u64::<BigEndian>()
        .map_err(|e| Error::CorruptRecord(format!("truncated offset: {e}")))?;
    let file = read_string(&mut cursor)?;
    // trailing bytes are tolerated for forward compatibility.

    Ok(Capture {
        url_key,
        timestamp,
        original_url,
        mime_type,
        status,
        digest,
        redirect_url,
        robot_flags,
        length,
        offset,
        file,
    })
}

pub fn encode_alias_key(alias_surt: &str) -> Vec<u8> {
    alias_surt.as_bytes().to_vec()
}

pub fn encode_alias_value(target_surt: &str) -> Vec<u8> {
    target_surt.as_bytes().to_vec()
}

pub fn decode_alias(key: &[u8], value: &[u8]) -> Result<super::Alias> {
    let alias_surt = String::from_utf8(key.to_vec())
        .map_err(|e| Error::CorruptRecord(format!("alias key not utf8: {e}")))?;
    let target_surt = String::from_utf8(value.to_vec())
        .map_err(|e| Error::CorruptRecord(format!("alias value not utf8: {e}")))?;
    Ok(super::Alias {
        alias_surt,
        target_surt,
    })
}
