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

//! Rendering a page of captures as CDX text, JSON, or OpenWayback-style
//! XML, with the `fl=` field subsetting the HTTP surface exposes.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::error::Result;
use crate::record::Capture;

pub const ALL_FIELDS: &[&str] = &[
    "urlkey",
    "timestamp",
    "original",
    "mimetype",
    "statuscode",
    "digest",
    "redirecturl",
    "robotflags",
    "length",
    "offset",
    "filename",
];

pub fn field_value(capture: &Capture, field: &str) -> String {
    match field {
        "urlkey" => capture.url_key.clone(),
        "timestamp" => capture.timestamp.to_string(),
        "original" => capture.original_url.clone(),
        "mimetype" => capture.mime_type.clone(),
        "statuscode" => capture.status.to_string(),
        "digest" => capture.digest.clone(),
        "redirecturl" => capture.redirect_url.clone(),
        "robotflags" => capture.robot_flags.clone(),
        "length" => capture.length.to_string(),
        "offset" => capture.offset.to_string(),
        "filename" => capture.file.clone(),
        _ => "-".to_string(),
    }
}

fn fields_or_default(fields: Option<&[String]>) -> Vec<String> {
    match fields {
        Some(f) if !f.is_empty() => f.to_vec(),
        _ => ALL_FIELDS.iter().map(|s| s.to_string()).collect(),
    }
}

/// The legacy whitespace-separated CDX line format, one capture per
/// line, fields in `fl` order (or the full 11-field order by default).
pub fn to_text(captures: &[Capture], fields: Option<&[String]>) -> String {
    let fields = fields_or_default(fields);
    let mut out = String::new();
    for capture in captures {
        let line: Vec<String> = fields.iter().map(|f| field_value(capture, f)).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// One JSON array per capture (CDXJ-adjacent, not a full object), the
/// conventional CDX server JSON rendering: `[["urlkey", ...], [...]]`.
pub fn to_json(captures: &[Capture], fields: Option<&[String]>) -> Result<String> {
    let fields = fields_or_default(fields);
    let mut rows: Vec<Vec<String>> = vec![fields.clone()];
    for capture in captures {
        rows.push(fields.iter().map(|f| field_value(capture, f)).collect());
    }
    Ok(serde_json::to_string(&rows)?)
}

/// A minimal OpenWayback-compatible `<result>` XML document.
pub fn to_xml(captures: &[Capture], fields: Option<&[String]>) -> Result<String> {
    let fields = fields_or_default(fields);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Start(BytesStart::new("wayback")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("results")))
        .map_err(xml_err)?;

    for capture in captures {
        writer
            .write_event(Event::Start(BytesStart::new("result")))
            .map_err(xml_err)?;
        for field in &fields {
            writer
                .write_event(Event::Start(BytesStart::new(field.as_str())))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(&field_value(capture, field))))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(field.as_str())))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("result")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("results")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("wayback")))
        .map_err(xml_err)?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| crate::error::Error::CorruptRecord(e.to_string()))
}

fn xml_err(e: quick_xml::Error) -> crate::error::Error {
    crate::error::Error::CorruptRecord(format!("xml encode error: {e}"))
}
