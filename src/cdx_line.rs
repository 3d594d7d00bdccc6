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

//! The legacy CDX ingest line format (spec §6 "Ingest format"): one
//! whitespace-separated record per line, an optional ` CDX ...` legend
//! line, and `@alias <from> <to>` directives.

use crate::canon;
use crate::error::{Error, Result};
use crate::record::{Alias, Capture};

const FIELD_COUNT: usize = 11;

#[derive(Debug, Clone)]
pub enum IngestItem {
    Capture(Capture),
    Alias(Alias),
}

/// Parses one ingest line. Returns `Ok(None)` for a blank line or a
/// ` CDX` legend header, both of which are silently skipped rather than
/// counted as errors.
pub fn parse_line(line: &str, lineno: usize) -> Result<Option<IngestItem>> {
    let trimmed = line.trim_end_matches(['\n', '\r']);

    if trimmed.trim().is_empty() {
        return Ok(None);
    }
    if trimmed.trim_start().starts_with("CDX") || trimmed.starts_with(" CDX") {
        return Ok(None);
    }
    if let Some(rest) = trimmed.strip_prefix("@alias ") {
        return parse_alias(rest, trimmed, lineno).map(Some);
    }

    parse_capture(trimmed, lineno).map(Some)
}

fn parse_alias(rest: &str, raw: &str, lineno: usize) -> Result<IngestItem> {
    let mut parts = rest.split_whitespace();
    let alias_url = parts.next().ok_or_else(|| Error::BadCdxLine {
        line: raw.to_string(),
        lineno,
        reason: "@alias missing source url".to_string(),
    })?;
    let target_url = parts.next().ok_or_else(|| Error::BadCdxLine {
        line: raw.to_string(),
        lineno,
        reason: "@alias missing target url".to_string(),
    })?;

    let alias_surt = canon::to_ssurt(alias_url).map_err(|_| Error::BadCdxLine {
        line: raw.to_string(),
        lineno,
        reason: format!("bad alias source url {alias_url}"),
    })?;
    let target_surt = canon::to_ssurt(target_url).map_err(|_| Error::BadCdxLine {
        line: raw.to_string(),
        lineno,
        reason: format!("bad alias target url {target_url}"),
    })?;

    Ok(IngestItem::Alias(Alias {
        alias_surt,
        target_surt,
    }))
}

fn parse_capture(line: &str, lineno: usize) -> Result<IngestItem> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIELD_COUNT {
        return Err(Error::BadCdxLine {
            line: line.to_string(),
            lineno,
            reason: format!("expected {FIELD_COUNT} fields, got {}", fields.len()),
        });
    }

    let original_url = fields[2];
    let timestamp: u64 = fields[1].parse().map_err(|_| Error::BadCdxLine {
        line: line.to_string(),
        lineno,
        reason: format!("bad timestamp {}", fields[1]),
    })?;
    let status: u16 = match fields[4] {
        "-" => 0,
        s => s.parse().map_err(|_| Error::BadCdxLine {
            line: line.to_string(),
            lineno,
            reason: format!("bad status {s}"),
        })?,
    };
    let length: u64 = match fields[8] {
        "-" => 0,
        s => s.parse().map_err(|_| Error::BadCdxLine {
            line: line.to_string(),
            lineno,
            reason: format!("bad length {s}"),
        })?,
    };
    let offset: u64 = match fields[9] {
        "-" => 0,
        s => s.parse().map_err(|_| Error::BadCdxLine {
            line: line.to_string(),
            lineno,
            reason: format!("bad offset {s}"),
        })?,
    };

    // the urlkey column (fields[0]) is advisory only; the index is
    // always keyed on a freshly computed canonical key so a crawler
    // with a slightly different canonicalisation cannot desync the
    // sort order.
    let url_key = canon::to_ssurt(original_url).map_err(|_| Error::BadCdxLine {
        line: line.to_string(),
        lineno,
        reason: format!("bad original url {original_url}"),
    })?;

    Ok(IngestItem::Capture(Capture {
        url_key,
        timestamp,
        original_url: original_url.to_string(),
        mime_type: fields[3].to_string(),
        status,
        digest: fields[5].to_string(),
        redirect_url: fields[6].to_string(),
        robot_flags: fields[7].to_string(),
        length,
        offset,
        file: fields[10].to_string(),
    }))
}

/// Outcome of ingesting a whole batch of lines with `badLines=skip`
/// semantics (spec §6 supplement): malformed lines are counted rather
/// than aborting the whole request.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

pub fn parse_batch(body: &str, skip_bad_lines: bool) -> Result<(Vec<IngestItem>, IngestReport)> {
    let mut items = Vec::new();
    let mut report = IngestReport::default();

    for (i, line) in body.lines().enumerate() {
        let lineno = i + 1;
        match parse_line(line, lineno) {
            Ok(Some(item)) => {
                items.push(item);
                report.ingested += 1;
            }
            Ok(None) => {}
            Err(e) => {
                if skip_bad_lines {
                    report.skipped += 1;
                    report.errors.push(e.to_string());
                } else {
                    return Err(e);
                }
            }
        }
    }

    Ok((items, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legend_header_is_skipped() {
        assert!(parse_line(" CDX N b a m s k r M S V g", 1).unwrap().is_none());
    }

    #[test]
    fn blank_line_is_skipped() {
        assert!(parse_line("   ", 1).unwrap().is_none());
    }

    #[test]
    fn alias_directive_canonicalises_both_sides() {
        let item = parse_line("@alias http://old.example.com/ http://example.com/", 1)
            .unwrap()
            .unwrap();
        match item {
            IngestItem::Alias(alias) => {
                assert_eq!(alias.alias_surt, "com,old,example,:80:http:/");
                assert_eq!(alias.target_surt, "com,example,:80:http:/");
            }
            _ => panic!("expected alias"),
        }
    }

    #[test]
    fn well_formed_capture_line_parses() {
        let line = "com,example,)/ 20200101000000 http://example.com/ text/html 200 sha1:abc - - 1234 5678 example.warc.gz";
        let item = parse_line(line, 1).unwrap().unwrap();
        match item {
            IngestItem::Capture(c) => {
                assert_eq!(c.timestamp, 20_200_101_000_000);
                assert_eq!(c.url_key, "com,example,:80:http:/");
                assert_eq!(c.status, 200);
            }
            _ => panic!("expected capture"),
        }
    }

    #[test]
    fn malformed_line_reports_reason() {
        let err = parse_line("too few fields", 3).unwrap_err();
        match err {
            Error::BadCdxLine { lineno, .. } => assert_eq!(lineno, 3),
            _ => panic!("expected BadCdxLine"),
        }
    }

    #[test]
    fn skip_bad_lines_counts_instead_of_aborting() {
        let body = "bad line one\n@alias http://a.example.com/ http://b.example.com/\nbad line two";
        let (items, report) = parse_batch(body, true).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(report.ingested, 1);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn without_skip_first_bad_line_aborts_the_batch() {
        let body = "bad line one\n@alias http://a.example.com/ http://b.example.com/";
        assert!(parse_batch(body, false).is_err());
    }
}
