//! Cross-reference reading.
//!
//! Supports classical `xref` tables, cross-reference streams (PDF 1.5+),
//! hybrid files (`/XRefStm` in a table trailer) and `/Prev` chains left by
//! incremental updates. Every failure is reported as [`Error::XrefParse`] so
//! the loader knows to retry with a full-file scan.

use crate::decoders::decode_chain;
use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Dict, Object, decode_params_at, filter_names};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Maximum number of `/Prev` hops followed.
const MAX_PREV_CHAIN: usize = 100;

/// Largest subsection accepted from a table header.
const MAX_SUBSECTION: i64 = 10_000_000;

/// Location of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free or deleted object
    Free,
    /// Object stored at a byte offset
    Uncompressed {
        /// Byte offset of `N G obj`
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the `/Type /ObjStm` stream
        stream_id: u32,
        /// Index within that stream
        index: u32,
    },
}

/// Object number to location map plus the newest trailer dictionary.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dict,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an object number.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object numbers present in the table, sorted.
    pub fn object_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The trailer dictionary (the stream dictionary for xref streams).
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = trailer;
    }

    /// Fold in an older section: existing entries and trailer keys win.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        for (key, value) in older.trailer {
            self.trailer.entry(key).or_insert(value);
        }
    }
}

/// Offset announced by the last `startxref` in the final 2 KiB of the file.
pub fn find_startxref(data: &[u8]) -> Option<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let keyword = b"startxref";
    let pos = tail.windows(keyword.len()).rposition(|w| w == keyword)?;

    match token(&tail[pos + keyword.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Some(offset as usize),
        _ => None,
    }
}

fn xref_error(reason: impl Into<String>) -> Error {
    Error::XrefParse(reason.into())
}

/// Read the cross-reference section at `offset` and everything it chains to.
pub fn parse_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    let mut table = parse_section(data, offset, &mut visited)?;
    let mut next = prev_offset(table.trailer());
    // the newest section's own trailer must not re-trigger itself
    table.trailer.shift_remove("Prev");

    while let Some(prev) = next {
        if visited.len() > MAX_PREV_CHAIN {
            return Err(xref_error(format!("/Prev chain longer than {}", MAX_PREV_CHAIN)));
        }
        if visited.contains(&prev) {
            log::warn!("xref /Prev loop at offset {}, stopping", prev);
            break;
        }
        let older = parse_section(data, prev, &mut visited)?;
        next = prev_offset(older.trailer());
        table.merge_older(older);
    }

    table.trailer.shift_remove("Prev");
    log::debug!("cross-reference: {} entries", table.len());
    Ok(table)
}

fn prev_offset(trailer: &Dict) -> Option<usize> {
    trailer
        .get("Prev")
        .and_then(Object::as_integer)
        .filter(|&p| p >= 0)
        .map(|p| p as usize)
}

fn parse_section(data: &[u8], offset: usize, visited: &mut HashSet<usize>) -> Result<CrossRefTable> {
    visited.insert(offset);
    let section = data
        .get(offset..)
        .ok_or_else(|| xref_error(format!("offset {} beyond end of file ({})", offset, data.len())))?;

    match token(section) {
        Ok((rest, Token::Keyword(b"xref"))) => {
            let mut table = parse_table(rest)?;
            // hybrid-reference file: the stream supplements the table
            if let Some(stm) = table.trailer().get("XRefStm").and_then(Object::as_integer) {
                let stm = stm as usize;
                if !visited.contains(&stm) {
                    visited.insert(stm);
                    match parse_stream(data, stm) {
                        Ok(stream_table) => table.merge_older(stream_table),
                        Err(e) => log::warn!("ignoring unreadable /XRefStm at {}: {}", stm, e),
                    }
                }
            }
            Ok(table)
        },
        Ok((_, Token::Integer(_))) => parse_stream(data, offset),
        _ => Err(xref_error(format!("no xref table or stream at offset {}", offset))),
    }
}

/// Parse the subsections after the `xref` keyword and the trailer after them.
fn parse_table(mut input: &[u8]) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();

    loop {
        let (rest, tok) = token(input).map_err(|_| xref_error("truncated xref table"))?;
        match tok {
            Token::Keyword(b"trailer") => {
                let (_, trailer) =
                    parse_object(rest).map_err(|_| xref_error("unreadable trailer dictionary"))?;
                match trailer {
                    Object::Dictionary(dict) => table.set_trailer(dict),
                    other => return Err(xref_error(format!("trailer is a {}", other.type_name()))),
                }
                return Ok(table);
            },
            Token::Integer(start) => {
                let (rest, count) = match token(rest) {
                    Ok((rest, Token::Integer(count))) => (rest, count),
                    _ => return Err(xref_error("subsection header without count")),
                };
                input = parse_entries(rest, subsection_ids(start, count)?, &mut table)?;
            },
            _ => return Err(xref_error("unexpected token in xref table")),
        }
    }
}

/// Object numbers covered by a `start count` subsection header.
fn subsection_ids(start: i64, count: i64) -> Result<Range<u32>> {
    let bad = || xref_error(format!("bad subsection {} {}", start, count));
    if !(0..=MAX_SUBSECTION).contains(&count) {
        return Err(bad());
    }
    let first = u32::try_from(start).map_err(|_| bad())?;
    let end = u32::try_from(count)
        .ok()
        .and_then(|count| first.checked_add(count))
        .ok_or_else(bad)?;
    Ok(first..end)
}

fn parse_entries<'a>(mut input: &'a [u8], ids: Range<u32>, table: &mut CrossRefTable) -> Result<&'a [u8]> {
    for id in ids {
        let (rest, offset) = token(input).map_err(|_| xref_error("truncated xref entry"))?;
        let (rest, generation) = token(rest).map_err(|_| xref_error("truncated xref entry"))?;
        let (rest, kind) = token(rest).map_err(|_| xref_error("truncated xref entry"))?;

        let entry = match (offset, generation, kind) {
            (Token::Integer(offset), Token::Integer(generation), Token::Keyword(b"n"))
                if offset >= 0 && (0..=i64::from(u16::MAX)).contains(&generation) =>
            {
                XRefEntry::Uncompressed {
                    offset: offset as usize,
                    generation: generation as u16,
                }
            },
            (Token::Integer(_), Token::Integer(_), Token::Keyword(b"f")) => XRefEntry::Free,
            _ => return Err(xref_error(format!("malformed entry for object {}", id))),
        };

        // object 0 heads the free list and is never a real object
        if id != 0 {
            table.entries.entry(id).or_insert(entry);
        }
        input = rest;
    }
    Ok(input)
}

/// Parse a `/Type /XRef` stream object at `offset`.
fn parse_stream(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let input = data
        .get(offset..)
        .ok_or_else(|| xref_error(format!("xref stream offset {} out of range", offset)))?;
    let (_, object) = parse_indirect_object(input).map_err(|e| xref_error(e.to_string()))?;

    let (dict, raw) = match object {
        Object::Stream { dict, data } => (dict, data),
        other => return Err(xref_error(format!("xref stream is a {}", other.type_name()))),
    };
    if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(xref_error("stream at startxref is not /Type /XRef"));
    }

    let filters = filter_names(&dict);
    let params: Vec<_> = (0..filters.len()).map(|i| decode_params_at(&dict, i)).collect();
    let decoded = decode_chain(&raw, &filters, &params).map_err(|e| xref_error(e.to_string()))?;

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| w.iter().filter_map(Object::as_integer).map(|v| v.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(xref_error("invalid /W in xref stream"));
    }

    let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0).max(0);
    let ranges: Vec<(i64, i64)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| Some((pair.first()?.as_integer()?, pair.get(1)?.as_integer()?)))
            .collect(),
        None => vec![(0, size)],
    };

    let entry_len: usize = widths.iter().sum();
    if entry_len == 0 {
        return Err(xref_error("zero-width xref stream entries"));
    }
    let mut rows = decoded.chunks_exact(entry_len);
    let mut table = CrossRefTable::new();

    for (start, count) in ranges {
        for id in subsection_ids(start, count)? {
            let row = rows.next().ok_or_else(|| xref_error("truncated xref stream data"))?;
            let (kind, rest) = row.split_at(widths[0]);
            let (field2, field3) = rest.split_at(widths[1]);
            // a zero-width type field defaults to type 1
            let kind = if widths[0] == 0 { 1 } else { read_be(kind) };
            let field2 = read_be(field2);
            let field3 = read_be(field3);

            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: field2 as usize,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: field2 as u32,
                    index: field3 as u32,
                },
                // unknown types are references to null
                _ => XRefEntry::Free,
            };
            if id != 0 {
                table.entries.entry(id).or_insert(entry);
            }
        }
    }

    table.set_trailer(dict);
    Ok(table)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[u8] = b"xref\n0 3\n0000000000 65535 f \n0000000017 00000 n \n0000000081 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF\n";

    #[test]
    fn test_find_startxref() {
        assert_eq!(find_startxref(TABLE), Some(0));
        assert_eq!(find_startxref(b"%PDF-1.4 no trailer"), None);
        assert_eq!(find_startxref(b"startxref\r\n  1234\r%%EOF"), Some(1234));
    }

    #[test]
    fn test_parse_table_and_trailer() {
        let table = parse_xref(TABLE, 0).unwrap();
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 17,
                generation: 0
            })
        );
        assert!(table.get(0).is_none());
        assert_eq!(table.trailer().get("Size"), Some(&Object::Integer(3)));
    }

    #[test]
    fn test_multiple_subsections() {
        let data = b"xref\n0 1\n0000000000 65535 f\r\n4 2\r\n0000000100 00000 n\r\n0000000200 00001 f\r\ntrailer << /Size 6 >>";
        let table = parse_xref(data, 0).unwrap();
        assert_eq!(
            table.get(4),
            Some(&XRefEntry::Uncompressed {
                offset: 100,
                generation: 0
            })
        );
        assert_eq!(table.get(5), Some(&XRefEntry::Free));
    }

    #[test]
    fn test_bad_offset_is_xref_error() {
        assert!(matches!(parse_xref(TABLE, 5000), Err(Error::XrefParse(_))));
        assert!(matches!(parse_xref(b"garbage here", 0), Err(Error::XrefParse(_))));
    }

    #[test]
    fn test_malformed_entry_is_xref_error() {
        let data = b"xref\n0 2\n0000000000 65535 f \nBROKEN\ntrailer << >>";
        assert!(matches!(parse_xref(data, 0), Err(Error::XrefParse(_))));
    }

    #[test]
    fn test_subsection_past_object_number_range() {
        let data = b"xref\n4294967295 2\n0000000017 00000 n \n0000000081 00000 n \ntrailer << >>";
        assert!(matches!(parse_xref(data, 0), Err(Error::XrefParse(_))));

        let data = b"xref\n4294967296 1\n0000000017 00000 n \ntrailer << >>";
        assert!(matches!(parse_xref(data, 0), Err(Error::XrefParse(_))));

        // the last valid object number is still accepted
        let data = b"xref\n4294967294 1\n0000000017 00000 n \ntrailer << >>";
        let table = parse_xref(data, 0).unwrap();
        assert!(table.get(u32::MAX - 1).is_some());
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let older = b"xref\n0 2\n0000000000 65535 f \n0000000010 00000 n \ntrailer << /Size 2 /Info 9 0 R >>\n";
        let mut data = older.to_vec();
        let newer_offset = data.len();
        data.extend_from_slice(b"xref\n1 1\n0000000099 00000 n \ntrailer << /Size 2 /Prev 0 /Root 1 0 R >>\n");

        let table = parse_xref(&data, newer_offset).unwrap();
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 99,
                generation: 0
            })
        );
        assert!(table.trailer().contains_key("Root"));
        assert!(table.trailer().contains_key("Info"));
        assert!(!table.trailer().contains_key("Prev"));
    }

    #[test]
    fn test_prev_loop_terminates() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer << /Size 1 /Prev 0 >>\n";
        assert!(parse_xref(data, 0).is_ok());
    }

    #[test]
    fn test_xref_stream() {
        // W [1 2 1]: obj 1 at 15, obj 2 in stream 5 index 0
        let rows: Vec<u8> = vec![0, 0, 0, 0, 1, 0, 15, 0, 2, 0, 5, 0];
        let mut data = format!(
            "7 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .into_bytes();
        data.extend_from_slice(&rows);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let table = parse_xref(&data, 0).unwrap();
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: 15,
                generation: 0
            })
        );
        assert_eq!(
            table.get(2),
            Some(&XRefEntry::Compressed {
                stream_id: 5,
                index: 0
            })
        );
        assert!(table.trailer().contains_key("Root"));
    }
}
