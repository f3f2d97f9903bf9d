//! Cross-reference reconstruction for damaged files.
//!
//! Used only in recovery mode: the whole file is scanned for `N G obj`
//! headers, object streams found along the way are indexed, and a trailer
//! is recovered from `trailer` keywords, xref stream dictionaries or, as a
//! last resort, by locating the `/Type /Catalog` object.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{parse_indirect_object, parse_object};
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    static ref RE_OBJ_PATTERN: Regex = Regex::new(r"(\d+)\s+(\d+)\s+obj").expect("valid regex");
    static ref RE_TRAILER: Regex = Regex::new(r"trailer\s*<<").expect("valid regex");
}

/// Rebuild a cross-reference table from raw file bytes.
///
/// When an object number is defined more than once the definition that
/// appears later in the file wins, matching incremental-update semantics.
pub fn reconstruct_xref(data: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning {} bytes", data.len());

    let mut xref = CrossRefTable::new();
    let mut offsets = Vec::new();

    for capture in RE_OBJ_PATTERN.captures_iter(data) {
        let Some(full) = capture.get(0) else { continue };
        let number = |i: usize| {
            capture
                .get(i)
                .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
                .and_then(|s| s.parse::<u64>().ok())
        };
        let (Some(id), Some(generation)) = (number(1), number(2)) else {
            continue;
        };
        let (Ok(id), Ok(generation)) = (u32::try_from(id), u16::try_from(generation)) else {
            continue;
        };

        // "N G obj" must be followed by something that can start an object
        let after = crate::lexer::skip_ws(&data[full.end()..]);
        let plausible = after.first().map_or(false, |&b| {
            matches!(b, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.')
                || b.is_ascii_digit()
        });
        if !plausible {
            log::debug!("skipping false object header at offset {}", full.start());
            continue;
        }
        // the header must not be the tail of a longer number
        if full.start() > 0 && data[full.start() - 1].is_ascii_digit() {
            continue;
        }

        xref.insert(
            id,
            XRefEntry::Uncompressed {
                offset: full.start(),
                generation,
            },
        );
        offsets.push((id, full.start()));
    }

    if offsets.is_empty() {
        return Err(Error::InvalidPdf("No objects found during xref reconstruction".to_string()));
    }
    log::info!("Reconstructed xref with {} object headers", offsets.len());

    let mut xref_stream_trailers = Vec::new();
    for &(id, offset) in &offsets {
        let Ok((_, object)) = parse_indirect_object(&data[offset..]) else {
            continue;
        };
        match object.as_dict().and_then(|d| d.get("Type")).and_then(Object::as_name) {
            Some("ObjStm") => index_object_stream(&mut xref, id, &object),
            Some("XRef") => {
                if let Some(dict) = object.as_dict() {
                    xref_stream_trailers.push(dict.clone());
                }
            },
            _ => {},
        }
    }

    let trailer = find_trailer(data, &xref, xref_stream_trailers)?;
    xref.set_trailer(trailer);
    Ok(xref)
}

fn index_object_stream(xref: &mut CrossRefTable, stream_id: u32, object: &Object) {
    match parse_object_stream(object) {
        Ok(stream) => {
            for (index, (id, _)) in stream.iter().enumerate() {
                if xref.get(id).is_none() {
                    xref.insert(
                        id,
                        XRefEntry::Compressed {
                            stream_id,
                            index: index as u32,
                        },
                    );
                }
            }
        },
        Err(e) => log::warn!("unreadable object stream {} during recovery: {}", stream_id, e),
    }
}

/// Pick the newest trailer whose `/Root` points at a known object.
fn find_trailer(data: &[u8], xref: &CrossRefTable, xref_stream_trailers: Vec<Dict>) -> Result<Dict> {
    let mut candidates: Vec<Dict> = RE_TRAILER
        .find_iter(data)
        .filter_map(|m| {
            let dict_start = m.end() - 2;
            match parse_object(&data[dict_start..]) {
                Ok((_, Object::Dictionary(dict))) => Some(dict),
                _ => {
                    log::warn!("unreadable trailer dictionary at offset {}", m.start());
                    None
                },
            }
        })
        .collect();
    candidates.extend(xref_stream_trailers);

    for trailer in candidates.into_iter().rev() {
        let root = trailer.get("Root").and_then(Object::as_reference);
        if root.map_or(false, |r| is_catalog(data, xref, r)) {
            return Ok(trailer);
        }
    }

    log::info!("no usable trailer found, reconstructing a minimal one");
    reconstruct_minimal_trailer(data, xref)
}

fn load_object(data: &[u8], xref: &CrossRefTable, id: u32) -> Option<Object> {
    match xref.get(id)? {
        XRefEntry::Uncompressed { offset, .. } => {
            parse_indirect_object(data.get(*offset..)?).ok().map(|(_, obj)| obj)
        },
        _ => None,
    }
}

fn is_catalog(data: &[u8], xref: &CrossRefTable, reference: ObjectRef) -> bool {
    load_object(data, xref, reference.id)
        .as_ref()
        .and_then(Object::as_dict)
        .and_then(|d| d.get("Type"))
        .and_then(Object::as_name)
        == Some("Catalog")
}

/// Trailer containing just `/Root` (and `/Size`), for files whose trailers are all unusable.
fn reconstruct_minimal_trailer(data: &[u8], xref: &CrossRefTable) -> Result<Dict> {
    let ids = xref.object_ids();
    // prefer the newest catalog, as incremental updates append new ones
    let catalog = ids.iter().rev().copied().find_map(|id| {
        let generation = match xref.get(id)? {
            XRefEntry::Uncompressed { generation, .. } => *generation,
            _ => return None,
        };
        let reference = ObjectRef::new(id, generation);
        is_catalog(data, xref, reference).then_some(reference)
    });

    let Some(catalog) = catalog else {
        return Err(Error::InvalidPdf("Could not find catalog in reconstructed xref".to_string()));
    };
    log::info!("found catalog at {}", catalog);

    let mut trailer = Dict::new();
    trailer.insert("Root".to_string(), Object::Reference(catalog));
    let size = ids.last().map_or(1, |&max| i64::from(max) + 1);
    trailer.insert("Size".to_string(), Object::Integer(size));
    Ok(trailer)
}
