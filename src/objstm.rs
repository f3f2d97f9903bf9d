//! Object streams (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs several non-stream objects into
//! one compressed stream:
//! ```text
//! 5 0 obj
//! << /Type /ObjStm /N 2 /First 9 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15          % pairs: (object number, offset after /First)
//! << /Type /Page >>   % object 10
//! [ 1 2 3 ]           % object 11
//! endstream
//! ```

use crate::decoders::decode_chain;
use crate::error::{Error, Result};
use crate::lexer::{Token, token};
use crate::object::{Object, decode_params_at, filter_names};
use crate::parser::parse_object;
use std::collections::HashMap;

const MAX_OBJECTS: i64 = 1_000_000;
const MAX_FIRST: i64 = 10_000_000;

/// Objects of one object stream, in pair order.
#[derive(Debug, Clone, Default)]
pub struct ObjectStream {
    objects: Vec<(u32, Object)>,
    by_id: HashMap<u32, usize>,
}

impl ObjectStream {
    /// Object at position `index` of the pairs section.
    pub fn at(&self, index: usize) -> Option<(u32, &Object)> {
        self.objects.get(index).map(|(id, obj)| (*id, obj))
    }

    /// Object with number `id`, wherever it sits in the stream.
    pub fn get(&self, id: u32) -> Option<&Object> {
        self.by_id.get(&id).map(|&i| &self.objects[i].1)
    }

    /// Number of objects that parsed.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no object parsed.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate over `(object number, object)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Object)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }
}

/// Decode and split an object stream.
///
/// Objects that fail to parse are skipped with a warning; a broken header
/// (`/N`, `/First`, pairs section) fails the whole stream.
pub fn parse_object_stream(stream_obj: &Object) -> Result<ObjectStream> {
    let (dict, raw) = match stream_obj {
        Object::Stream { dict, data } => (dict, data),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    if let Some(type_name) = dict.get("Type").and_then(Object::as_name) {
        if type_name != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /Type /{}", type_name)));
        }
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;

    if !(0..=MAX_OBJECTS).contains(&n) {
        return Err(Error::InvalidPdf(format!("invalid object stream /N value: {}", n)));
    }
    if !(0..=MAX_FIRST).contains(&first) {
        return Err(Error::InvalidPdf(format!("invalid object stream /First value: {}", first)));
    }
    let first = first as usize;

    let filters = filter_names(dict);
    let params: Vec<_> = (0..filters.len()).map(|i| decode_params_at(dict, i)).collect();
    let decoded = decode_chain(raw, &filters, &params)?;

    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, expected at least {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_pairs(&decoded[..first], n as usize)?;
    let body = &decoded[first..];
    let mut stream = ObjectStream::default();

    for (id, offset) in pairs {
        let Some(obj_data) = body.get(offset..) else {
            log::warn!("object {} offset {} is beyond stream data length {}", id, offset, body.len());
            continue;
        };
        match parse_object(obj_data) {
            Ok((_, obj)) => {
                stream.by_id.entry(id).or_insert(stream.objects.len());
                stream.objects.push((id, obj));
            },
            Err(e) => log::warn!("failed to parse object {} from object stream: {:?}", id, e),
        }
    }

    Ok(stream)
}

/// Read the `(object number, offset)` pairs before `/First`.
fn parse_pairs(mut data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(4096));

    for i in 0..count {
        let (rest, id) = token(data).map_err(|_| pair_error(i))?;
        let (rest, offset) = token(rest).map_err(|_| pair_error(i))?;
        match (id, offset) {
            (Token::Integer(id), Token::Integer(offset)) if id >= 0 && offset >= 0 => {
                pairs.push((id as u32, offset as usize));
            },
            _ => return Err(pair_error(i)),
        }
        data = rest;
    }

    Ok(pairs)
}

fn pair_error(index: usize) -> Error {
    Error::ParseError {
        offset: 0,
        reason: format!("failed to parse object stream pair {}", index),
    }
}
