//! PDF object parser.
//!
//! Combines lexer tokens into [`Object`]s by recursive descent. Composite
//! objects are bounded by [`MAX_NESTING`] so hostile inputs cannot exhaust
//! the stack.

use crate::error::{Error, Result};
use crate::lexer::{Token, skip_ws, token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Maximum array/dictionary nesting (ISO 32000-1, Annex C implementation limits).
pub const MAX_NESTING: usize = 100;

/// Decode escape sequences in a literal string body (ISO 32000-1, 7.3.4.2).
///
/// ```
/// # use pdf_assembler::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Section \\247 71.01"), b"Section \xa7 71.01");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let byte = raw[i];
        if byte == b'\r' {
            // Bare end-of-line markers read as a single LF.
            out.push(b'\n');
            i += if raw.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
            continue;
        }
        if byte != b'\\' || i + 1 >= raw.len() {
            out.push(byte);
            i += 1;
            continue;
        }

        let escaped = raw[i + 1];
        i += 2;
        match escaped {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            },
            // \( \) \\ and unknown escapes yield the character itself.
            other => out.push(other),
        }
    }

    out
}

/// Decode a hex string body. Whitespace is ignored, an odd final digit is
/// padded with 0.
///
/// ```
/// # use pdf_assembler::parser::decode_hex;
/// assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"901FA").unwrap(), vec![0x90, 0x1F, 0xA0]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .copied()
        .filter(|c| !c.is_ascii_whitespace() && *c != 0)
        .collect();

    let nibble = |c: u8| -> Result<u8> {
        (c as char)
            .to_digit(16)
            .map(|d| d as u8)
            .ok_or_else(|| Error::ParseError {
                offset: 0,
                reason: format!("invalid hex digit {:?}", c as char),
            })
    };

    digits
        .chunks(2)
        .map(|pair| {
            let high = nibble(pair[0])?;
            let low = match pair.get(1) {
                Some(&c) => nibble(c)?,
                None => 0,
            };
            Ok(high << 4 | low)
        })
        .collect()
}

fn nom_error(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Parse one PDF object.
///
/// `N G R` sequences become [`Object::Reference`]; a dictionary followed by
/// `stream` becomes [`Object::Stream`] with its bytes sliced using `/Length`
/// (or a scan for `endstream` when the length is indirect or wrong).
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, 0)
}

fn parse_nested(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (rest, tok) = token(input)?;
    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => Err(nom_error(input, nom::error::ErrorKind::HexDigit)),
        },
        Token::Integer(i) => {
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if (0..=i64::from(u32::MAX)).contains(&i) && (0..=i64::from(u16::MAX)).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::ArrayStart => parse_array(rest, depth),
        Token::DictStart => {
            let (rest, dict) = parse_dictionary(rest, depth)?;
            match token(rest) {
                Ok((after_kw, Token::StreamStart)) => {
                    let (rest, data) = parse_stream_data(after_kw, &dict)?;
                    Ok((
                        rest,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::from(data),
                        },
                    ))
                },
                _ => Ok((rest, Object::Dictionary(dict))),
            }
        },
        _ => Err(nom_error(input, nom::error::ErrorKind::Tag)),
    }
}

fn parse_array(mut input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        if skip_ws(input).is_empty() {
            return Err(nom_error(input, nom::error::ErrorKind::Eof));
        }
        let (rest, item) = parse_nested(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dictionary(mut input: &[u8], depth: usize) -> IResult<&[u8], Dict> {
    let mut dict = Dict::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_nested(rest, depth + 1)?;
                // A null value is equivalent to the key being absent.
                if !value.is_null() {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => return Err(nom_error(input, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Slice the bytes between `stream` and `endstream`.
///
/// The keyword must be followed by CRLF or LF; a lone CR is tolerated.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dict) -> IResult<&'a [u8], Vec<u8>> {
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        if length >= 0 && (length as usize) <= body.len() {
            let length = length as usize;
            if let Ok((rest, Token::StreamEnd)) = token(&body[length..]) {
                return Ok((rest, body[..length].to_vec()));
            }
        }
        log::debug!("stream /Length {} does not land on endstream, scanning", length);
    }

    match find_keyword(body, b"endstream") {
        Some(end) => {
            let mut data = &body[..end];
            if data.ends_with(b"\r\n") {
                data = &data[..data.len() - 2];
            } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
                data = &data[..data.len() - 1];
            }
            Ok((&body[end + b"endstream".len()..], data.to_vec()))
        },
        None => Err(nom_error(input, nom::error::ErrorKind::Eof)),
    }
}

/// Position of the first occurrence of `keyword` in `input`.
pub fn find_keyword(input: &[u8], keyword: &[u8]) -> Option<usize> {
    input.windows(keyword.len()).position(|window| window == keyword)
}

/// Parse an indirect object definition `N G obj <object> endobj`.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> Result<(ObjectRef, Object)> {
    let header_error = |reason: &str| Error::ParseError {
        offset: 0,
        reason: reason.to_string(),
    };

    let (rest, id) = token(input).map_err(|_| header_error("missing object number"))?;
    let (rest, gen) = token(rest).map_err(|_| header_error("missing generation number"))?;
    let (rest, kw) = token(rest).map_err(|_| header_error("missing obj keyword"))?;

    let reference = match (id, gen, kw) {
        (Token::Integer(id), Token::Integer(gen), Token::ObjStart) if id >= 0 && gen >= 0 => {
            ObjectRef::new(id as u32, gen as u16)
        },
        _ => return Err(header_error("expected 'N G obj'")),
    };

    let (_, object) = parse_object(rest).map_err(|e| Error::ParseError {
        offset: 0,
        reason: format!("object {}: {}", reference, e),
    })?;

    Ok((reference, object))
}
