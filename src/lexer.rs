//! PDF lexer (tokenizer).
//!
//! Splits raw PDF bytes into tokens: numbers, strings, names, delimiters and
//! keywords. Whitespace (space, \t, \r, \n, \0, \f) and comments (`%` to end
//! of line) are skipped before every token.
//!
//! The lexer does not decode string escapes; the parser does that once it
//! knows which kind of string it holds. Name `#xx` escapes are decoded here.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize},
    sequence::{delimited, pair, preceded, tuple},
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Raw content of a literal string, escapes still encoded
    LiteralString(&'a [u8]),
    /// Raw content of a hexadecimal string, whitespace included
    HexString(&'a [u8]),
    /// Name with `#xx` escapes decoded, without the leading `/`
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` (used in "10 0 R")
    R,
    /// Any other bare word (`xref`, `trailer`, `startxref`, ...)
    Keyword(&'a [u8]),
}

/// PDF whitespace characters (ISO 32000-1, Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (ISO 32000-1, Table 2).
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Regular characters are everything that is neither whitespace nor a delimiter.
pub fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(input)
}

/// Skip all whitespace and comments, returning the remaining input.
pub fn skip_ws(mut input: &[u8]) -> &[u8] {
    loop {
        let (rest, _) = take_while::<_, _, nom::error::Error<&[u8]>>(is_whitespace)(input)
            .unwrap_or((input, &[][..]));
        match comment(rest) {
            Ok((after_comment, _)) => input = after_comment,
            Err(_) => return rest,
        }
    }
}

fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    let fail = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));
    let text = std::str::from_utf8(text).map_err(|_| fail())?;

    if !text.contains('.') {
        if let Ok(value) = text.parse::<i64>() {
            return Ok((rest, Token::Integer(value)));
        }
    }
    // Integers too large for i64 degrade to reals, as most readers do.
    let value: f64 = text.parse().map_err(|_| fail())?;
    Ok((rest, Token::Real(value)))
}

/// Literal strings may nest balanced parentheses; `\` escapes the next byte.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#xx` escape sequences in a raw name.
///
/// Invalid sequences are kept literally. Each decoded byte becomes one
/// Latin-1 character so the name is written back byte for byte.
///
/// ```
/// # use pdf_assembler::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                bytes.push(byte);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }

    bytes.iter().map(|&b| b as char).collect()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |raw: &[u8]| Token::Name(decode_name_escapes(raw))),
    )(input)
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        map(tag(b"<<"), |_| Token::DictStart),
        map(tag(b">>"), |_| Token::DictEnd),
        map(tag(b"["), |_| Token::ArrayStart),
        map(tag(b"]"), |_| Token::ArrayEnd),
    ))(input)
}

/// Bare words. Matching the whole run of regular characters keeps
/// `nullx` from lexing as `null` followed by `x`.
fn parse_word(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(is_regular), |word: &[u8]| match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        other => Token::Keyword(other),
    })(input)
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((
        parse_delimiter,
        parse_name,
        parse_literal_string,
        parse_hex_string,
        parse_number,
        parse_word,
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+17 "), Ok((&b" "[..], Token::Integer(17))));
    }

    #[test]
    fn test_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
    }

    #[test]
    fn test_literal_string_nesting_and_escapes() {
        assert_eq!(
            token(b"(Hello (nested) World)"),
            Ok((&b""[..], Token::LiteralString(b"Hello (nested) World")))
        );
        assert_eq!(token(b"(a\\)b)"), Ok((&b""[..], Token::LiteralString(b"a\\)b"))));
        assert_eq!(token(b"()"), Ok((&b""[..], Token::LiteralString(b""))));
        assert!(token(b"(unterminated").is_err());
    }

    #[test]
    fn test_hex_string_vs_dict() {
        assert_eq!(token(b"<48 65>"), Ok((&b""[..], Token::HexString(b"48 65"))));
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
    }

    #[test]
    fn test_names() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/Type/Page"), Ok((&b"/Page"[..], Token::Name("Type".to_string()))));
        assert_eq!(token(b"/ "), Ok((&b" "[..], Token::Name(String::new()))));
    }

    #[test]
    fn test_name_latin1() {
        assert_eq!(decode_name_escapes(b"caf#E9"), "caf\u{e9}");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"null]"), Ok((&b"]"[..], Token::Null)));
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
        assert_eq!(token(b"R"), Ok((&b""[..], Token::R)));
        assert_eq!(token(b"xref"), Ok((&b""[..], Token::Keyword(b"xref"))));
        assert_eq!(token(b"nullx"), Ok((&b""[..], Token::Keyword(b"nullx"))));
    }

    #[test]
    fn test_skip_comments_and_whitespace() {
        assert_eq!(token(b"  % comment\n\r 7"), Ok((&b""[..], Token::Integer(7))));
        assert_eq!(skip_ws(b"%a\n%b\n  x"), b"x");
    }

    #[test]
    fn test_reference_sequence() {
        let (rest, a) = token(b"10 0 R").unwrap();
        let (rest, b) = token(rest).unwrap();
        let (rest, c) = token(rest).unwrap();
        assert_eq!((a, b, c), (Token::Integer(10), Token::Integer(0), Token::R));
        assert!(rest.is_empty());
    }
}
