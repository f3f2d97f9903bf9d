//! Text strings as stored in PDF dictionaries.
//!
//! Text that fits in single bytes outside the range where PDFDocEncoding
//! and Latin-1 disagree is stored as is; anything else becomes UTF-16BE
//! with a byte-order mark.

const UTF16_BOM: [u8; 2] = [0xFE, 0xFF];
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Characters whose byte value means the same in PDFDocEncoding and Latin-1.
fn is_single_byte(ch: char) -> bool {
    matches!(u32::from(ch), 0x09 | 0x0A | 0x0D | 0x20..=0x7E | 0xA1..=0xFF)
}

/// Encode text for a PDF string value.
///
/// ```
/// use pdf_assembler::text_string::encode_text_string;
///
/// assert_eq!(encode_text_string("caf\u{e9}"), b"caf\xE9");
/// assert_eq!(encode_text_string("\u{3b1}"), [0xFE, 0xFF, 0x03, 0xB1]);
/// ```
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.chars().all(is_single_byte) {
        return text.chars().map(|ch| u32::from(ch) as u8).collect();
    }
    let mut out = UTF16_BOM.to_vec();
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Decode a PDF string value to text.
///
/// UTF-16BE and UTF-8 are recognized by their byte-order marks; everything
/// else is read one byte per character.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&UTF16_BOM) {
        let units: Vec<u16> = body
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(body) = bytes.strip_prefix(&UTF8_BOM) {
        return String::from_utf8_lossy(body).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}
