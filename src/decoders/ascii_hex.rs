//! ASCIIHexDecode implementation.
//!
//! Pairs of hex digits become bytes, whitespace is skipped and `>` ends the
//! data. An odd final digit is padded with 0.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::{Error, Result};

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8], _params: Option<&DecodeParams>) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut pending: Option<u8> = None;

        for &byte in input {
            if byte == b'>' {
                break;
            }
            if byte.is_ascii_whitespace() || byte == 0 {
                continue;
            }
            let nibble = (byte as char).to_digit(16).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: invalid character 0x{:02x}", byte))
            })? as u8;

            match pending.take() {
                Some(high) => output.push(high << 4 | nibble),
                None => pending = Some(nibble),
            }
        }

        if let Some(high) = pending {
            output.push(high << 4);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}
