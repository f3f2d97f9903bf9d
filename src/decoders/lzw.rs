//! LZWDecode implementation (ISO 32000-1, 7.4.4).
//!
//! PDF LZW reads codes MSB-first starting at 9 bits, with clear code 256 and
//! end-of-data code 257. With `/EarlyChange 1` (the default) the code width
//! grows one code early, which is what weezl calls the TIFF size switch.
//! Streams that weezl rejects (typically a missing end-of-data code) go
//! through a small table decoder that stops at the end of input.

use crate::decoders::{DecodeParams, StreamDecoder, decode_predictor};
use crate::error::{Error, Result};
use weezl::{BitOrder, decode::Decoder};

/// LZWDecode filter implementation.
pub struct LzwDecoder;

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
        let early_change = params.map_or(true, |p| p.early_change);
        let decoded = match decode_weezl(input, early_change) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("weezl LZW decode failed ({}), using table decoder", e);
                decode_table(input, early_change)?
            },
        };

        match params {
            Some(params) if params.predictor > 1 => decode_predictor(&decoded, params),
            _ => Ok(decoded),
        }
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

fn decode_weezl(input: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut decoder = if early_change {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    decoder
        .decode(input)
        .map_err(|e| Error::Decode(format!("LZWDecode: {:?}", e)))
}

const CLEAR: usize = 256;
const EOD: usize = 257;

fn decode_table(input: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    table.push(Vec::new());
    table.push(Vec::new());

    let mut output = Vec::new();
    let mut width = 9u32;
    let mut previous: Option<usize> = None;
    let mut bit_buffer = 0u32;
    let mut bit_count = 0u32;
    let mut bytes = input.iter();

    loop {
        while bit_count < width {
            match bytes.next() {
                Some(&b) => {
                    bit_buffer = (bit_buffer << 8) | u32::from(b);
                    bit_count += 8;
                },
                None => return Ok(output),
            }
        }
        bit_count -= width;
        let code = ((bit_buffer >> bit_count) & ((1 << width) - 1)) as usize;

        match code {
            CLEAR => {
                table.truncate(258);
                width = 9;
                previous = None;
                continue;
            },
            EOD => return Ok(output),
            _ => {},
        }

        let entry = match (table.get(code), previous) {
            (Some(entry), _) if code < 256 || code > EOD => entry.clone(),
            (None, Some(prev)) if code == table.len() => {
                let mut entry = table[prev].clone();
                entry.push(table[prev][0]);
                entry
            },
            _ => return Err(Error::Decode(format!("LZWDecode: invalid code {}", code))),
        };

        output.extend_from_slice(&entry);
        if let Some(prev) = previous {
            if table.len() < 4096 {
                let mut added = table[prev].clone();
                added.push(entry[0]);
                table.push(added);
            }
        }
        previous = Some(code);

        let threshold = table.len() + usize::from(early_change);
        if threshold >= (1 << width) && width < 12 {
            width += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(data: &[u8]) -> Vec<u8> {
        weezl::encode::Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .encode(data)
            .unwrap()
    }

    #[test]
    fn test_weezl_roundtrip() {
        let text = b"-----A---B-----A---B-----A---B".repeat(20);
        let decoded = LzwDecoder.decode(&encode(&text), None).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_table_decoder_matches_weezl() {
        let text = b"TOBEORNOTTOBEORTOBEORNOT".repeat(40);
        assert_eq!(decode_table(&encode(&text), true).unwrap(), text);
    }

    #[test]
    fn test_table_decoder_without_eod() {
        // 9-bit codes: clear(256), 'A'(65), 'B'(66), no end-of-data
        let codes = [256u32, 65, 66];
        let mut bits = 0u64;
        for code in codes {
            bits = (bits << 9) | u64::from(code);
        }
        bits <<= 64 - 27;
        let bytes: Vec<u8> = bits.to_be_bytes()[..4].to_vec();
        assert_eq!(decode_table(&bytes, true).unwrap(), b"AB");
    }
}
