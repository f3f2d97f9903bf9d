//! ASCII85Decode implementation.
//!
//! Five characters in `!`..=`u` encode four bytes; `z` stands for four zero
//! bytes and `~>` ends the data.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::{Error, Result};

/// ASCII85Decode filter implementation.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8], _params: Option<&DecodeParams>) -> Result<Vec<u8>> {
        let body = input.strip_prefix(b"<~").unwrap_or(input);
        let mut output = Vec::with_capacity(body.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut count = 0;

        for &byte in body {
            match byte {
                b'~' => break,
                b'z' if count == 0 => output.extend_from_slice(&[0; 4]),
                b'!'..=b'u' => {
                    group[count] = byte - b'!';
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&group_value(&group)?.to_be_bytes());
                        count = 0;
                    }
                },
                c if c.is_ascii_whitespace() || c == 0 => {},
                other => {
                    return Err(Error::Decode(format!(
                        "ASCII85Decode: invalid character 0x{:02x}",
                        other
                    )));
                },
            }
        }

        match count {
            0 => {},
            1 => return Err(Error::Decode("ASCII85Decode: dangling final character".to_string())),
            n => {
                // pad with 'u' and keep n-1 bytes
                group[n..].fill(84);
                let bytes = group_value(&group)?.to_be_bytes();
                output.extend_from_slice(&bytes[..n - 1]);
            },
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn group_value(digits: &[u8; 5]) -> Result<u32> {
    digits
        .iter()
        .try_fold(0u32, |acc, &d| acc.checked_mul(85)?.checked_add(u32::from(d)))
        .ok_or_else(|| Error::Decode("ASCII85Decode: group overflow".to_string()))
}
