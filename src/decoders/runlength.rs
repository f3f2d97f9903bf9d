//! RunLengthDecode implementation.
//!
//! Length byte 0-127 copies the next N+1 bytes, 129-255 repeats the next
//! byte 257-N times, 128 ends the data.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::{Error, Result};

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8], _params: Option<&DecodeParams>) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 2);
        let mut rest = input;

        while let Some((&length, tail)) = rest.split_first() {
            match length {
                128 => break,
                0..=127 => {
                    let count = usize::from(length) + 1;
                    if tail.len() < count {
                        return Err(Error::Decode(format!(
                            "RunLengthDecode: literal run of {} with {} bytes left",
                            count,
                            tail.len()
                        )));
                    }
                    output.extend_from_slice(&tail[..count]);
                    rest = &tail[count..];
                },
                _ => {
                    let (&byte, tail) = tail
                        .split_first()
                        .ok_or_else(|| Error::Decode("RunLengthDecode: missing run byte".to_string()))?;
                    output.resize(output.len() + 257 - usize::from(length), byte);
                    rest = tail;
                },
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_repeat() {
        let data = [2, b'a', b'b', b'c', 254, b'x', 128, 0, b'z'];
        assert_eq!(RunLengthDecoder.decode(&data, None).unwrap(), b"abcxxx");
    }

    #[test]
    fn test_truncated_literal() {
        assert!(RunLengthDecoder.decode(&[5, b'a'], None).is_err());
    }

    #[test]
    fn test_missing_repeat_byte() {
        assert!(RunLengthDecoder.decode(&[200], None).is_err());
    }
}
