//! FlateDecode (zlib/deflate) implementation.
//!
//! Decoding tries zlib first and falls back to raw deflate for streams whose
//! zlib header is damaged. Encoding always produces zlib, which is what
//! `/FlateDecode` readers expect.

use crate::decoders::{DecodeParams, StreamDecoder, decode_predictor};
use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
        let inflated = inflate(input)?;
        match params {
            Some(params) if params.predictor > 1 => decode_predictor(&inflated, params),
            _ => Ok(inflated),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    match ZlibDecoder::new(input).read_to_end(&mut output) {
        Ok(_) => return Ok(output),
        // Streams truncated before the Adler-32 checksum are common and
        // still carry the complete payload.
        Err(e) if !output.is_empty() => {
            log::warn!("FlateDecode: keeping {} bytes read before error: {}", output.len(), e);
            return Ok(output);
        },
        Err(e) => log::debug!("zlib decode failed ({}), trying raw deflate", e),
    }

    output.clear();
    match DeflateDecoder::new(input).read_to_end(&mut output) {
        Ok(_) if !output.is_empty() => {
            log::info!("FlateDecode: raw deflate recovery produced {} bytes", output.len());
            Ok(output)
        },
        Ok(_) => Err(Error::Decode("FlateDecode: no data".to_string())),
        Err(e) => Err(Error::Decode(format!("FlateDecode: {}", e))),
    }
}

/// Compress `data` with zlib at the default level.
pub fn encode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
