//! Stream filters.
//!
//! The graph resolver peels one encoding layer off content-like streams so
//! callers can edit plain bytes; the writer re-encodes with Flate on output.
//! Supported filters:
//! - FlateDecode (zlib/deflate), decode and encode
//! - LZWDecode
//! - ASCII85Decode
//! - ASCIIHexDecode
//! - RunLengthDecode
//!
//! PNG and TIFF predictors from `/DecodeParms` are applied after Flate and LZW.
//! Image codecs (DCT, JPX, JBIG2, CCITT) are never decoded; their bytes pass
//! through untouched.

use crate::error::{Error, Result};

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii_hex::AsciiHexDecoder;
pub use ascii85::Ascii85Decoder;
pub use flate::{FlateDecoder, encode_flate};
pub use lzw::LzwDecoder;
pub use predictor::{DecodeParams, decode_predictor};
pub use runlength::RunLengthDecoder;

/// Upper bound for a single decoded stream (decompression bomb guard).
pub const MAX_DECODED_SIZE: usize = 256 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8], params: Option<&DecodeParams>) -> Result<Vec<u8>>;

    /// Canonical filter name (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Map abbreviated inline-image filter names to their full form.
pub fn canonical_filter_name(name: &str) -> &str {
    match name {
        "Fl" => "FlateDecode",
        "LZW" => "LZWDecode",
        "A85" => "ASCII85Decode",
        "AHx" => "ASCIIHexDecode",
        "RL" => "RunLengthDecode",
        other => other,
    }
}

fn decoder_for(name: &str) -> Option<Box<dyn StreamDecoder>> {
    let decoder: Box<dyn StreamDecoder> = match canonical_filter_name(name) {
        "FlateDecode" => Box::new(FlateDecoder),
        "LZWDecode" => Box::new(LzwDecoder),
        "ASCII85Decode" => Box::new(Ascii85Decoder),
        "ASCIIHexDecode" => Box::new(AsciiHexDecoder),
        "RunLengthDecode" => Box::new(RunLengthDecoder),
        _ => return None,
    };
    Some(decoder)
}

/// Whether `name` is a filter this crate can undo.
pub fn is_decodable(name: &str) -> bool {
    decoder_for(name).is_some()
}

/// Undo a single filter.
///
/// # Errors
///
/// `UnsupportedFilter` for filters outside [`is_decodable`], `Decode` when the
/// data is corrupt or expands past [`MAX_DECODED_SIZE`].
pub fn decode_filter(name: &str, data: &[u8], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
    let decoder = decoder_for(name).ok_or_else(|| Error::UnsupportedFilter(name.to_string()))?;
    let decoded = decoder.decode(data, params)?;

    if decoded.len() > MAX_DECODED_SIZE {
        return Err(Error::Decode(format!(
            "{}: decoded size {} exceeds limit {}",
            decoder.name(),
            decoded.len(),
            MAX_DECODED_SIZE
        )));
    }
    Ok(decoded)
}

/// Undo a whole filter chain, outermost filter first.
///
/// `params` runs parallel to `filters`.
pub fn decode_chain(
    data: &[u8],
    filters: &[String],
    params: &[Option<DecodeParams>],
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for (index, filter) in filters.iter().enumerate() {
        let layer_params = params.get(index).and_then(Option::as_ref);
        current = decode_filter(filter, &current, layer_params)?;
    }
    Ok(current)
}
