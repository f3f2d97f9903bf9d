//! The source document adapter interface.
//!
//! The graph resolver never touches raw bytes; it asks a [`SourceDocument`]
//! for objects by reference and for decoded stream layers. [`PdfDocument`]
//! is the byte-backed implementation, but anything that can hand out
//! [`Object`]s (a test double, another parser) can drive the resolver.
//!
//! [`PdfDocument`]: crate::document::PdfDocument

use crate::decoders::decode_filter;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef, decode_params_at, filter_names};

/// A lazily parsed PDF object store.
///
/// Loading follows a fixed sequence: [`check_header`](Self::check_header),
/// [`parse_start_xref`](Self::parse_start_xref), then
/// [`parse`](Self::parse). A structured parse failure is reported as
/// [`Error::XrefParse`] and callers retry exactly once with
/// `recovery_mode = true`.
pub trait SourceDocument {
    /// Validate the `%PDF-M.m` header and return the version string.
    fn check_header(&mut self) -> Result<String>;

    /// Locate the `startxref` offset. A missing offset is not an error here;
    /// the structured parse fails later instead.
    fn parse_start_xref(&mut self) -> Result<()>;

    /// Build the cross-reference index, by table/stream or by full scan.
    fn parse(&mut self, recovery_mode: bool) -> Result<()>;

    /// Fetch an indirect object. Missing or free objects yield
    /// [`Error::ObjectNotFound`].
    fn fetch(&mut self, reference: ObjectRef) -> Result<Object>;

    /// Undo the first `layers` filters of a stream.
    ///
    /// The default implementation handles every filter in
    /// [`crate::decoders`]; an unknown filter fails with
    /// [`Error::UnsupportedFilter`].
    fn decode(&self, dict: &Dict, data: &[u8], layers: usize) -> Result<Vec<u8>> {
        let filters = filter_names(dict);
        if layers > filters.len() {
            return Err(Error::Decode(format!(
                "requested {} filter layers, stream has {}",
                layers,
                filters.len()
            )));
        }

        let mut current = data.to_vec();
        for (index, filter) in filters.iter().take(layers).enumerate() {
            let params = decode_params_at(dict, index);
            current = decode_filter(filter, &current, params.as_ref())?;
        }
        Ok(current)
    }

    /// Reference to the document catalog, when the trailer's `/Root` is indirect.
    fn catalog_ref(&self) -> Option<ObjectRef>;

    /// The document catalog itself.
    fn catalog(&mut self) -> Result<Object>;

    /// The trailer's `/Info` entry, unresolved.
    fn document_info(&self) -> Option<Object>;

    /// Number of leaf pages in the source page tree.
    fn num_pages(&mut self) -> Result<usize>;

    /// Stable identifier for the source file.
    fn fingerprint(&self) -> String;

    /// Whether the trailer carries `/Encrypt`.
    fn is_encrypted(&self) -> bool;
}
