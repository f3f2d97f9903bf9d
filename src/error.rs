//! Error types for the PDF assembler.
//!
//! Every fallible operation in the crate returns [`Result`]. Parsing errors
//! carry byte offsets where they are known; editing errors are raised before
//! the tree is touched.

/// Result type alias for PDF assembler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, editing or assembling a PDF.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Structured cross-reference parsing failed.
    ///
    /// This is the one error that makes a loader retry in recovery mode.
    #[error("Cross-reference parse failed: {0}")]
    XrefParse(String),

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Document is encrypted
    #[error("Encrypted documents are not supported")]
    EncryptedDocument,

    /// Invalid PDF structure in the source file
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// The in-memory tree cannot be written out
    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// A page operation would leave the document without pages
    #[error("At least one page must remain")]
    LastPageRemoval,

    /// Page index outside the document
    #[error("Page index {index} out of range (document has {count} pages)")]
    PageOutOfRange {
        /// Requested page index
        index: usize,
        /// Number of pages in the document
        count: usize,
    },

    /// Rotation that is negative or not a multiple of 90
    #[error("Invalid rotation: {0} (must be a non-negative multiple of 90)")]
    InvalidRotation(i64),

    /// A shared session lock was poisoned by a panicking holder
    #[error("Session lock poisoned")]
    SessionPoisoned,
}
