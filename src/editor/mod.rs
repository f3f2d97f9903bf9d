//! Editing sessions.
//!
//! ```text
//! PDF bytes
//!     ↓
//! [PdfDocument] (source adapter, recovery retry on xref failure)
//!     ↓
//! [resolve_document] (identity-preserving tree)
//!     ↓
//! [PdfAssembler] (flat page list; delete, rotate, add, append content)
//!     ↓
//! [writer::assemble] (normalize, renumber, serialize)
//! ```
//!
//! A [`PdfAssembler`] is single-threaded; wrap it in a [`SharedAssembler`]
//! to hand it between threads.

mod assembler;
mod page_labels;
mod shared;

pub use assembler::{DEFAULT_MEDIA_BOX, PdfAssembler};
pub use page_labels::regenerate_page_labels;
pub use shared::SharedAssembler;
