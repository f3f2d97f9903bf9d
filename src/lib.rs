// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::needless_range_loop)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::manual_find)]
#![allow(clippy::match_like_matches_macro)]
#![allow(clippy::unnecessary_map_or)]

//! # PDF Assembler
//!
//! Load a PDF into an editable object tree, edit its pages, and write a
//! clean, fully rewritten PDF.
//!
//! ## Core Features
//!
//! - **Identity-preserving load**: every indirect object becomes exactly one
//!   tree node, so shared resources stay shared and reference cycles
//!   (`/Parent`, outline `/Prev`/`/Next`) are plain links
//! - **Damaged files**: a broken cross-reference table is rebuilt by
//!   scanning the file for object headers
//! - **Page operations**: delete (with page-label renumbering), rotate,
//!   add blank pages, append content
//! - **Clean output**: flattened and regrouped page tree, fresh object
//!   numbers, deflated streams, exact xref offsets
//!
//! ## Architecture
//!
//! ```text
//! PDF bytes
//!     ↓
//! [PdfDocument] (header, xref, object streams, stream filters)
//!     ↓
//! [resolver] (Tree of nodes, one per indirect object)
//!     ↓
//! [editor::PdfAssembler] (page edits on a flat page list)
//!     ↓
//! [page_tree] → [object_ids] → [writer]
//!     ↓
//! PDF bytes
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use pdf_assembler::{AssemblerConfig, Indent, PdfAssembler};
//!
//! # fn main() -> pdf_assembler::Result<()> {
//! let mut doc = PdfAssembler::new(AssemblerConfig::default());
//! doc.add_page(Some([0.0, 0.0, 595.0, 842.0]))?;
//! doc.append_content(1, &b"BT /F1 12 Tf 72 770 Td (Hello) Tj ET"[..])?;
//! let bytes = doc.assemble()?;
//!
//! let config = AssemblerConfig::default().with_indent(Indent::Spaces(2));
//! let mut reloaded = PdfAssembler::load(bytes, config)?;
//! reloaded.rotate_pages(&[0], 90)?;
//! assert_eq!(reloaded.count_pages()?, 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Source document adapter
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod source;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// Object graph
pub mod object_ids;
pub mod page_tree;
pub mod resolver;
pub mod tree;

// Output
pub mod writer;

// Configuration
pub mod config;

// Supporting encodings
pub mod date;
pub mod text_string;

// Editing sessions
pub mod editor;

// Re-exports
pub use config::{AssemblerConfig, Indent};
pub use document::PdfDocument;
pub use editor::{PdfAssembler, SharedAssembler};
pub use error::{Error, Result};
pub use source::SourceDocument;
pub use tree::{NodeId, Tree, Value};
