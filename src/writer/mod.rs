//! PDF output.
//!
//! ```text
//! Tree
//!     ↓
//! [page_tree::flatten + group] (normalized page tree)
//!     ↓
//! [object_ids::reset_object_ids] (fresh object numbers)
//!     ↓
//! [PdfWriter] (object table, xref, trailer)
//!     ↓
//! [ObjectSerializer] (value syntax, stream compression)
//!     ↓
//! PDF bytes
//! ```

mod object_serializer;
mod pdf_writer;

pub use object_serializer::{ObjectSerializer, write_name, write_string};
pub use pdf_writer::PdfWriter;

use crate::config::AssemblerConfig;
use crate::error::{Error, Result};
use crate::object_ids::reset_object_ids;
use crate::page_tree::{flatten, group};
use crate::tree::{Tree, Value};

/// Normalize, number and write a tree.
///
/// The page tree is flattened (and regrouped when configured), `/Version` is
/// set on the catalog and object numbers are reassigned, so calling this
/// twice without edits in between gives identical output.
pub fn assemble(tree: &mut Tree, config: &AssemblerConfig) -> Result<Vec<u8>> {
    let root = tree
        .root()
        .ok_or_else(|| Error::InvalidStructure("document has no catalog".to_string()))?;

    let pages = flatten(tree)?;
    for &page in &pages {
        tree.node_mut(page).indirect = true;
    }
    if config.group_pages {
        group(tree, &pages, config.page_group_size)?;
    }
    tree.set(root, "Version", Value::name(config.pdf_version.as_str()));

    reset_object_ids(tree);
    let serializer = ObjectSerializer::new(&config.indent, config.compress, config.max_depth);
    PdfWriter::new(tree, serializer, config.pdf_version.as_str()).finish()
}
