//! Whole-file output: header, object table, xref and trailer.

use super::object_serializer::ObjectSerializer;
use crate::error::{Error, Result};
use crate::tree::{NodeId, Tree};
use std::io::Write;

/// Binary marker comment written after the header line.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Writes a numbered tree as a complete PDF file.
///
/// Object numbers must already be assigned (see
/// [`reset_object_ids`](crate::object_ids::reset_object_ids)) and must be
/// dense: every number from 1 to the highest one belongs to exactly one node.
pub struct PdfWriter<'a> {
    tree: &'a Tree,
    serializer: ObjectSerializer,
    version: String,
}

impl<'a> PdfWriter<'a> {
    /// Create a writer for `tree`.
    pub fn new(tree: &'a Tree, serializer: ObjectSerializer, version: impl Into<String>) -> Self {
        Self {
            tree,
            serializer,
            version: version.into(),
        }
    }

    /// Numbered nodes indexed by object number; slot 0 is the free-list head.
    fn object_table(&self) -> Result<Vec<NodeId>> {
        let mut slots: Vec<Option<NodeId>> = vec![None];
        for id in self.tree.ids() {
            let Some(number) = self.tree.node(id).object_id else {
                continue;
            };
            let number = number as usize;
            if slots.len() <= number {
                slots.resize(number + 1, None);
            }
            if slots[number].replace(id).is_some() {
                return Err(Error::InvalidStructure(format!("object number {} assigned twice", number)));
            }
        }

        slots
            .into_iter()
            .enumerate()
            .skip(1)
            .map(|(number, slot)| {
                slot.ok_or_else(|| Error::InvalidStructure(format!("object number {} has no object", number)))
            })
            .collect()
    }

    /// Produce the file. Nothing is returned unless every object rendered.
    pub fn finish(self) -> Result<Vec<u8>> {
        let root = self
            .tree
            .root()
            .ok_or_else(|| Error::InvalidStructure("document has no catalog".to_string()))?;
        let root_number = self
            .tree
            .node(root)
            .object_id
            .ok_or_else(|| Error::InvalidStructure("catalog has no object number".to_string()))?;
        let info_number = self.tree.info().and_then(|info| self.tree.node(info).object_id);

        let objects = self.object_table()?;
        let mut output = Vec::new();
        writeln!(output, "%PDF-{}", self.version)?;
        output.extend_from_slice(BINARY_MARKER);

        let mut offsets = Vec::with_capacity(objects.len());
        for &id in &objects {
            offsets.push(output.len());
            output.extend_from_slice(&self.serializer.serialize_indirect(self.tree, id)?);
        }

        let xref_start = output.len();
        let size = objects.len() + 1;
        writeln!(output, "xref")?;
        writeln!(output, "0 {}", size)?;
        output.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            output.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }

        let space = self.serializer.indent_unit();
        let newline = if space.is_empty() { "" } else { "\n" };
        writeln!(output, "trailer")?;
        write!(output, "<<{}", newline)?;
        write!(output, "{}/Root {} 0 R{}", space, root_number, newline)?;
        if let Some(info) = info_number {
            write!(output, "{}/Info {} 0 R{}", space, info, newline)?;
        }
        write!(output, "{}/Size {}{}", space, size, newline)?;
        writeln!(output, ">>")?;
        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        writeln!(output, "%%EOF")?;

        log::debug!("wrote {} objects, {} bytes", objects.len(), output.len());
        Ok(output)
    }
}
