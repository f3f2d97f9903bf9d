//! Byte-backed source document.
//!
//! [`PdfDocument`] owns the complete file in memory and implements
//! [`SourceDocument`] on top of the xref readers, the object-stream
//! splitter and the object parser.
//!
//! # Example
//!
//! ```
//! use pdf_assembler::document::PdfDocument;
//! use pdf_assembler::source::SourceDocument;
//!
//! let bytes = pdf_assembler::PdfAssembler::new(Default::default()).assemble()?;
//! let mut doc = PdfDocument::new(bytes);
//! assert_eq!(doc.check_header()?, "1.7");
//! doc.parse_start_xref()?;
//! doc.parse(false)?;
//! assert_eq!(doc.num_pages()?, 1);
//! # Ok::<(), pdf_assembler::error::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::objstm::{ObjectStream, parse_object_stream};
use crate::parser::parse_indirect_object;
use crate::source::SourceDocument;
use crate::xref::{CrossRefTable, XRefEntry, find_startxref, parse_xref};
use crate::xref_reconstruction::reconstruct_xref;
use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// How far into the file the `%PDF-` marker may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Bytes hashed for the fallback fingerprint.
const FINGERPRINT_WINDOW: usize = 1024;

/// A PDF file held in memory.
pub struct PdfDocument {
    data: Bytes,
    version: Option<String>,
    start_xref: Option<usize>,
    xref: CrossRefTable,
    recovery_mode: bool,
    /// Decoded object streams by object number
    object_streams: HashMap<u32, ObjectStream>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("len", &self.data.len())
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("recovery_mode", &self.recovery_mode)
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Wrap file bytes. Nothing is parsed until the [`SourceDocument`] steps run.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            version: None,
            start_xref: None,
            xref: CrossRefTable::new(),
            recovery_mode: false,
            object_streams: HashMap::new(),
        }
    }

    /// Read a file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    /// Header version found by [`SourceDocument::check_header`].
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether the current index came from a full-file scan.
    pub fn recovery_mode(&self) -> bool {
        self.recovery_mode
    }

    /// The cross-reference index in use.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Trailer dictionary of the current index.
    pub fn trailer(&self) -> &crate::object::Dict {
        self.xref.trailer()
    }

    /// Structured-parse failures become `XrefParse` so the loader can retry;
    /// in recovery mode they are ordinary parse errors.
    fn offset_error(&self, reference: ObjectRef, reason: String) -> Error {
        if self.recovery_mode {
            Error::ParseError {
                offset: 0,
                reason: format!("object {}: {}", reference, reason),
            }
        } else {
            Error::XrefParse(format!("object {}: {}", reference, reason))
        }
    }

    fn load_uncompressed(&self, reference: ObjectRef, offset: usize) -> Result<Object> {
        let input = self
            .data
            .get(offset..)
            .ok_or_else(|| self.offset_error(reference, format!("offset {} beyond end of file", offset)))?;
        let (found, object) =
            parse_indirect_object(input).map_err(|e| self.offset_error(reference, e.to_string()))?;

        if found.id != reference.id {
            return Err(self.offset_error(
                reference,
                format!("offset {} holds object {} instead", offset, found.id),
            ));
        }
        Ok(object)
    }

    fn load_compressed(&mut self, reference: ObjectRef, stream_id: u32, index: u32) -> Result<Object> {
        if !self.object_streams.contains_key(&stream_id) {
            let container = match self.xref.get(stream_id) {
                Some(XRefEntry::Uncompressed { offset, .. }) => {
                    let offset = *offset;
                    self.load_uncompressed(ObjectRef::new(stream_id, 0), offset)?
                },
                _ => return Err(Error::ObjectNotFound(stream_id, 0)),
            };
            let stream = parse_object_stream(&container)
                .map_err(|e| self.offset_error(reference, format!("object stream {}: {}", stream_id, e)))?;
            self.object_streams.insert(stream_id, stream);
        }

        let stream = &self.object_streams[&stream_id];
        match stream.at(index as usize) {
            Some((id, object)) if id == reference.id => Ok(object.clone()),
            // some writers get the index wrong; fall back to a lookup by number
            _ => stream
                .get(reference.id)
                .cloned()
                .ok_or(Error::ObjectNotFound(reference.id, reference.gen)),
        }
    }

    fn load(&mut self, reference: ObjectRef) -> Result<Object> {
        match self.xref.get(reference.id).copied() {
            Some(XRefEntry::Uncompressed { offset, generation }) => {
                if generation != reference.gen {
                    log::debug!("{} requested but xref has generation {}", reference, generation);
                    return Err(Error::ObjectNotFound(reference.id, reference.gen));
                }
                self.load_uncompressed(reference, offset)
            },
            Some(XRefEntry::Compressed { stream_id, index }) => self.load_compressed(reference, stream_id, index),
            Some(XRefEntry::Free) | None => Err(Error::ObjectNotFound(reference.id, reference.gen)),
        }
    }

    /// Streams whose `/Length` is an indirect reference were sliced by
    /// scanning for `endstream`; trim them to the declared length.
    fn fix_indirect_length(&mut self, object: Object) -> Object {
        let Object::Stream { dict, data } = object else {
            return object;
        };
        let Some(length_ref) = dict.get("Length").and_then(Object::as_reference) else {
            return Object::Stream { dict, data };
        };

        match self.load(length_ref) {
            Ok(Object::Integer(length)) if length >= 0 && (length as usize) <= data.len() => {
                let data = data.slice(..length as usize);
                Object::Stream { dict, data }
            },
            _ => {
                log::debug!("indirect /Length {} unusable, keeping scanned stream length", length_ref);
                Object::Stream { dict, data }
            },
        }
    }

    fn root_is_loadable(&mut self) -> Result<()> {
        match self.xref.trailer().get("Root") {
            Some(Object::Reference(root)) => {
                let root = *root;
                match self.fetch(root) {
                    Ok(Object::Dictionary(_)) => Ok(()),
                    Ok(other) => Err(Error::XrefParse(format!("/Root {} is a {}", root, other.type_name()))),
                    Err(Error::ObjectNotFound(..)) => {
                        Err(Error::XrefParse(format!("/Root {} missing from xref", root)))
                    },
                    Err(e) => Err(e),
                }
            },
            Some(Object::Dictionary(_)) => Ok(()),
            _ => Err(Error::XrefParse("trailer has no /Root".to_string())),
        }
    }
}

impl SourceDocument for PdfDocument {
    fn check_header(&mut self) -> Result<String> {
        let window = &self.data[..self.data.len().min(HEADER_SEARCH_WINDOW)];
        let pos = window.windows(5).position(|w| w == b"%PDF-").ok_or_else(|| {
            let head = &self.data[..self.data.len().min(16)];
            Error::InvalidHeader(String::from_utf8_lossy(head).into_owned())
        })?;

        let version: String = self.data[pos + 5..]
            .iter()
            .take(8)
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .map(|&b| b as char)
            .collect();
        if version.is_empty() {
            return Err(Error::InvalidHeader("missing version after %PDF-".to_string()));
        }
        if pos > 0 {
            log::debug!("PDF header found at offset {}", pos);
        }

        self.version = Some(version.clone());
        Ok(version)
    }

    fn parse_start_xref(&mut self) -> Result<()> {
        self.start_xref = find_startxref(&self.data);
        if self.start_xref.is_none() {
            log::debug!("no startxref found");
        }
        Ok(())
    }

    fn parse(&mut self, recovery_mode: bool) -> Result<()> {
        self.recovery_mode = recovery_mode;
        self.object_streams.clear();

        if recovery_mode {
            log::warn!("rebuilding cross-reference table by scanning the file");
            self.xref = reconstruct_xref(&self.data)?;
            return Ok(());
        }

        let offset = self
            .start_xref
            .ok_or_else(|| Error::XrefParse("startxref not found".to_string()))?;
        self.xref = parse_xref(&self.data, offset)?;
        self.root_is_loadable()
    }

    fn fetch(&mut self, reference: ObjectRef) -> Result<Object> {
        let object = self.load(reference)?;
        Ok(self.fix_indirect_length(object))
    }

    fn catalog_ref(&self) -> Option<ObjectRef> {
        self.xref.trailer().get("Root").and_then(Object::as_reference)
    }

    fn catalog(&mut self) -> Result<Object> {
        match self.xref.trailer().get("Root").cloned() {
            Some(Object::Reference(root)) => self.fetch(root),
            Some(direct @ Object::Dictionary(_)) => Ok(direct),
            _ => Err(Error::InvalidPdf("trailer has no /Root".to_string())),
        }
    }

    fn document_info(&self) -> Option<Object> {
        self.xref.trailer().get("Info").cloned()
    }

    fn num_pages(&mut self) -> Result<usize> {
        let catalog = self.catalog()?;
        let mut pending: Vec<Object> = catalog
            .as_dict()
            .and_then(|d| d.get("Pages"))
            .cloned()
            .into_iter()
            .collect();
        let mut visited = HashSet::new();
        let mut count = 0;

        while let Some(node) = pending.pop() {
            let node = match node {
                Object::Reference(r) => {
                    if !visited.insert(r) {
                        continue;
                    }
                    match self.fetch(r) {
                        Ok(obj) => obj,
                        Err(Error::ObjectNotFound(..)) => continue,
                        Err(e) => return Err(e),
                    }
                },
                other => other,
            };
            let Some(dict) = node.as_dict() else { continue };
            match dict.get("Kids").and_then(Object::as_array) {
                Some(kids) => pending.extend(kids.iter().cloned()),
                None if dict.get("Type").and_then(Object::as_name) == Some("Pages") => {},
                None => count += 1,
            }
        }

        Ok(count)
    }

    fn fingerprint(&self) -> String {
        let first_id = self
            .xref
            .trailer()
            .get("ID")
            .and_then(Object::as_array)
            .and_then(|ids| ids.first())
            .and_then(Object::as_string)
            .filter(|id| !id.is_empty());

        match first_id {
            Some(id) => to_hex(id),
            None => {
                let window = &self.data[..self.data.len().min(FINGERPRINT_WINDOW)];
                to_hex(&Md5::digest(window))
            },
        }
    }

    fn is_encrypted(&self) -> bool {
        self.xref.trailer().contains_key("Encrypt")
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
