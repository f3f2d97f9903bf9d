//! The editing session.

use super::page_labels::regenerate_page_labels;
use crate::config::AssemblerConfig;
use crate::date::now_pdf_date;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::page_tree::{flatten, set_page_list};
use crate::resolver::resolve_document;
use crate::source::SourceDocument;
use crate::text_string::{decode_text_string, encode_text_string};
use crate::tree::{Dict, NodeId, NodeKind, Tree, Value, dict};
use crate::writer;
use bytes::Bytes;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Info entries written by other producers that stop being true once the
/// document is rewritten.
const STALE_INFO_KEYS: [&str; 3] = ["IsAcroFormPresent", "IsXFAPresent", "PDFFormatVersion"];

/// US Letter, the media box of new pages when none is given.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A document loaded into an editable tree.
///
/// The page tree is kept flat between operations: `/Root /Pages /Kids`
/// lists every page, so page indices are positions in that array.
///
/// # Example
///
/// ```
/// use pdf_assembler::{AssemblerConfig, PdfAssembler};
///
/// let mut blank = PdfAssembler::new(AssemblerConfig::default());
/// blank.add_page(None)?;
/// let bytes = blank.assemble()?;
///
/// let mut session = PdfAssembler::load(bytes, AssemblerConfig::default())?;
/// assert_eq!(session.count_pages()?, 2);
/// session.rotate_pages(&[1], 90)?;
/// session.delete_pages(&[0])?;
/// assert_eq!(session.count_pages()?, 1);
/// # Ok::<(), pdf_assembler::Error>(())
/// ```
#[derive(Debug)]
pub struct PdfAssembler {
    tree: Tree,
    config: AssemblerConfig,
    recovery_mode: bool,
    fingerprint: Option<String>,
    source_version: Option<String>,
}

impl PdfAssembler {
    /// Start a new document with a single blank page.
    pub fn new(config: AssemblerConfig) -> Self {
        let mut tree = Tree::new();
        let now = Value::String(encode_text_string(&now_pdf_date()));
        let info = tree.alloc_dict(dict([
            ("Producer", Value::String(encode_text_string(&config.producer))),
            ("CreationDate", now.clone()),
            ("ModDate", now),
        ]));
        tree.node_mut(info).indirect = true;

        let pages = tree.alloc_dict(dict([("Type", Value::name("Pages"))]));
        tree.node_mut(pages).indirect = true;
        let page = new_page(&mut tree, pages, DEFAULT_MEDIA_BOX);
        let kids = tree.alloc_array(vec![Value::Node(page)]);
        tree.set(pages, "Kids", Value::Node(kids));
        tree.set(pages, "Count", Value::Integer(1));

        let root = tree.alloc_dict(dict([("Type", Value::name("Catalog")), ("Pages", Value::Node(pages))]));
        tree.node_mut(root).indirect = true;
        tree.set_root(root);
        tree.set_info(Some(info));

        Self {
            tree,
            config,
            recovery_mode: false,
            fingerprint: None,
            source_version: None,
        }
    }

    /// Load a document from memory.
    pub fn load(data: impl Into<Bytes>, config: AssemblerConfig) -> Result<Self> {
        let mut document = PdfDocument::new(data);
        Self::from_source(&mut document, config)
    }

    /// Load a document from disk.
    pub fn open(path: impl AsRef<Path>, config: AssemblerConfig) -> Result<Self> {
        let mut document = PdfDocument::open(path)?;
        Self::from_source(&mut document, config)
    }

    /// Load a document through any [`SourceDocument`].
    ///
    /// A cross-reference failure, whether from the structured parse or from
    /// a broken offset found while resolving, triggers one retry with the
    /// source in recovery mode.
    pub fn from_source<S: SourceDocument + ?Sized>(source: &mut S, config: AssemblerConfig) -> Result<Self> {
        let version = source.check_header()?;
        source.parse_start_xref()?;

        let mut recovery_mode = false;
        let tree = match parse_and_resolve(source, false, config.max_depth) {
            Ok(tree) => tree,
            Err(Error::XrefParse(reason)) => {
                log::warn!("{}; retrying in recovery mode", reason);
                recovery_mode = true;
                parse_and_resolve(source, true, config.max_depth)?
            },
            Err(e) => return Err(e),
        };

        let mut session = Self {
            tree,
            config,
            recovery_mode,
            fingerprint: Some(source.fingerprint()),
            source_version: Some(version),
        };
        session.stamp_info();
        let pages = flatten(&mut session.tree)?;
        log::info!(
            "loaded {} pages ({} nodes){}",
            pages.len(),
            session.tree.len(),
            if recovery_mode { " in recovery mode" } else { "" }
        );
        Ok(session)
    }

    fn stamp_info(&mut self) {
        let info = match self.tree.info() {
            Some(info) => info,
            None => {
                let info = self.tree.alloc_dict(Dict::new());
                self.tree.node_mut(info).indirect = true;
                self.tree.set_info(Some(info));
                info
            },
        };
        for key in STALE_INFO_KEYS {
            self.tree.remove(info, key);
        }
        let producer = encode_text_string(&self.config.producer);
        self.tree.set(info, "Producer", Value::String(producer));
        self.tree.set(info, "ModDate", Value::String(encode_text_string(&now_pdf_date())));
    }

    /// The document tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The document tree, for edits not covered by the page operations.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Give up the session and keep the tree.
    pub fn into_tree(self) -> Tree {
        self.tree
    }

    /// Session configuration.
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Whether the source needed cross-reference recovery.
    pub fn recovery_mode(&self) -> bool {
        self.recovery_mode
    }

    /// Fingerprint of the source file, `None` for new documents.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Header version of the source file.
    pub fn source_version(&self) -> Option<&str> {
        self.source_version.as_deref()
    }

    /// A text entry of the info dictionary.
    pub fn info_entry(&self, key: &str) -> Option<String> {
        let info = self.tree.info()?;
        self.tree.get(info, key)?.as_string().map(decode_text_string)
    }

    /// Set a text entry of the info dictionary.
    pub fn set_info_entry(&mut self, key: &str, text: &str) {
        if let Some(info) = self.tree.info() {
            self.tree.set(info, key, Value::String(encode_text_string(text)));
        }
    }

    /// Flattened page list.
    pub fn pages(&mut self) -> Result<Vec<NodeId>> {
        flatten(&mut self.tree)
    }

    /// Number of pages.
    pub fn count_pages(&mut self) -> Result<usize> {
        Ok(self.pages()?.len())
    }

    fn page(&mut self, index: usize) -> Result<NodeId> {
        let pages = self.pages()?;
        pages.get(index).copied().ok_or(Error::PageOutOfRange {
            index,
            count: pages.len(),
        })
    }

    /// Remove catalog entries by name.
    ///
    /// An empty list removes everything except `/Type` and `/Pages`.
    pub fn remove_root_entries(&mut self, entries: &[&str]) -> Result<()> {
        let root = self
            .tree
            .root()
            .ok_or_else(|| Error::InvalidStructure("document has no catalog".to_string()))?;

        let doomed: Vec<String> = if entries.is_empty() {
            self.tree
                .dict(root)
                .map(|d| d.keys().filter(|k| *k != "Type" && *k != "Pages").cloned().collect())
                .unwrap_or_default()
        } else {
            entries.iter().map(|e| e.to_string()).collect()
        };
        for key in &doomed {
            self.tree.remove(root, key);
        }
        Ok(())
    }

    /// Delete pages by index.
    ///
    /// Indices are deduplicated. Nothing changes if any index is out of
    /// range or if no page would remain. Page labels are renumbered, and
    /// links to a deleted page elsewhere in the document (outlines, named
    /// destinations, annotations) are pointed at the first remaining page.
    pub fn delete_pages(&mut self, indices: &[usize]) -> Result<()> {
        let pages = self.pages()?;
        let mut doomed = indices.to_vec();
        doomed.sort_unstable();
        doomed.dedup();

        if let Some(&index) = doomed.iter().find(|&&i| i >= pages.len()) {
            return Err(Error::PageOutOfRange {
                index,
                count: pages.len(),
            });
        }
        if doomed.is_empty() {
            return Ok(());
        }
        if doomed.len() >= pages.len() {
            return Err(Error::LastPageRemoval);
        }

        regenerate_page_labels(&mut self.tree, &doomed, pages.len());

        let deleted: HashSet<NodeId> = doomed.iter().map(|&i| pages[i]).collect();
        let survivors: Vec<NodeId> = pages.iter().copied().filter(|p| !deleted.contains(p)).collect();
        let first = survivors[0];
        set_page_list(&mut self.tree, &survivors)?;

        self.replace_references(&deleted, first);
        log::debug!("deleted {} pages, {} remain", deleted.len(), survivors.len());
        Ok(())
    }

    fn replace_references(&mut self, deleted: &HashSet<NodeId>, replacement: NodeId) {
        let redirect = |value: &mut Value| {
            if let Value::Node(target) = value {
                if deleted.contains(&*target) {
                    *target = replacement;
                }
            }
        };

        let ids: Vec<NodeId> = self.tree.ids().filter(|id| !deleted.contains(id)).collect();
        for id in ids {
            match &mut self.tree.node_mut(id).kind {
                NodeKind::Dictionary(dict) | NodeKind::Stream { dict, .. } => dict.values_mut().for_each(redirect),
                NodeKind::Array(items) => items.iter_mut().for_each(redirect),
            }
        }
    }

    /// Rotate pages clockwise by `degrees`.
    ///
    /// `degrees` must be a non-negative multiple of 90. An existing
    /// `/Rotate` that is not counts as 0. The result is kept in `0..360`.
    pub fn rotate_pages(&mut self, indices: &[usize], degrees: i64) -> Result<()> {
        if degrees < 0 || degrees % 90 != 0 {
            return Err(Error::InvalidRotation(degrees));
        }
        let pages = self.pages()?;
        if let Some(&index) = indices.iter().find(|&&i| i >= pages.len()) {
            return Err(Error::PageOutOfRange {
                index,
                count: pages.len(),
            });
        }

        let mut targets = indices.to_vec();
        targets.sort_unstable();
        targets.dedup();
        for index in targets {
            let page = pages[index];
            let current = self
                .tree
                .get(page, "Rotate")
                .and_then(Value::as_integer)
                .filter(|r| *r >= 0 && r % 90 == 0)
                .unwrap_or(0);
            self.tree.set(page, "Rotate", Value::Integer((current % 360 + degrees % 360) % 360));
        }
        Ok(())
    }

    /// Append a blank page and return its index.
    pub fn add_page(&mut self, media_box: Option<[f64; 4]>) -> Result<usize> {
        let mut pages = self.pages()?;
        let root = self
            .tree
            .pages_root()
            .ok_or_else(|| Error::InvalidStructure("catalog has no /Pages dictionary".to_string()))?;

        pages.push(new_page(&mut self.tree, root, media_box.unwrap_or(DEFAULT_MEDIA_BOX)));
        set_page_list(&mut self.tree, &pages)?;
        Ok(pages.len() - 1)
    }

    /// Add a content stream after a page's existing `/Contents`.
    pub fn append_content(&mut self, index: usize, content: impl Into<Bytes>) -> Result<()> {
        let page = self.page(index)?;
        let stream = self.tree.alloc_stream(Dict::new(), content);

        // a fresh array, since the old one may be shared with other pages
        let mut contents: Vec<Value> = self
            .tree
            .node_list(page, "Contents")
            .into_iter()
            .map(Value::Node)
            .collect();
        contents.push(Value::Node(stream));
        let contents = self.tree.alloc_array(contents);
        self.tree.set(page, "Contents", Value::Node(contents));
        Ok(())
    }

    /// Write the document.
    ///
    /// Normalizes the page tree and renumbers objects first, so the tree
    /// stays usable and assembling twice gives the same bytes.
    pub fn assemble(&mut self) -> Result<Vec<u8>> {
        let bytes = writer::assemble(&mut self.tree, &self.config)?;
        log::debug!("assembled {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Write the document to `name`, adding a `.pdf` extension if missing.
    pub fn assemble_to_file(&mut self, name: impl AsRef<Path>) -> Result<PathBuf> {
        let name = name.as_ref();
        let has_extension = name
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));
        let path = if has_extension {
            name.to_path_buf()
        } else {
            let mut with_extension = name.as_os_str().to_owned();
            with_extension.push(".pdf");
            PathBuf::from(with_extension)
        };

        let bytes = self.assemble()?;
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// One load attempt: build the cross-reference index, then resolve.
fn parse_and_resolve<S: SourceDocument + ?Sized>(source: &mut S, recovery_mode: bool, max_depth: u32) -> Result<Tree> {
    source.parse(recovery_mode)?;
    if source.is_encrypted() {
        return Err(Error::EncryptedDocument);
    }
    resolve_document(source, max_depth)
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Integer(value as i64)
    } else {
        Value::Real(value)
    }
}

fn new_page(tree: &mut Tree, parent: NodeId, media_box: [f64; 4]) -> NodeId {
    let media_box = tree.alloc_array(media_box.into_iter().map(number).collect());
    let contents = tree.alloc_stream(Dict::new(), Bytes::new());
    let resources = tree.alloc_dict(Dict::new());
    let page = tree.alloc_dict(dict([
        ("Type", Value::name("Page")),
        ("Parent", Value::Node(parent)),
        ("MediaBox", Value::Node(media_box)),
        ("Contents", Value::Node(contents)),
        ("Resources", Value::Node(resources)),
    ]));
    tree.node_mut(page).indirect = true;
    page
}
