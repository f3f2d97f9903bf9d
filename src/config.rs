//! Configuration for loading and assembling documents.

/// Whitespace used when writing objects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Indent {
    /// Minimal whitespace, one object per line
    #[default]
    Compact,
    /// Pretty-print with this many spaces per nesting level
    Spaces(usize),
    /// Pretty-print with this string per nesting level (e.g. `"\t"`)
    Literal(String),
}

impl Indent {
    /// The per-level indent string; empty means compact output.
    pub fn unit(&self) -> String {
        match self {
            Indent::Compact => String::new(),
            Indent::Spaces(n) => " ".repeat(*n),
            Indent::Literal(s) => s.clone(),
        }
    }

    /// Whether output is pretty-printed.
    pub fn is_pretty(&self) -> bool {
        !self.unit().is_empty()
    }
}

/// Assembler configuration.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Output whitespace.
    pub indent: Indent,

    /// Deflate streams that have no filter when it makes them smaller.
    pub compress: bool,

    /// Re-nest the flat page list into a balanced tree on output.
    pub group_pages: bool,

    /// Maximum kids per `Pages` node when grouping (at least 2).
    pub page_group_size: usize,

    /// Version written to the header and `/Root /Version`.
    pub pdf_version: String,

    /// `/Producer` stamped into the info dictionary.
    pub producer: String,

    /// Recursion limit for resolving and writing.
    pub max_depth: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AssemblerConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            indent: Indent::Compact,
            compress: true,
            group_pages: true,
            page_group_size: 16,
            pdf_version: "1.7".to_string(),
            producer: "pdf_assembler".to_string(),
            max_depth: 1000,
        }
    }

    /// Set output whitespace.
    pub fn with_indent(mut self, indent: Indent) -> Self {
        self.indent = indent;
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, enable: bool) -> Self {
        self.compress = enable;
        self
    }

    /// Enable or disable page grouping.
    pub fn with_group_pages(mut self, enable: bool) -> Self {
        self.group_pages = enable;
        self
    }

    /// Set the page group size.
    pub fn with_page_group_size(mut self, size: usize) -> Self {
        self.page_group_size = size;
        self
    }

    /// Set the output PDF version.
    pub fn with_pdf_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    /// Set the producer string.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Set the recursion limit.
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }
}
