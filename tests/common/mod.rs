//! Synthetic PDF files for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Builds a PDF with a classic xref table whose offsets are computed from
/// the objects actually written.
#[derive(Default, Clone)]
pub struct PdfBuilder {
    version: Option<String>,
    objects: BTreeMap<u32, Vec<u8>>,
    trailer: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Add `id 0 obj <body> endobj`.
    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.objects.insert(id, body.as_bytes().to_vec());
        self
    }

    /// Add a stream object; `/Length` is appended to `dict_entries`.
    pub fn stream(mut self, id: u32, dict_entries: &str, data: &[u8]) -> Self {
        let mut body = format!("<<{} /Length {}>>\nstream\n", dict_entries, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.insert(id, body);
        self
    }

    /// Trailer entries besides `/Size`, e.g. `/Root 1 0 R`.
    pub fn trailer(mut self, entries: &str) -> Self {
        self.trailer = entries.to_string();
        self
    }

    /// Object bodies and their offsets, before the xref section.
    fn body(&self) -> (Vec<u8>, BTreeMap<u32, usize>) {
        let mut out = format!("%PDF-{}\n", self.version.as_deref().unwrap_or("1.7")).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        let mut offsets = BTreeMap::new();
        for (&id, body) in &self.objects {
            offsets.insert(id, out.len());
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        (out, offsets)
    }

    fn size(&self) -> u32 {
        self.objects.keys().max().map_or(1, |max| max + 1)
    }

    pub fn build(&self) -> Vec<u8> {
        let (mut out, offsets) = self.body();
        let xref_at = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", self.size());
        for id in 1..self.size() {
            match offsets.get(&id) {
                Some(offset) => writeln!(xref, "{:010} 00000 n ", offset).unwrap(),
                None => writeln!(xref, "0000000000 00001 f ").unwrap(),
            }
        }
        write!(
            xref,
            "trailer\n<<{} /Size {}>>\nstartxref\n{}\n%%EOF\n",
            self.trailer,
            self.size(),
            xref_at
        )
        .unwrap();
        out.extend_from_slice(xref.as_bytes());
        out
    }

    /// Same objects, but `startxref` points into the middle of an object.
    pub fn build_with_broken_xref(&self) -> Vec<u8> {
        let (mut out, _) = self.body();
        write!(
            ByteSink(&mut out),
            "trailer\n<<{} /Size {}>>\nstartxref\n{}\n%%EOF\n",
            self.trailer,
            self.size(),
            20
        )
        .unwrap();
        out
    }
}

/// Appends formatted text to a byte buffer.
struct ByteSink<'a>(&'a mut Vec<u8>);

impl std::fmt::Write for ByteSink<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// A document with `pages` pages under one `Pages` node.
///
/// Objects: 1 catalog, 2 pages, 3 shared font, 4 info, 10.. pages.
pub fn simple_pdf(pages: u32) -> PdfBuilder {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 10 + i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> >>",
                kids.join(" "),
                pages
            ),
        )
        .object(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>")
        .object(4, "<< /Title (Synthetic) /Producer (builder) >>")
        .trailer("/Root 1 0 R /Info 4 0 R");
    for i in 0..pages {
        builder = builder.object(10 + i, "<< /Type /Page /Parent 2 0 R >>");
    }
    builder
}

fn rfind(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).rposition(|w| w == needle)
}

/// Offsets listed in the xref section of an assembled file, by object number.
pub fn xref_offsets(pdf: &[u8]) -> Vec<usize> {
    let start_at = rfind(pdf, b"startxref\n").expect("startxref") + b"startxref\n".len();
    let tail = std::str::from_utf8(&pdf[start_at..]).unwrap();
    let xref_at: usize = tail.lines().next().unwrap().trim().parse().unwrap();

    let section = std::str::from_utf8(&pdf[xref_at..]).unwrap();
    assert!(section.starts_with("xref\n0 "));
    section
        .lines()
        .skip(3)
        .take_while(|line| line.len() >= 18 && line.as_bytes()[0].is_ascii_digit())
        .map(|line| line[..10].parse().unwrap())
        .collect()
}

/// The `/Size` written in the trailer.
pub fn trailer_size(pdf: &[u8]) -> usize {
    let trailer = std::str::from_utf8(&pdf[rfind(pdf, b"trailer").unwrap()..]).unwrap();
    let after = &trailer[trailer.find("/Size").unwrap() + "/Size".len()..];
    after
        .trim_start()
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap()
        .parse()
        .unwrap()
}

/// Whether `needle` occurs in `data`.
pub fn contains(data: &[u8], needle: &[u8]) -> bool {
    rfind(data, needle).is_some()
}
