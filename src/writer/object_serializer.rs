//! PDF object serialization.
//!
//! Renders tree values in PDF syntax. Nodes that carry an object number are
//! always written as `N 0 R`; their bodies are produced separately by
//! [`ObjectSerializer::serialize_indirect`]. Everything else is written
//! inline.

use crate::config::Indent;
use crate::decoders::encode_flate;
use crate::error::{Error, Result};
use crate::tree::{Dict, NodeId, NodeKind, Tree, Value};
use std::io::Write;

/// Compressed streams are kept only if they save more than this many bytes,
/// which covers the added `/Filter /FlateDecode` entry.
const COMPRESSION_OVERHEAD: usize = 19;

/// Literal-string spelling of every byte value.
fn escape_byte(byte: u8, out: &mut Vec<u8>) {
    match byte {
        b'\n' => out.extend_from_slice(b"\\n"),
        b'\r' => out.extend_from_slice(b"\\r"),
        b'\t' => out.extend_from_slice(b"\\t"),
        0x08 => out.extend_from_slice(b"\\b"),
        0x0C => out.extend_from_slice(b"\\f"),
        b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', byte]),
        0x00..=0x1F | 0x7F..=0xA0 => out.extend_from_slice(format!("\\{:03o}", byte).as_bytes()),
        _ => out.push(byte),
    }
}

/// How the whitespace before a value is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lead {
    /// Nothing at all (first array item in compact mode, top level)
    None,
    /// New line at the current depth when pretty-printing
    Line,
    /// A single space after a dictionary key when pretty-printing
    Value,
}

/// Serializer for tree values.
#[derive(Debug, Clone)]
pub struct ObjectSerializer {
    /// Indent unit; empty for compact output
    space: String,
    compress: bool,
    max_depth: u32,
}

impl Default for ObjectSerializer {
    fn default() -> Self {
        Self::compact()
    }
}

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new(indent: &Indent, compress: bool, max_depth: u32) -> Self {
        Self {
            space: indent.unit(),
            compress,
            max_depth,
        }
    }

    /// Compact output without stream compression.
    pub fn compact() -> Self {
        Self::new(&Indent::Compact, false, 1000)
    }

    /// Indent unit; empty for compact output.
    pub fn indent_unit(&self) -> &str {
        &self.space
    }

    fn pretty(&self) -> bool {
        !self.space.is_empty()
    }

    fn newline(&self) -> &'static str {
        if self.pretty() {
            "\n"
        } else {
            ""
        }
    }

    fn indent(&self, depth: u32) -> String {
        self.space.repeat(depth as usize)
    }

    /// Serialize a value that is not a stream body.
    pub fn serialize(&self, tree: &Tree, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_value(tree, value, 0, Lead::None, &mut out)?;
        Ok(out)
    }

    /// Serialize to a string (for debugging and tests).
    pub fn serialize_to_string(&self, tree: &Tree, value: &Value) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.serialize(tree, value)?).into_owned())
    }

    /// Serialize the body of a numbered node: `N 0 obj ... endobj`.
    pub fn serialize_indirect(&self, tree: &Tree, id: NodeId) -> Result<Vec<u8>> {
        let node = tree.node(id);
        let number = node
            .object_id
            .ok_or_else(|| Error::InvalidStructure("indirect object without a number".to_string()))?;

        let mut out = Vec::new();
        write!(out, "{} 0 obj{}", number, self.newline())?;

        match &node.kind {
            NodeKind::Stream { dict, data } => {
                let (payload, compressed) = self.stream_payload(dict, data);
                let mut dict: Dict = dict
                    .iter()
                    .filter(|(key, _)| key.as_str() != "Length")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if compressed {
                    dict.insert("Filter".to_string(), Value::name("FlateDecode"));
                }
                dict.insert("Length".to_string(), Value::Integer(payload.len() as i64));

                self.write_dict(tree, &dict, 0, &mut out)?;
                writeln!(out, "{}stream", self.newline())?;
                out.extend_from_slice(&payload);
                out.extend_from_slice(b"\nendstream\nendobj\n");
            },
            NodeKind::Dictionary(dict) => {
                self.write_dict(tree, dict, 0, &mut out)?;
                writeln!(out, "{}endobj", self.newline())?;
            },
            NodeKind::Array(items) => {
                self.write_array(tree, items, 0, &mut out)?;
                writeln!(out, "{}endobj", self.newline())?;
            },
        }
        Ok(out)
    }

    /// Bytes to write for a stream, and whether they were deflated here.
    ///
    /// The tree is left untouched so assembling twice gives the same output.
    fn stream_payload(&self, dict: &Dict, data: &[u8]) -> (Vec<u8>, bool) {
        if !self.compress || data.is_empty() || dict.contains_key("Filter") {
            return (data.to_vec(), false);
        }
        match encode_flate(data) {
            Ok(compressed) if compressed.len() + COMPRESSION_OVERHEAD < data.len() => (compressed, true),
            Ok(_) => (data.to_vec(), false),
            Err(e) => {
                log::warn!("stream compression failed, writing uncompressed: {}", e);
                (data.to_vec(), false)
            },
        }
    }

    fn write_lead(&self, lead: Lead, starts_with_delimiter: bool, depth: u32, out: &mut Vec<u8>) {
        match lead {
            Lead::None => {},
            Lead::Line if self.pretty() => {
                out.push(b'\n');
                out.extend_from_slice(self.indent(depth).as_bytes());
            },
            Lead::Value if self.pretty() => out.push(b' '),
            _ if starts_with_delimiter => {},
            _ => out.push(b' '),
        }
    }

    fn write_value(&self, tree: &Tree, value: &Value, depth: u32, lead: Lead, out: &mut Vec<u8>) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::RecursionLimitExceeded(self.max_depth));
        }

        let starts_with_delimiter = match value {
            Value::Name(_) | Value::String(_) => true,
            Value::Node(id) => tree.node(*id).object_id.is_none(),
            _ => false,
        };
        self.write_lead(lead, starts_with_delimiter, depth, out);

        match value {
            Value::Null => out.extend_from_slice(b"null"),
            Value::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Value::Integer(i) => write!(out, "{}", i)?,
            Value::Real(r) => write_real(*r, out)?,
            Value::Name(name) => write_name(name, out),
            Value::String(bytes) => write_string(bytes, out),
            Value::Node(id) => {
                let node = tree.node(*id);
                if let Some(number) = node.object_id {
                    write!(out, "{} 0 R", number)?;
                    return Ok(());
                }
                match &node.kind {
                    NodeKind::Array(items) => self.write_array(tree, items, depth, out)?,
                    NodeKind::Dictionary(dict) => self.write_dict(tree, dict, depth, out)?,
                    NodeKind::Stream { .. } => {
                        return Err(Error::InvalidStructure(
                            "stream reached without an object number".to_string(),
                        ))
                    },
                }
            },
        }
        Ok(())
    }

    fn write_array(&self, tree: &Tree, items: &[Value], depth: u32, out: &mut Vec<u8>) -> Result<()> {
        out.push(b'[');
        for (index, item) in items.iter().enumerate() {
            let lead = if self.pretty() || index > 0 { Lead::Line } else { Lead::None };
            self.write_value(tree, item, depth + 1, lead, out)?;
        }
        write!(out, "{}{}]", self.newline(), self.indent(depth))?;
        Ok(())
    }

    fn write_dict(&self, tree: &Tree, dict: &Dict, depth: u32, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(b"<<");
        for (key, value) in dict {
            self.write_lead(Lead::Line, true, depth + 1, out);
            write_name(key, out);
            self.write_value(tree, value, depth + 1, Lead::Value, out)?;
        }
        write!(out, "{}{}>>", self.newline(), self.indent(depth))?;
        Ok(())
    }
}

/// Reals use the shortest decimal form; NaN and infinities become 0.
fn write_real(value: f64, out: &mut Vec<u8>) -> Result<()> {
    if value.is_finite() {
        write!(out, "{}", value)?;
    } else {
        out.push(b'0');
    }
    Ok(())
}

/// Write `/name`, escaping delimiters, `#` and anything outside `!`..`~`.
///
/// Characters up to U+00FF are written as single bytes so names read from a
/// file come back byte for byte.
pub fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    let mut utf8 = [0u8; 4];
    for ch in name.chars() {
        let bytes: &[u8] = match u8::try_from(u32::from(ch)) {
            Ok(byte) => {
                utf8[0] = byte;
                &utf8[..1]
            },
            Err(_) => ch.encode_utf8(&mut utf8).as_bytes(),
        };
        for &byte in bytes {
            match byte {
                b'#' | b'%' | b'(' | b')' | b'/' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' => {
                    out.extend_from_slice(format!("#{:02X}", byte).as_bytes())
                },
                b'!'..=b'~' => out.push(byte),
                _ => out.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
            }
        }
    }
}

/// Write a string as `( ... )` unless the escaped form is at least twice
/// the raw length, in which case `< ... >` is shorter or equal.
pub fn write_string(bytes: &[u8], out: &mut Vec<u8>) {
    let mut literal = Vec::with_capacity(bytes.len() + 2);
    for &byte in bytes {
        escape_byte(byte, &mut literal);
    }

    if literal.len() < bytes.len() * 2 {
        out.push(b'(');
        out.extend_from_slice(&literal);
        out.push(b')');
    } else {
        out.push(b'<');
        for byte in bytes {
            out.extend_from_slice(format!("{:02x}", byte).as_bytes());
        }
        out.push(b'>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::dict;

    fn render(tree: &Tree, value: &Value) -> String {
        ObjectSerializer::compact().serialize_to_string(tree, value).unwrap()
    }

    #[test]
    fn test_serialize_scalars() {
        let tree = Tree::new();
        assert_eq!(render(&tree, &Value::Null), "null");
        assert_eq!(render(&tree, &Value::Boolean(false)), "false");
        assert_eq!(render(&tree, &Value::Integer(-42)), "-42");
        assert_eq!(render(&tree, &Value::Real(0.5)), "0.5");
        assert_eq!(render(&tree, &Value::Real(2.0)), "2");
        assert_eq!(render(&tree, &Value::Real(f64::NAN)), "0");
    }

    #[test]
    fn test_serialize_name_with_special_chars() {
        let tree = Tree::new();
        assert_eq!(render(&tree, &Value::name("Type")), "/Type");
        assert_eq!(render(&tree, &Value::name("A B#(x)")), "/A#20B#23#28x#29");
        assert_eq!(render(&tree, &Value::name("caf\u{e9}")), "/caf#E9");
    }

    #[test]
    fn test_serialize_string_literal_and_hex() {
        let tree = Tree::new();
        assert_eq!(render(&tree, &Value::string("Hello (World)")), "(Hello \\(World\\))");
        assert_eq!(render(&tree, &Value::string("a\nb")), "(a\\nb)");
        // two control bytes escape to 8 bytes, hex needs 4
        assert_eq!(render(&tree, &Value::string(vec![0x01, 0x02])), "<0102>");
        assert_eq!(render(&tree, &Value::string(Vec::new())), "<>");
        // bytes above 0xA0 are written raw
        let mut out = Vec::new();
        write_string(&[b'x', 0xE9], &mut out);
        assert_eq!(out, b"(x\xE9)");
    }

    #[test]
    fn test_compact_whitespace() {
        let mut tree = Tree::new();
        let arr = tree.alloc_array(vec![
            Value::Integer(0),
            Value::Integer(0),
            Value::name("X"),
            Value::Real(1.5),
        ]);
        let inner = tree.alloc_dict(dict([("K", Value::Boolean(true))]));
        let outer = tree.alloc_dict(dict([
            ("Box", Value::Node(arr)),
            ("Sub", Value::Node(inner)),
            ("N", Value::Integer(3)),
        ]));
        assert_eq!(render(&tree, &Value::Node(outer)), "<</Box[0 0/X 1.5]/Sub<</K true>>/N 3>>");
    }

    #[test]
    fn test_pretty_whitespace() {
        let mut tree = Tree::new();
        let arr = tree.alloc_array(vec![Value::Integer(1), Value::Integer(2)]);
        let d = tree.alloc_dict(dict([("A", Value::Node(arr)), ("B", Value::name("C"))]));
        let s = ObjectSerializer::new(&Indent::Spaces(2), false, 100);
        assert_eq!(
            s.serialize_to_string(&tree, &Value::Node(d)).unwrap(),
            "<<\n  /A [\n    1\n    2\n  ]\n  /B /C\n>>"
        );
    }

    #[test]
    fn test_numbered_node_is_reference() {
        let mut tree = Tree::new();
        let target = tree.alloc_dict(dict([("Type", Value::name("Page"))]));
        tree.node_mut(target).object_id = Some(7);
        let d = tree.alloc_dict(dict([("P", Value::Node(target))]));
        assert_eq!(render(&tree, &Value::Node(d)), "<</P 7 0 R>>");
    }

    #[test]
    fn test_unnumbered_stream_is_error() {
        let mut tree = Tree::new();
        let s = tree.alloc_stream(Dict::new(), bytes::Bytes::new());
        let result = ObjectSerializer::compact().serialize(&tree, &Value::Node(s));
        assert!(matches!(result, Err(Error::InvalidStructure(_))));
    }

    #[test]
    fn test_stream_body_and_length() {
        let mut tree = Tree::new();
        let s = tree.alloc_stream(dict([("Length", Value::Integer(999))]), bytes::Bytes::from_static(b"q Q"));
        tree.node_mut(s).object_id = Some(3);
        let body = ObjectSerializer::compact().serialize_indirect(&tree, s).unwrap();
        assert_eq!(body, b"3 0 obj<</Length 3>>stream\nq Q\nendstream\nendobj\n".to_vec());
    }

    #[test]
    fn test_compression_only_when_smaller() {
        let mut tree = Tree::new();
        let big = tree.alloc_stream(Dict::new(), bytes::Bytes::from(vec![b'a'; 4096]));
        tree.node_mut(big).object_id = Some(1);
        let small = tree.alloc_stream(Dict::new(), bytes::Bytes::from_static(b"BT ET"));
        tree.node_mut(small).object_id = Some(2);

        let s = ObjectSerializer::new(&Indent::Compact, true, 100);
        let big_body = String::from_utf8_lossy(&s.serialize_indirect(&tree, big).unwrap()).into_owned();
        assert!(big_body.contains("/Filter/FlateDecode"));
        let small_body = s.serialize_indirect(&tree, small).unwrap();
        assert_eq!(small_body, b"2 0 obj<</Length 5>>stream\nBT ET\nendstream\nendobj\n".to_vec());
        // the tree keeps the uncompressed payload
        assert_eq!(tree.stream_data(big).map(|d| d.len()), Some(4096));
        assert!(tree.get(big, "Filter").is_none());
    }

    #[test]
    fn test_inline_cycle_hits_depth_guard() {
        let mut tree = Tree::new();
        let a = tree.alloc_dict(Dict::new());
        tree.set(a, "Self", Value::Node(a));
        let s = ObjectSerializer::new(&Indent::Compact, false, 10);
        assert!(matches!(
            s.serialize(&tree, &Value::Node(a)),
            Err(Error::RecursionLimitExceeded(10))
        ));
    }
}
