//! Graph resolution: source objects to tree nodes.
//!
//! Every indirect object is materialized exactly once. The identity cache
//! maps each `(number, generation)` to its node. A reference to a container
//! that has not been seen yet reserves an empty node, is recorded as pending
//! and links to the reserved node straight away; the pending objects are
//! filled from a work list afterwards. Long `/Next` chains and cycles
//! therefore cost no stack, and only direct nesting inside one object
//! counts against the depth limit.

use crate::decoders::is_decodable;
use crate::error::{Error, Result};
use crate::object::{self, Object, ObjectRef, filter_names};
use crate::source::SourceDocument;
use crate::tree::{Dict, NodeId, NodeKind, Tree, Value};
use bytes::Bytes;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum CacheEntry {
    /// Node reserved, contents still on the work list
    Pending(NodeId),
    Resolved(Value),
}

impl CacheEntry {
    fn value(&self) -> Value {
        match self {
            CacheEntry::Pending(id) => Value::Node(*id),
            CacheEntry::Resolved(value) => value.clone(),
        }
    }
}

/// An indirect container waiting to be filled.
struct PendingObject {
    reference: ObjectRef,
    node: NodeId,
    object: Object,
}

/// Materializes a [`SourceDocument`]'s object graph into a [`Tree`].
pub struct Resolver<'a, S: SourceDocument + ?Sized> {
    source: &'a mut S,
    tree: &'a mut Tree,
    cache: HashMap<ObjectRef, CacheEntry>,
    pending: Vec<PendingObject>,
    max_depth: u32,
}

impl<'a, S: SourceDocument + ?Sized> Resolver<'a, S> {
    /// Resolve into `tree`, failing on objects whose direct dictionaries
    /// and arrays nest deeper than `max_depth`.
    pub fn new(source: &'a mut S, tree: &'a mut Tree, max_depth: u32) -> Self {
        Self {
            source,
            tree,
            cache: HashMap::new(),
            pending: Vec::new(),
            max_depth,
        }
    }

    /// Number of distinct indirect objects materialized so far.
    pub fn resolved_count(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a source value and everything reachable from it.
    pub fn resolve(&mut self, obj: &Object) -> Result<Value> {
        let value = self.resolve_value(obj, 0)?;
        self.drain()?;
        Ok(value)
    }

    /// Resolve an indirect object and everything reachable from it.
    pub fn resolve_ref(&mut self, reference: ObjectRef) -> Result<Value> {
        let value = self.resolve_reference(reference)?;
        self.drain()?;
        Ok(value)
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(PendingObject { reference, node, object }) = self.pending.pop() {
            self.fill(node, &object, Some(reference), 0)?;

            let node_ref = self.tree.node_mut(node);
            node_ref.source_ref = Some(reference);
            // arrays are shared by identity but written inline
            if !matches!(node_ref.kind, NodeKind::Array(_)) {
                node_ref.indirect = true;
            }
            self.cache.insert(reference, CacheEntry::Resolved(Value::Node(node)));
        }
        Ok(())
    }

    fn resolve_value(&mut self, obj: &Object, depth: u32) -> Result<Value> {
        let value = match obj {
            Object::Null => Value::Null,
            Object::Boolean(b) => Value::Boolean(*b),
            Object::Integer(i) => Value::Integer(*i),
            Object::Real(r) => Value::Real(*r),
            Object::Name(n) => Value::Name(n.clone()),
            Object::String(s) => Value::String(s.clone()),
            Object::Reference(r) => return self.resolve_reference(*r),
            container => {
                if depth >= self.max_depth {
                    log::warn!("direct objects nested deeper than {}", self.max_depth);
                    return Err(Error::RecursionLimitExceeded(self.max_depth));
                }
                let id = self.tree.reserve();
                self.fill(id, container, None, depth + 1)?;
                Value::Node(id)
            },
        };
        Ok(value)
    }

    /// Look a reference up, following references to references. Containers
    /// come back as their reserved node even before they are filled.
    fn resolve_reference(&mut self, reference: ObjectRef) -> Result<Value> {
        let mut chain = Vec::new();
        let mut current = reference;

        let value = loop {
            if let Some(entry) = self.cache.get(&current) {
                break entry.value();
            }
            if chain.contains(&current) {
                log::warn!("reference loop through {} resolved to null", current);
                break Value::Null;
            }
            chain.push(current);

            let obj = match self.source.fetch(current) {
                Ok(obj) => obj,
                Err(e @ Error::XrefParse(_)) => return Err(e),
                Err(e) => {
                    log::warn!("dangling reference {} resolved to null: {}", current, e);
                    break Value::Null;
                },
            };
            match obj {
                Object::Reference(next) => current = next,
                Object::Array(_) | Object::Dictionary(_) | Object::Stream { .. } => {
                    let node = self.tree.reserve();
                    self.cache.insert(current, CacheEntry::Pending(node));
                    self.pending.push(PendingObject {
                        reference: current,
                        node,
                        object: obj,
                    });
                    break Value::Node(node);
                },
                scalar => break self.resolve_value(&scalar, 0)?,
            }
        };

        for link in chain {
            self.cache.entry(link).or_insert_with(|| CacheEntry::Resolved(value.clone()));
        }
        Ok(value)
    }

    /// Fill the reserved node `id` with a container's contents.
    fn fill(&mut self, id: NodeId, obj: &Object, reference: Option<ObjectRef>, depth: u32) -> Result<()> {
        match obj {
            Object::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.resolve_value(item, depth)?);
                }
                self.tree.node_mut(id).kind = NodeKind::Array(values);
            },
            Object::Dictionary(source_dict) => {
                let dict = self.resolve_dict(source_dict, depth)?;
                self.tree.node_mut(id).kind = NodeKind::Dictionary(dict);
            },
            Object::Stream { dict: source_dict, data } => {
                let dict = self.resolve_dict(source_dict, depth)?;
                self.tree.node_mut(id).kind = NodeKind::Stream {
                    dict,
                    data: Bytes::new(),
                };
                let payload = self.stream_payload(id, source_dict, data, reference);
                if let NodeKind::Stream { data, .. } = &mut self.tree.node_mut(id).kind {
                    *data = payload;
                }
            },
            _ => {},
        }
        Ok(())
    }

    /// Entries that resolve to null are left out, so absent and null read the same.
    fn resolve_dict(&mut self, source_dict: &object::Dict, depth: u32) -> Result<Dict> {
        let mut dict = Dict::with_capacity(source_dict.len());
        for (key, item) in source_dict {
            let value = self.resolve_value(item, depth)?;
            if !value.is_null() {
                dict.insert(key.clone(), value);
            }
        }
        Ok(dict)
    }

    /// Pick the payload for a stream node and fix up its dictionary.
    ///
    /// Non-image streams whose outermost filter is decodable lose that one
    /// layer; everything else keeps the bytes exactly as stored.
    fn stream_payload(
        &mut self,
        id: NodeId,
        source_dict: &object::Dict,
        raw: &Bytes,
        reference: Option<ObjectRef>,
    ) -> Bytes {
        self.tree.remove(id, "Length");

        let is_image = self.tree.get(id, "Subtype").and_then(Value::as_name) == Some("Image");
        let filters = filter_names(source_dict);
        let Some(first) = filters.first() else {
            return raw.clone();
        };
        if is_image || !is_decodable(first) {
            return raw.clone();
        }

        match self.source.decode(source_dict, raw, 1) {
            Ok(decoded) => {
                self.drop_first_filter(id);
                Bytes::from(decoded)
            },
            Err(e) => {
                let label = reference.map_or_else(|| "inline stream".to_string(), |r| r.to_string());
                log::warn!("{}: {} decode failed ({}), keeping stored bytes", label, first, e);
                raw.clone()
            },
        }
    }

    /// Remove the outermost filter and its parameters. Filter arrays may be
    /// shared with other streams, so the remainder goes into a fresh value.
    fn drop_first_filter(&mut self, id: NodeId) {
        for key in ["Filter", "DecodeParms", "DP"] {
            let rest = match self.tree.get(id, key) {
                None => continue,
                Some(Value::Node(list)) => match self.tree.array(*list) {
                    Some(items) => items.iter().skip(1).cloned().collect::<Vec<_>>(),
                    // a parameter dictionary belongs to the single filter
                    None => Vec::new(),
                },
                Some(_) => Vec::new(),
            };

            if rest.iter().all(Value::is_null) {
                self.tree.remove(id, key);
            } else if rest.len() == 1 {
                self.tree.set(id, key, rest[0].clone());
            } else {
                let list = self.tree.alloc_array(rest);
                self.tree.set(id, key, Value::Node(list));
            }
        }
    }
}

/// Resolve a whole document: catalog first, then the info dictionary.
///
/// The catalog and info nodes are always marked indirect, even when the
/// source stores them as direct dictionaries.
pub fn resolve_document<S: SourceDocument + ?Sized>(source: &mut S, max_depth: u32) -> Result<Tree> {
    let mut tree = Tree::new();
    let catalog_ref = source.catalog_ref();
    let direct_catalog = match catalog_ref {
        Some(_) => None,
        None => Some(source.catalog()?),
    };
    let info = source.document_info();

    let mut resolver = Resolver::new(source, &mut tree, max_depth);
    let root = match (catalog_ref, direct_catalog) {
        (Some(r), _) => resolver.resolve_ref(r)?,
        (None, Some(catalog)) => resolver.resolve(&catalog)?,
        (None, None) => Value::Null,
    };
    let info = match info {
        Some(info) => resolver.resolve(&info)?,
        None => Value::Null,
    };
    log::debug!("resolved {} indirect objects", resolver.resolved_count());

    let root = root
        .as_node()
        .filter(|&id| tree.dict(id).is_some())
        .ok_or_else(|| Error::InvalidPdf("document catalog is not a dictionary".to_string()))?;
    tree.node_mut(root).indirect = true;
    tree.set_root(root);

    if let Some(info) = info.as_node().filter(|&id| tree.dict(id).is_some()) {
        tree.node_mut(info).indirect = true;
        tree.set_info(Some(info));
    }
    Ok(tree)
}
