//! The editable document tree.
//!
//! Nodes live in an arena owned by [`Tree`] and refer to each other through
//! [`NodeId`]s, so shared objects and cycles (a page pointing at its parent
//! `Pages` node, which lists the page in `/Kids`) need no reference counting.
//! A child slot holds a [`Value`]: either a scalar or a link to another node.

use crate::object::ObjectRef;
use bytes::Bytes;
use indexmap::IndexMap;

/// Index of a node in its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A slot in a dictionary or array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// Name without the leading `/`
    Name(String),
    /// Raw string bytes; escaping happens on output
    String(Vec<u8>),
    /// Link to a dictionary, array or stream node
    Node(NodeId),
}

impl Value {
    /// Name value from anything string-like.
    pub fn name(name: impl Into<String>) -> Self {
        Value::Name(name.into())
    }

    /// String value from raw bytes.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Value::String(bytes.into())
    }

    /// The linked node, if this value is a link.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Integer content.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric content; integers widen to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Name content.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    /// String content.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Dictionary of a tree node, keys without the leading `/`.
pub type Dict = IndexMap<String, Value>;

/// The shape of a container node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `<< ... >>`
    Dictionary(Dict),
    /// `[ ... ]`
    Array(Vec<Value>),
    /// Dictionary plus payload; always written as its own object
    Stream {
        /// Stream dictionary (`/Length` is computed on output)
        dict: Dict,
        /// Payload after any decoding done at load time
        data: Bytes,
    },
}

/// A container node and its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Contents
    pub kind: NodeKind,
    /// Originated as (or must become) an indirect object
    pub indirect: bool,
    /// Number assigned by the last object-ID pass
    pub object_id: Option<u32>,
    /// Where this node came from in the source file
    pub source_ref: Option<ObjectRef>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            indirect: false,
            object_id: None,
            source_ref: None,
        }
    }

    /// Dictionary of a dictionary or stream node.
    pub fn dict(&self) -> Option<&Dict> {
        match &self.kind {
            NodeKind::Dictionary(d) | NodeKind::Stream { dict: d, .. } => Some(d),
            NodeKind::Array(_) => None,
        }
    }

    /// Mutable dictionary of a dictionary or stream node.
    pub fn dict_mut(&mut self) -> Option<&mut Dict> {
        match &mut self.kind {
            NodeKind::Dictionary(d) | NodeKind::Stream { dict: d, .. } => Some(d),
            NodeKind::Array(_) => None,
        }
    }

    /// Whether this node carries a payload.
    pub fn is_stream(&self) -> bool {
        matches!(self.kind, NodeKind::Stream { .. })
    }
}

/// Arena of nodes plus the two trailer entry points.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    info: Option<NodeId>,
    /// Released slots, handed out again by [`Tree::alloc`]
    free: Vec<NodeId>,
    /// Branch nodes built by page grouping, released by the next flatten
    page_branches: Vec<NodeId>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id. Released slots are reused first.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.0] = Node::new(kind);
            return id;
        }
        self.nodes.push(Node::new(kind));
        NodeId(self.nodes.len() - 1)
    }

    /// Give a node's slot back to the arena.
    ///
    /// The caller guarantees nothing links to `id` any more; the id is
    /// handed out again by a later allocation.
    pub fn release(&mut self, id: NodeId) {
        self.nodes[id.0] = Node::new(NodeKind::Dictionary(Dict::new()));
        self.free.push(id);
    }

    /// Number of released slots waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn record_page_branch(&mut self, id: NodeId) {
        self.page_branches.push(id);
    }

    pub(crate) fn take_page_branches(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.page_branches)
    }

    /// Add an empty dictionary to be filled in later.
    pub fn reserve(&mut self) -> NodeId {
        self.alloc(NodeKind::Dictionary(Dict::new()))
    }

    /// Add a dictionary node.
    pub fn alloc_dict(&mut self, dict: Dict) -> NodeId {
        self.alloc(NodeKind::Dictionary(dict))
    }

    /// Add an array node.
    pub fn alloc_array(&mut self, items: Vec<Value>) -> NodeId {
        self.alloc(NodeKind::Array(items))
    }

    /// Add a stream node.
    pub fn alloc_stream(&mut self, dict: Dict, data: impl Into<Bytes>) -> NodeId {
        self.alloc(NodeKind::Stream {
            dict,
            data: data.into(),
        })
    }

    /// Number of slots in the arena, orphans and released slots included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// All node ids, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// The document catalog.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Set the document catalog.
    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// The document information dictionary.
    pub fn info(&self) -> Option<NodeId> {
        self.info
    }

    /// Set or clear the document information dictionary.
    pub fn set_info(&mut self, info: Option<NodeId>) {
        self.info = info;
    }

    /// Dictionary of a dictionary or stream node.
    pub fn dict(&self, id: NodeId) -> Option<&Dict> {
        self.node(id).dict()
    }

    /// Mutable dictionary of a dictionary or stream node.
    pub fn dict_mut(&mut self, id: NodeId) -> Option<&mut Dict> {
        self.node_mut(id).dict_mut()
    }

    /// Items of an array node.
    pub fn array(&self, id: NodeId) -> Option<&Vec<Value>> {
        match &self.node(id).kind {
            NodeKind::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Mutable items of an array node.
    pub fn array_mut(&mut self, id: NodeId) -> Option<&mut Vec<Value>> {
        match &mut self.node_mut(id).kind {
            NodeKind::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary entry of a dictionary or stream node.
    pub fn get(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.dict(id)?.get(key)
    }

    /// Linked node under `key`.
    pub fn get_node(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.get(id, key).and_then(Value::as_node)
    }

    /// Set a dictionary entry. Ignored on array nodes.
    pub fn set(&mut self, id: NodeId, key: &str, value: Value) {
        if let Some(dict) = self.dict_mut(id) {
            dict.insert(key.to_string(), value);
        }
    }

    /// Remove a dictionary entry, keeping the order of the rest.
    pub fn remove(&mut self, id: NodeId, key: &str) -> Option<Value> {
        self.dict_mut(id)?.shift_remove(key)
    }

    /// The `/Type` name of a dictionary or stream node.
    pub fn type_name(&self, id: NodeId) -> Option<&str> {
        self.get(id, "Type").and_then(Value::as_name)
    }

    /// Payload of a stream node.
    pub fn stream_data(&self, id: NodeId) -> Option<&Bytes> {
        match &self.node(id).kind {
            NodeKind::Stream { data, .. } => Some(data),
            _ => None,
        }
    }

    /// The root `Pages` node (`/Root /Pages`).
    pub fn pages_root(&self) -> Option<NodeId> {
        self.get_node(self.root?, "Pages")
    }

    /// Direct kids of the root `Pages` node, which after flattening is the
    /// ordered page list.
    pub fn page_list(&self) -> Vec<NodeId> {
        self.pages_root()
            .and_then(|pages| self.get_node(pages, "Kids"))
            .and_then(|kids| self.array(kids))
            .map(|items| items.iter().filter_map(Value::as_node).collect())
            .unwrap_or_default()
    }

    /// Items of the array linked under `key`, or the single linked node
    /// when the entry is not an array (as `/Contents` may be).
    pub fn node_list(&self, id: NodeId, key: &str) -> Vec<NodeId> {
        let Some(target) = self.get_node(id, key) else {
            return Vec::new();
        };
        match self.array(target) {
            Some(items) => items.iter().filter_map(Value::as_node).collect(),
            None => vec![target],
        }
    }
}

/// Build a tree dictionary from `(key, value)` pairs.
pub fn dict<const N: usize>(entries: [(&str, Value); N]) -> Dict {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
