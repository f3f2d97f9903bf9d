//! Page-tree normalization.
//!
//! [`flatten`] turns any nesting of `Pages` nodes into a single level under
//! the root `Pages` node, copying inherited attributes onto each page.
//! [`group`] goes the other way and re-nests the flat list into a balanced
//! tree whose nodes have at most `group_size` kids.
//!
//! Both directions keep the root's `/Kids` array node and recycle the
//! branch nodes built by [`group`], so repeated edits and writes do not
//! grow the arena.

use crate::error::{Error, Result};
use crate::tree::{Dict, NodeId, Tree, Value, dict};
use std::collections::HashSet;

/// Attributes a page inherits from its ancestors.
pub const INHERITABLE_ATTRIBUTES: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Deepest page-tree nesting accepted by [`flatten`].
const MAX_PAGE_TREE_DEPTH: u32 = 256;

fn pages_root(tree: &Tree) -> Result<NodeId> {
    tree.pages_root()
        .filter(|&id| tree.dict(id).is_some())
        .ok_or_else(|| Error::InvalidStructure("catalog has no /Pages dictionary".to_string()))
}

/// Flatten the page tree and return the ordered page list.
///
/// Inherited attributes are resolved once: an ancestor's value is copied onto
/// every page below it that lacks the attribute, then removed from the
/// ancestor. Afterwards `/Root /Pages /Kids` lists every page directly, each
/// page's `/Parent` is the root `Pages` node, and `/Count` is the page count.
pub fn flatten(tree: &mut Tree) -> Result<Vec<NodeId>> {
    let root = pages_root(tree)?;
    let mut visited = HashSet::new();
    visited.insert(root);
    let pages = collect_kids(tree, root, &mut visited, 0)?;
    set_page_list(tree, &pages)?;

    // branches from the last grouping are unlinked now
    for branch in tree.take_page_branches() {
        tree.release(branch);
    }
    Ok(pages)
}

/// Make `pages` the direct kids of the root `Pages` node, updating `/Count`
/// and each page's `/Parent`.
pub fn set_page_list(tree: &mut Tree, pages: &[NodeId]) -> Result<()> {
    let root = pages_root(tree)?;
    set_kids(tree, root, pages.iter().map(|&p| Value::Node(p)).collect());
    tree.set(root, "Count", Value::Integer(pages.len() as i64));
    for &page in pages {
        tree.set(page, "Parent", Value::Node(root));
    }
    Ok(())
}

/// Replace the items of `parent`'s `/Kids` array, reusing the array node
/// when there is one.
fn set_kids(tree: &mut Tree, parent: NodeId, kids: Vec<Value>) {
    if let Some(items) = tree.get_node(parent, "Kids").and_then(|id| tree.array_mut(id)) {
        *items = kids;
        return;
    }
    let kids = tree.alloc_array(kids);
    tree.set(parent, "Kids", Value::Node(kids));
}

fn collect_kids(tree: &mut Tree, parent: NodeId, visited: &mut HashSet<NodeId>, depth: u32) -> Result<Vec<NodeId>> {
    if depth > MAX_PAGE_TREE_DEPTH {
        return Err(Error::RecursionLimitExceeded(MAX_PAGE_TREE_DEPTH));
    }

    let mut pages = Vec::new();
    for kid in tree.node_list(parent, "Kids") {
        if tree.dict(kid).is_none() {
            log::warn!("dropping page-tree kid that is not a dictionary");
            continue;
        }
        if !visited.insert(kid) {
            log::warn!("page-tree node reached twice, skipping repeat");
            continue;
        }
        let is_branch = tree
            .get_node(kid, "Kids")
            .map_or(false, |kids| tree.array(kids).is_some());
        if is_branch {
            pages.extend(collect_kids(tree, kid, visited, depth + 1)?);
        } else {
            pages.push(kid);
        }
    }

    // push this node's own attributes down, nearer ancestors already applied
    for attribute in INHERITABLE_ATTRIBUTES {
        let Some(value) = tree.get(parent, attribute).cloned() else {
            continue;
        };
        for &page in &pages {
            if tree.get(page, attribute).is_none() {
                tree.set(page, attribute, value.clone());
            }
        }
        tree.remove(parent, attribute);
    }

    Ok(pages)
}

/// Re-nest `pages` under the root `Pages` node.
///
/// With at most `group_size` pages they are attached directly. Otherwise the
/// list is split into `ceil(len / group_size)` branches of `group_size`
/// pages, or, once the list is longer than `group_size²`, into `group_size`
/// branches of `ceil(len / group_size)` pages, recursing until every branch
/// fits. Sizes below 2 are raised to 2.
pub fn group(tree: &mut Tree, pages: &[NodeId], group_size: usize) -> Result<()> {
    let root = pages_root(tree)?;
    let size = if group_size < 2 {
        log::warn!("page group size {} raised to 2", group_size);
        2
    } else {
        group_size
    };

    let kids = build_level(tree, root, pages, size);
    set_kids(tree, root, kids);
    tree.set(root, "Count", Value::Integer(pages.len() as i64));
    Ok(())
}

fn build_level(tree: &mut Tree, parent: NodeId, pages: &[NodeId], size: usize) -> Vec<Value> {
    if pages.len() <= size {
        return pages.iter().map(|&page| attach(tree, page, parent)).collect();
    }

    let mut branch_size = size;
    if pages.len() > size * size {
        branch_size = pages.len().div_ceil(size);
    }

    let mut kids = Vec::new();
    for branch in pages.chunks(branch_size) {
        if let [page] = branch {
            kids.push(attach(tree, *page, parent));
            continue;
        }
        let node = tree.alloc_dict(dict([
            ("Type", Value::name("Pages")),
            ("Parent", Value::Node(parent)),
            ("Count", Value::Integer(branch.len() as i64)),
        ]));
        tree.node_mut(node).indirect = true;
        let grandkids = build_level(tree, node, branch, size);
        let grandkids = tree.alloc_array(grandkids);
        tree.set(node, "Kids", Value::Node(grandkids));
        tree.record_page_branch(node);
        tree.record_page_branch(grandkids);
        kids.push(Value::Node(node));
    }
    kids
}

fn attach(tree: &mut Tree, page: NodeId, parent: NodeId) -> Value {
    tree.set(page, "Parent", Value::Node(parent));
    tree.node_mut(page).indirect = true;
    Value::Node(page)
}

/// Attributes a page ends up with after [`flatten`], for comparisons.
pub fn effective_attributes(tree: &Tree, page: NodeId) -> Dict {
    INHERITABLE_ATTRIBUTES
        .iter()
        .filter_map(|&key| tree.get(page, key).map(|v| (key.to_string(), v.clone())))
        .collect()
}
