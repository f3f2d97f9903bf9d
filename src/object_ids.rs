//! Object-number assignment.
//!
//! Run right before every write. Numbers from an earlier pass are discarded,
//! so edits between two writes renumber deterministically, and nodes no
//! longer reachable from the catalog or info dictionary get no number and
//! are left out of the file.

use crate::tree::{NodeId, NodeKind, Tree, Value};
use std::collections::HashSet;

/// `/Type` values that are always written as indirect objects.
pub const ALWAYS_INDIRECT_TYPES: [&str; 10] = [
    "AcroForm",
    "MarkInfo",
    "Metadata",
    "Names",
    "Outlines",
    "StructTreeRoot",
    "ViewerPreferences",
    "Catalog",
    "Pages",
    "OCG",
];

/// Number every node that must become its own object.
///
/// Nodes are visited depth first from the catalog, each at most once, in
/// dictionary-key and array order. Dictionaries are numbered when they are
/// marked indirect or carry a `/Type` from [`ALWAYS_INDIRECT_TYPES`]; streams
/// always are; arrays never. The info dictionary is numbered after the
/// catalog's graph unless it is empty. Returns the highest number assigned.
pub fn reset_object_ids(tree: &mut Tree) -> u32 {
    for id in tree.ids().collect::<Vec<_>>() {
        tree.node_mut(id).object_id = None;
    }

    let mut visited = HashSet::new();
    let mut next = 1u32;

    if let Some(root) = tree.root() {
        number_from(tree, root, &mut visited, &mut next, true);
    }
    // an empty info dictionary is left out of the file
    let info = tree.info().filter(|&id| tree.dict(id).map_or(false, |d| !d.is_empty()));
    if let Some(info) = info {
        number_from(tree, info, &mut visited, &mut next, true);
    }

    let count = next - 1;
    log::debug!("assigned {} object numbers", count);
    count
}

fn number_from(tree: &mut Tree, start: NodeId, visited: &mut HashSet<NodeId>, next: &mut u32, force: bool) {
    // explicit stack so deep trees cannot exhaust the call stack
    let mut stack = vec![(start, force)];

    while let Some((id, force)) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }

        let node = tree.node(id);
        let wants_number = match &node.kind {
            NodeKind::Array(_) => false,
            NodeKind::Stream { .. } => true,
            NodeKind::Dictionary(dict) => {
                force
                    || node.indirect
                    || dict
                        .get("Type")
                        .and_then(Value::as_name)
                        .map_or(false, |t| ALWAYS_INDIRECT_TYPES.contains(&t))
            },
        };

        let children: Vec<NodeId> = match &node.kind {
            NodeKind::Array(items) => items.iter().filter_map(Value::as_node).collect(),
            NodeKind::Dictionary(dict) | NodeKind::Stream { dict, .. } => {
                dict.values().filter_map(Value::as_node).collect()
            },
        };

        if wants_number {
            tree.node_mut(id).object_id = Some(*next);
            *next += 1;
        }

        // reversed so the first child is numbered first
        for child in children.into_iter().rev() {
            if !visited.contains(&child) {
                stack.push((child, false));
            }
        }
    }
}
