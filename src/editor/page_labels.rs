//! Page-label maintenance for page deletion.
//!
//! `/PageLabels /Nums` is a flat `[index dict index dict ...]` list of label
//! ranges. Deleting pages shifts every later range, so the ranges are
//! expanded to one label per page, the deleted pages are dropped, and the
//! result is folded back into ranges.

use crate::tree::{Dict, NodeId, Tree, Value};

/// Label of a single page: numbering style, prefix and number.
#[derive(Debug, Clone, PartialEq)]
struct PageLabel {
    style: Option<Value>,
    prefix: Option<Value>,
    number: i64,
}

impl PageLabel {
    fn continues(&self, prev: &PageLabel) -> bool {
        self.style == prev.style && self.prefix == prev.prefix && prev.number.checked_add(1) == Some(self.number)
    }
}

struct LabelRange {
    start_page: usize,
    style: Option<Value>,
    prefix: Option<Value>,
    first_number: i64,
}

/// Rewrite `/PageLabels` as if the pages at `deleted` were removed from a
/// document of `page_count` pages.
///
/// Malformed label trees are left untouched: an odd-length `/Nums`, a key
/// that is not a non-negative integer, a value that is not a dictionary, a
/// `/St` that is not a positive integer, or no range starting at page 0.
/// Label numbers that would overflow also leave the labels untouched.
pub fn regenerate_page_labels(tree: &mut Tree, deleted: &[usize], page_count: usize) {
    let Some(labels) = tree.root().and_then(|root| tree.get_node(root, "PageLabels")) else {
        return;
    };
    let Some(nums_id) = tree.get_node(labels, "Nums") else {
        return;
    };
    let Some(nums) = tree.array(nums_id) else {
        return;
    };
    let Some(ranges) = parse_ranges(tree, nums) else {
        log::warn!("skipping malformed /PageLabels");
        return;
    };

    let Some(mut labels_per_page) = expand(&ranges, page_count) else {
        log::warn!("page label numbers overflow, skipping /PageLabels");
        return;
    };
    let mut deleted = deleted.to_vec();
    deleted.sort_unstable();
    deleted.dedup();
    for &index in deleted.iter().rev() {
        if index < labels_per_page.len() {
            labels_per_page.remove(index);
        }
    }

    let mut nums = Vec::new();
    let mut prev: Option<&PageLabel> = None;
    for (index, label) in labels_per_page.iter().enumerate() {
        if !prev.is_some_and(|prev| label.continues(prev)) {
            nums.push(Value::Integer(index as i64));
            nums.push(Value::Node(label_node(tree, label)));
        }
        prev = Some(label);
    }

    if let Some(items) = tree.array_mut(nums_id) {
        *items = nums;
    }
}

fn parse_ranges(tree: &Tree, nums: &[Value]) -> Option<Vec<LabelRange>> {
    if nums.len() % 2 != 0 {
        return None;
    }

    let mut ranges = Vec::with_capacity(nums.len() / 2);
    for pair in nums.chunks(2) {
        let start_page = usize::try_from(pair[0].as_integer()?).ok()?;
        let dict = tree.dict(pair[1].as_node()?)?;
        let first_number = match dict.get("St") {
            None => 1,
            Some(Value::Integer(st)) if *st >= 1 => *st,
            Some(_) => return None,
        };
        ranges.push(LabelRange {
            start_page,
            style: dict.get("S").cloned(),
            prefix: dict.get("P").cloned(),
            first_number,
        });
    }

    ranges.sort_by_key(|range| range.start_page);
    if ranges.first().map(|range| range.start_page) != Some(0) {
        return None;
    }
    Some(ranges)
}

/// One label per page, or `None` when a label number does not fit in `i64`.
fn expand(ranges: &[LabelRange], page_count: usize) -> Option<Vec<PageLabel>> {
    let mut labels = Vec::with_capacity(page_count);
    let mut ranges = ranges.iter().peekable();
    let mut current: Option<&LabelRange> = None;

    for page in 0..page_count {
        while let Some(range) = ranges.next_if(|range| range.start_page <= page) {
            current = Some(range);
        }
        let Some(range) = current else { break };
        let offset = i64::try_from(page - range.start_page).ok()?;
        labels.push(PageLabel {
            style: range.style.clone(),
            prefix: range.prefix.clone(),
            number: range.first_number.checked_add(offset)?,
        });
    }
    Some(labels)
}

fn label_node(tree: &mut Tree, label: &PageLabel) -> NodeId {
    let mut dict = Dict::new();
    dict.insert("St".to_string(), Value::Integer(label.number));
    if let Some(style) = &label.style {
        dict.insert("S".to_string(), style.clone());
    }
    if let Some(prefix) = &label.prefix {
        dict.insert("P".to_string(), prefix.clone());
    }
    let node = tree.alloc_dict(dict);
    tree.node_mut(node).indirect = true;
    node
}
