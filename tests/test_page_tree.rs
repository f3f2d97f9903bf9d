//! Page-tree flattening and regrouping.

mod common;

use common::PdfBuilder;
use pdf_assembler::page_tree::{effective_attributes, flatten, group};
use pdf_assembler::tree::dict;
use pdf_assembler::{AssemblerConfig, NodeId, PdfAssembler, Tree, Value};
use proptest::prelude::*;

/// Catalog and one `Pages` node holding `count` tagged pages.
fn flat_tree(count: usize) -> (Tree, Vec<NodeId>) {
    let mut tree = Tree::new();
    let pages_root = tree.alloc_dict(dict([("Type", Value::name("Pages"))]));
    let pages: Vec<NodeId> = (0..count)
        .map(|i| {
            tree.alloc_dict(dict([
                ("Type", Value::name("Page")),
                ("Parent", Value::Node(pages_root)),
                ("Tag", Value::Integer(i as i64)),
            ]))
        })
        .collect();
    let kids = tree.alloc_array(pages.iter().map(|&p| Value::Node(p)).collect());
    tree.set(pages_root, "Kids", Value::Node(kids));
    let root = tree.alloc_dict(dict([("Type", Value::name("Catalog")), ("Pages", Value::Node(pages_root))]));
    tree.set_root(root);
    (tree, pages)
}

/// Check `/Count`, `/Parent` and fan-out below `node`; returns the leaf count.
fn check_branch(tree: &Tree, node: NodeId, size: usize, depth: usize) -> usize {
    assert!(depth < 64, "page tree too deep");
    let kids = tree.node_list(node, "Kids");
    assert!(kids.len() <= size.max(2), "{} kids with group size {}", kids.len(), size);

    let mut leaves = 0;
    for kid in kids {
        assert_eq!(tree.get_node(kid, "Parent"), Some(node));
        if tree.type_name(kid) == Some("Pages") {
            leaves += check_branch(tree, kid, size, depth + 1);
        } else {
            leaves += 1;
        }
    }
    assert_eq!(tree.get(node, "Count"), Some(&Value::Integer(leaves as i64)));
    leaves
}

proptest! {
    #[test]
    fn group_then_flatten_restores_order(count in 1usize..300, size in 0usize..20) {
        let (mut tree, pages) = flat_tree(count);
        group(&mut tree, &pages, size).unwrap();

        let pages_root = tree.pages_root().unwrap();
        let leaves = check_branch(&tree, pages_root, size, 0);
        prop_assert_eq!(leaves, count);

        let flattened = flatten(&mut tree).unwrap();
        prop_assert_eq!(&flattened, &pages);
        prop_assert_eq!(tree.node_list(pages_root, "Kids"), pages);
    }

    #[test]
    fn flatten_is_idempotent(count in 1usize..50) {
        let (mut tree, pages) = flat_tree(count);
        let first = flatten(&mut tree).unwrap();
        let second = flatten(&mut tree).unwrap();
        prop_assert_eq!(&first, &pages);
        prop_assert_eq!(first, second);
    }
}

fn nested_pdf() -> Vec<u8> {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 3 /MediaBox [0 0 612 792] /Rotate 90 >>",
        )
        .object(3, "<< /Type /Page /Parent 2 0 R >>")
        .object(4, "<< /Type /Pages /Parent 2 0 R /Kids [5 0 R 6 0 R] /Count 2 /Rotate 180 /CropBox [10 10 600 780] >>")
        .object(5, "<< /Type /Page /Parent 4 0 R >>")
        .object(6, "<< /Type /Page /Parent 4 0 R /Rotate 270 /MediaBox [0 0 100 100] >>")
        .trailer("/Root 1 0 R")
        .build()
}

fn rotations(session: &mut PdfAssembler) -> Vec<i64> {
    let pages = session.pages().unwrap();
    pages
        .iter()
        .map(|&page| {
            effective_attributes(session.tree(), page)
                .get("Rotate")
                .and_then(Value::as_integer)
                .unwrap()
        })
        .collect()
}

#[test]
fn test_inherited_attributes_pushed_down() {
    let mut session = PdfAssembler::load(nested_pdf(), AssemblerConfig::default()).unwrap();
    assert_eq!(rotations(&mut session), vec![90, 180, 270]);

    let pages = session.pages().unwrap();
    let tree = session.tree();
    let media_width = |page| {
        let media = tree.get_node(page, "MediaBox").unwrap();
        tree.array(media).unwrap()[2].as_integer().unwrap()
    };
    assert_eq!(media_width(pages[0]), 612);
    assert_eq!(media_width(pages[1]), 612);
    assert_eq!(media_width(pages[2]), 100);

    assert!(tree.get(pages[0], "CropBox").is_none());
    assert!(tree.get(pages[1], "CropBox").is_some());

    let pages_root = tree.pages_root().unwrap();
    assert!(tree.get(pages_root, "Rotate").is_none());
    assert!(tree.get(pages_root, "MediaBox").is_none());
    assert_eq!(tree.get(pages_root, "Count"), Some(&Value::Integer(3)));
}

#[test]
fn test_inherited_attributes_survive_reassembly() {
    let mut session = PdfAssembler::load(nested_pdf(), AssemblerConfig::default()).unwrap();
    let pdf = session.assemble().unwrap();
    let mut reloaded = PdfAssembler::load(pdf, AssemblerConfig::default()).unwrap();
    assert_eq!(rotations(&mut reloaded), vec![90, 180, 270]);
}

#[test]
fn test_malformed_kids_dropped() {
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R 42 (junk) 2 0 R 3 0 R] /Count 9 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R >>")
        .trailer("/Root 1 0 R")
        .build();
    let mut session = PdfAssembler::load(pdf, AssemblerConfig::default()).unwrap();
    assert_eq!(session.count_pages().unwrap(), 1);
}
