//! Page edits on loaded documents, checked after reassembly.

mod common;

use common::{PdfBuilder, simple_pdf};
use pdf_assembler::{AssemblerConfig, Error, PdfAssembler, Value};

fn reload(session: &mut PdfAssembler) -> PdfAssembler {
    let pdf = session.assemble().unwrap();
    PdfAssembler::load(pdf, AssemblerConfig::default()).unwrap()
}

fn tags(session: &mut PdfAssembler) -> Vec<i64> {
    let pages = session.pages().unwrap();
    pages
        .iter()
        .map(|&page| session.tree().get(page, "Tag").and_then(Value::as_integer).unwrap())
        .collect()
}

/// Five tagged pages, roman-numbered front matter (i, ii) then 1, 2, 3,
/// and an outline entry pointing at page 3.
fn labelled_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new()
        .object(
            1,
            "<< /Type /Catalog /Pages 2 0 R /PageLabels << /Nums [0 3 0 R 2 4 0 R] >> /Outlines 5 0 R >>",
        )
        .object(2, "<< /Type /Pages /Kids [10 0 R 11 0 R 12 0 R 13 0 R 14 0 R] /Count 5 >>")
        .object(3, "<< /S /r >>")
        .object(4, "<< /S /D /P (Ch-) >>")
        .object(5, "<< /Type /Outlines /First 6 0 R /Last 6 0 R /Count 1 >>")
        .object(6, "<< /Title (Third page) /Parent 5 0 R /Dest [12 0 R /XYZ 0 792 0] >>")
        .trailer("/Root 1 0 R");
    for i in 0..5 {
        builder = builder.object(10 + i, &format!("<< /Type /Page /Parent 2 0 R /Tag {} >>", i));
    }
    builder.build()
}

/// `(start page, style, prefix, first number)` of each label range.
fn label_ranges(session: &PdfAssembler) -> Vec<(i64, String, Option<Vec<u8>>, i64)> {
    let tree = session.tree();
    let labels = tree.get_node(tree.root().unwrap(), "PageLabels").unwrap();
    let nums = tree.array(tree.get_node(labels, "Nums").unwrap()).unwrap();
    nums.chunks(2)
        .map(|pair| {
            let label = pair[1].as_node().unwrap();
            (
                pair[0].as_integer().unwrap(),
                tree.get(label, "S").and_then(Value::as_name).unwrap().to_string(),
                tree.get(label, "P").and_then(Value::as_string).map(<[u8]>::to_vec),
                tree.get(label, "St").and_then(Value::as_integer).unwrap_or(1),
            )
        })
        .collect()
}

#[test]
fn test_delete_pages_updates_labels_and_links() {
    let mut session = PdfAssembler::load(labelled_pdf(), AssemblerConfig::default()).unwrap();
    session.delete_pages(&[2, 0, 2]).unwrap();

    let mut reloaded = reload(&mut session);
    assert_eq!(tags(&mut reloaded), vec![1, 3, 4]);
    assert_eq!(
        label_ranges(&reloaded),
        vec![
            (0, "r".to_string(), None, 2),
            (1, "D".to_string(), Some(b"Ch-".to_vec()), 2),
        ]
    );

    let pages = reloaded.pages().unwrap();
    let tree = reloaded.tree();
    let outlines = tree.get_node(tree.root().unwrap(), "Outlines").unwrap();
    let entry = tree.get_node(outlines, "First").unwrap();
    let dest = tree.array(tree.get_node(entry, "Dest").unwrap()).unwrap();
    assert_eq!(dest[0], Value::Node(pages[0]));
}

#[test]
fn test_delete_pages_with_overflowing_labels() {
    let pdf = simple_pdf(3)
        .object(
            1,
            "<< /Type /Catalog /Pages 2 0 R /PageLabels << /Nums [0 << /S /D /St 9223372036854775807 >>] >> >>",
        )
        .build();
    let mut session = PdfAssembler::load(pdf, AssemblerConfig::default()).unwrap();
    session.delete_pages(&[1]).unwrap();

    // the labels are kept as they were
    let mut reloaded = reload(&mut session);
    assert_eq!(label_ranges(&reloaded), vec![(0, "D".to_string(), None, i64::MAX)]);
    assert_eq!(reloaded.count_pages().unwrap(), 2);
}

#[test]
fn test_delete_every_page_fails_without_changes() {
    let mut session = PdfAssembler::load(simple_pdf(3).build(), AssemblerConfig::default()).unwrap();
    let err = session.delete_pages(&[0, 1, 2]).unwrap_err();
    assert!(matches!(err, Error::LastPageRemoval));
    assert_eq!(err.to_string(), "At least one page must remain");
    assert_eq!(session.count_pages().unwrap(), 3);
}

#[test]
fn test_delete_out_of_range() {
    let mut session = PdfAssembler::load(simple_pdf(3).build(), AssemblerConfig::default()).unwrap();
    assert!(matches!(
        session.delete_pages(&[1, 3]),
        Err(Error::PageOutOfRange { index: 3, count: 3 })
    ));
    assert_eq!(session.count_pages().unwrap(), 3);
}

#[test]
fn test_rotate_pages_round_trip() {
    let mut session = PdfAssembler::load(labelled_pdf(), AssemblerConfig::default()).unwrap();
    session.rotate_pages(&[0, 4], 90).unwrap();
    session.rotate_pages(&[4], 360).unwrap();
    session.rotate_pages(&[4], 270).unwrap();
    assert!(matches!(session.rotate_pages(&[1], 30), Err(Error::InvalidRotation(30))));

    let mut reloaded = reload(&mut session);
    let pages = reloaded.pages().unwrap();
    let rotate = |i: usize| reloaded.tree().get(pages[i], "Rotate").and_then(Value::as_integer);
    assert_eq!(rotate(0), Some(90));
    assert_eq!(rotate(1), None);
    assert_eq!(rotate(4), Some(0));
}

#[test]
fn test_add_page_and_append_content() {
    let mut session = PdfAssembler::load(simple_pdf(1).build(), AssemblerConfig::default()).unwrap();
    let index = session.add_page(Some([0.0, 0.0, 420.0, 595.0])).unwrap();
    session.append_content(index, &b"0 0 1 rg 0 0 100 100 re f"[..]).unwrap();
    session.append_content(index, &b"1 0 0 rg 50 50 10 10 re f"[..]).unwrap();

    let mut reloaded = reload(&mut session);
    assert_eq!(reloaded.count_pages().unwrap(), 2);
    let page = reloaded.pages().unwrap()[1];
    let tree = reloaded.tree();

    let media = tree.array(tree.get_node(page, "MediaBox").unwrap()).unwrap();
    assert_eq!(media[3], Value::Integer(595));

    let contents = tree.node_list(page, "Contents");
    assert_eq!(contents.len(), 3);
    assert!(tree.stream_data(contents[0]).unwrap().is_empty());
    assert_eq!(&tree.stream_data(contents[2]).unwrap()[..], b"1 0 0 rg 50 50 10 10 re f");
}

#[test]
fn test_remove_root_entries_round_trip() {
    let mut session = PdfAssembler::load(labelled_pdf(), AssemblerConfig::default()).unwrap();
    session.remove_root_entries(&[]).unwrap();

    let reloaded = reload(&mut session);
    let tree = reloaded.tree();
    let keys: Vec<&str> = tree.dict(tree.root().unwrap()).unwrap().keys().map(String::as_str).collect();
    // /Version is set on every assemble
    assert_eq!(keys, vec!["Type", "Pages", "Version"]);
}
