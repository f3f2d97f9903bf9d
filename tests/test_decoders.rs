//! Stream filters as seen through loading and reassembly.

mod common;

use common::PdfBuilder;
use pdf_assembler::decoders::{DecodeParams, decode_chain, decode_filter, encode_flate, is_decodable};
use pdf_assembler::{AssemblerConfig, Error, PdfAssembler, Value};
use weezl::{BitOrder, encode::Encoder};

/// Load a file whose catalog links one stream under `/Data`.
fn load_stream(dict_entries: &str, data: &[u8]) -> PdfAssembler {
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R /Data 5 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .stream(5, dict_entries, data)
        .trailer("/Root 1 0 R")
        .build();
    PdfAssembler::load(pdf, AssemblerConfig::default()).unwrap()
}

fn stream_of(session: &PdfAssembler) -> (Option<Value>, Vec<u8>) {
    let tree = session.tree();
    let data = tree.get_node(tree.root().unwrap(), "Data").unwrap();
    (tree.get(data, "Filter").cloned(), tree.stream_data(data).unwrap().to_vec())
}

#[test]
fn test_each_filter_decoded_on_load() {
    let text = b"BT /F1 12 Tf (filters) Tj ET".to_vec();
    let lzw = Encoder::with_tiff_size_switch(BitOrder::Msb, 8).encode(&text).unwrap();
    let cases: Vec<(&str, Vec<u8>, Vec<u8>)> = vec![
        ("/Filter /FlateDecode", encode_flate(&text).unwrap(), text.clone()),
        ("/Filter /Fl", encode_flate(&text).unwrap(), text.clone()),
        ("/Filter /LZWDecode", lzw, text.clone()),
        ("/Filter /ASCIIHexDecode", b"68656C6C6F 20776F726C64>".to_vec(), b"hello world".to_vec()),
        ("/Filter /ASCII85Decode", b"<~BOu!rD]j7BEbo7~>".to_vec(), b"hello world".to_vec()),
        ("/Filter /RunLengthDecode", vec![4, b'B', b'T', b' ', b'E', b'T', 128], b"BT ET".to_vec()),
    ];

    for (entries, encoded, expected) in cases {
        let session = load_stream(entries, &encoded);
        let (filter, data) = stream_of(&session);
        assert_eq!(filter, None, "{}", entries);
        assert_eq!(data, expected, "{}", entries);
    }
}

#[test]
fn test_png_predictor_parameters_consumed() {
    // two rows of three bytes, both with the Up filter tag
    let predicted = [2u8, 1, 2, 3, 2, 1, 1, 1];
    let session = load_stream(
        "/Filter /FlateDecode /DecodeParms << /Predictor 12 /Columns 3 >>",
        &encode_flate(&predicted).unwrap(),
    );
    let tree = session.tree();
    let data = tree.get_node(tree.root().unwrap(), "Data").unwrap();
    assert_eq!(&tree.stream_data(data).unwrap()[..], &[1, 2, 3, 2, 3, 4]);
    assert!(tree.get(data, "DecodeParms").is_none());
}

#[test]
fn test_chain_loses_only_outer_layer() {
    let text = b"q 1 0 0 1 0 0 cm Q".to_vec();
    let flate = encode_flate(&text).unwrap();
    let hex: String = flate.iter().map(|b| format!("{:02X}", b)).collect();
    let mut session = load_stream("/Filter [/ASCIIHexDecode /FlateDecode]", format!("{}>", hex).as_bytes());

    let (filter, data) = stream_of(&session);
    assert_eq!(filter, Some(Value::name("FlateDecode")));
    assert_eq!(data, flate);

    // the remaining filter is written untouched and undone on the next load
    let pdf = session.assemble().unwrap();
    let reloaded = PdfAssembler::load(pdf, AssemblerConfig::default()).unwrap();
    let (filter, data) = stream_of(&reloaded);
    assert_eq!(filter, None);
    assert_eq!(data, text);
}

#[test]
fn test_unsupported_filter_kept() {
    let session = load_stream("/Filter /JBIG2Decode", b"\x00\x01\x02");
    let (filter, data) = stream_of(&session);
    assert_eq!(filter, Some(Value::name("JBIG2Decode")));
    assert_eq!(data, b"\x00\x01\x02");
}

#[test]
fn test_decode_api() {
    assert!(is_decodable("AHx"));
    assert!(!is_decodable("DCTDecode"));
    assert!(matches!(
        decode_filter("DCTDecode", b"\xFF\xD8", None),
        Err(Error::UnsupportedFilter(_))
    ));

    let chained = decode_chain(
        b"78 9C 4B 4C 4A 06 00 02 4D 01 27>",
        &["ASCIIHexDecode".to_string(), "FlateDecode".to_string()],
        &[None, Some(DecodeParams::default())],
    )
    .unwrap();
    assert_eq!(chained, b"abc");
}
