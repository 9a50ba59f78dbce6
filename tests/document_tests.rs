mod test_schema;

pub mod document_tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use ebml_tree::specs::ebml_header::EBML;
    use ebml_tree::specs::ElementKey;
    use ebml_tree::{encode_document_to_vec, Document, DocumentOptions, EbmlSize, ElementWriter, Value};

    use super::test_schema::*;

    fn sample() -> Value {
        let date = NaiveDate::from_ymd_opt(2020, 5, 17).unwrap().and_hms_opt(12, 30, 0).unwrap();
        Value::master([
            ("Segment", Value::master([
                ("Info", Value::master([
                    ("TimecodeScale", Value::from(1_000_000u64)),
                    ("Title", Value::from("hello")),
                    ("DateUTC", Value::from(date)),
                    ("Duration", Value::from(1234.5f64)),
                ])),
                ("Cluster", Value::Multiple(vec![
                    Value::master([
                        ("Timecode", Value::from(0u64)),
                        ("SimpleBlock", Value::Multiple(vec![Value::from(vec![1u8, 2, 3]), Value::from(vec![4u8])])),
                    ]),
                    Value::master([
                        ("Timecode", Value::from(40u64)),
                        ("SimpleBlock", Value::Multiple(vec![Value::from(vec![5u8])])),
                    ]),
                ])),
            ])),
        ])
    }

    #[test]
    pub fn header_bytes() {
        let schema = test_schema();
        let value = Value::master([("EBML", Value::master([("EBMLVersion", Value::from(16u64))]))]);
        let bytes = encode_document_to_vec(&schema, &value, false).expect("Test shouldn't error");
        assert_eq!(vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x10], bytes);

        let document = Document::open_with(schema, Cursor::new(bytes), DocumentOptions { headers: true }).expect("Test shouldn't error");
        assert_eq!(value, document.dump().expect("Test shouldn't error"));
        assert_eq!(Some(&Value::master([("EBMLVersion", Value::from(16u64))])), document.info());
        assert_eq!(None, document.doc_type());
    }

    #[test]
    pub fn write_read_document() {
        let schema = test_schema();
        let bytes = encode_document_to_vec(&schema, &sample(), true).expect("Test shouldn't error");
        let document = Document::from_bytes(schema, bytes).expect("Test shouldn't error");

        assert_eq!("test", document.name());
        assert_eq!(Some("test"), document.doc_type());
        assert_eq!(Some(2), document.version());
        assert_eq!(1, document.len().expect("Test shouldn't error"));
        assert_eq!(sample(), document.dump().expect("Test shouldn't error"));
        assert!(document.verify().is_ok());
    }

    #[test]
    pub fn header_is_skipped_unless_asked_for() {
        let schema = test_schema();
        let bytes = encode_document_to_vec(&schema, &sample(), true).expect("Test shouldn't error");

        let document = Document::from_bytes(Arc::clone(&schema), bytes.clone()).expect("Test shouldn't error");
        let segment = &document.children().expect("Test shouldn't error")[0];
        assert_eq!("Segment", segment.name());
        // 1A 45 DF A3 97, then 23 bytes of header children
        assert_eq!(28, segment.offset());

        let document = Document::open_with(schema, Cursor::new(bytes), DocumentOptions { headers: true }).expect("Test shouldn't error");
        let children = document.children().expect("Test shouldn't error");
        assert_eq!(2, children.len());
        assert_eq!(EBML, children[0].id());
        assert_eq!(0, children[0].offset());
        assert_eq!(Some("test"), document.info().and_then(|info| info.get("DocType")).and_then(Value::as_str));
    }

    #[test]
    pub fn navigate_children() {
        let schema = test_schema();
        let bytes = encode_document_to_vec(&schema, &sample(), false).expect("Test shouldn't error");
        let document = Document::from_bytes(schema, bytes).expect("Test shouldn't error");
        assert!(document.info().is_none());

        let segment = &document.children().expect("Test shouldn't error")[0];
        assert_eq!(3, segment.len().expect("Test shouldn't error"));

        let names: Vec<String> = segment.iter().map(|c| c.expect("Test shouldn't error").name().to_string()).collect();
        assert_eq!(vec!["Info", "Cluster", "Cluster"], names);

        let info = &segment.children().expect("Test shouldn't error")[0];
        let title = &info.children().expect("Test shouldn't error")[1];
        assert_eq!(TITLE, title.id());
        assert_eq!(Some("hello"), title.value().expect("Test shouldn't error").as_scalar().and_then(Value::as_str));
        assert_eq!(5, title.size().expect("Test shouldn't error"));
        assert_eq!(title.payload_offset() + 5, title.end().expect("Test shouldn't error"));
        assert_eq!(vec![0x7B, 0xA9, 0x85, b'h', b'e', b'l', b'l', b'o'], title.raw().expect("Test shouldn't error"));
        assert!(title.children().is_err());
        assert!(title.len().is_err());
        assert_eq!(0, title.iter().count());
    }

    #[test]
    pub fn unknown_size_master_ends_at_invalid_child() {
        let schema = test_schema();
        let mut bytes = Vec::new();
        let mut writer = ElementWriter::new(&mut bytes, Arc::clone(&schema));
        writer.start_open_ended_master(&ElementKey::Id(SEGMENT)).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(CLUSTER), &Value::master([("Timecode", Value::from(0u64))])).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(CLUSTER), &Value::master([("Timecode", Value::from(40u64))])).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(EBML), &Value::master([("EBMLVersion", Value::from(1u64))])).expect("Test shouldn't error");
        drop(writer);

        let (reader, reads) = CountingReader::new(bytes);
        let document = Document::open(schema, reader).expect("Test shouldn't error");
        let root = document.root();
        let segment = root.iter().next().expect("Segment should be present").expect("Test shouldn't error");
        assert_eq!(EbmlSize::Unknown, segment.declared_size());
        assert_eq!(5, segment.header_len());

        assert_eq!(2, segment.len().expect("Test shouldn't error"));
        let reads_after_scan = reads.get();
        assert_eq!(2, segment.len().expect("Test shouldn't error"));
        let size = segment.size().expect("Test shouldn't error");
        assert_eq!(reads_after_scan, reads.get());

        let children = document.children().expect("Test shouldn't error");
        assert_eq!(2, children.len());
        assert_eq!(EBML, children[1].id());
        assert_eq!(children[1].offset(), segment.payload_offset() + size);
    }

    #[test]
    pub fn unknown_size_master_ends_at_end_of_source() {
        let schema = test_schema();
        let mut bytes = Vec::new();
        let mut writer = ElementWriter::new(&mut bytes, Arc::clone(&schema));
        writer.start_open_ended_master(&ElementKey::Id(SEGMENT)).expect("Test shouldn't error");
        writer.start_open_ended_master(&ElementKey::Id(CLUSTER)).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(TIMECODE), &Value::from(0u64)).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(SIMPLE_BLOCK), &Value::from(vec![1u8, 2])).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(CLUSTER), &Value::master([("Timecode", Value::from(40u64))])).expect("Test shouldn't error");
        drop(writer);

        let total = bytes.len() as u64;
        let document = Document::from_bytes(schema, bytes).expect("Test shouldn't error");
        let segment = &document.children().expect("Test shouldn't error")[0];
        assert_eq!(total, segment.end().expect("Test shouldn't error"));

        let clusters = segment.children().expect("Test shouldn't error");
        assert_eq!(2, clusters.len());
        assert_eq!(EbmlSize::Unknown, clusters[0].declared_size());
        assert_eq!(2, clusters[0].len().expect("Test shouldn't error"));
        assert_eq!(clusters[1].offset(), clusters[0].end().expect("Test shouldn't error"));
    }

    #[test]
    pub fn unknown_elements_are_kept() {
        let schema = test_schema();
        let mut bytes = Vec::new();
        let mut writer = ElementWriter::new(&mut bytes, Arc::clone(&schema));
        writer.start_master(&ElementKey::Id(SEGMENT)).expect("Test shouldn't error");
        writer.write_raw(0x4321, &[1, 2]).expect("Test shouldn't error");
        writer.end_master(&ElementKey::Id(SEGMENT)).expect("Test shouldn't error");
        drop(writer);

        let document = Document::from_bytes(Arc::clone(&schema), bytes.clone()).expect("Test shouldn't error");
        let segment = &document.children().expect("Test shouldn't error")[0];
        let unknown = &segment.children().expect("Test shouldn't error")[0];
        assert!(unknown.is_unknown());
        assert_eq!(ebml_tree::UNKNOWN_ELEMENT_NAME, unknown.name());
        assert_eq!(ebml_tree::specs::DataType::Unknown, unknown.data_type());
        assert_eq!(Some(&Value::Binary(vec![1, 2])), unknown.value().expect("Test shouldn't error").as_scalar());
        assert_eq!(
            Value::master([("Segment", Value::Master(vec![(ElementKey::Id(0x4321), Value::Binary(vec![1, 2]))]))]),
            document.dump().expect("Test shouldn't error")
        );

        assert!(matches!(
            ebml_tree::verify(schema, &bytes),
            Err(ebml_tree::errors::element::ElementError::UnknownElement { id: 0x4321, position: 5 })
        ));
    }

    #[test]
    pub fn verify_accepts_valid_documents() {
        let schema = test_schema();
        let bytes = encode_document_to_vec(&schema, &sample(), true).expect("Test shouldn't error");
        assert!(ebml_tree::verify(schema, &bytes).is_ok());
    }

    #[test]
    pub fn repeated_single_elements_keep_last_value() {
        let schema = test_schema();
        let mut bytes = Vec::new();
        let mut writer = ElementWriter::new(&mut bytes, Arc::clone(&schema));
        writer.start_master(&ElementKey::Id(INFO)).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(TITLE), &Value::from("first")).expect("Test shouldn't error");
        writer.write(&ElementKey::Id(TITLE), &Value::from("second")).expect("Test shouldn't error");
        writer.end_master(&ElementKey::Id(INFO)).expect("Test shouldn't error");
        drop(writer);

        let document = Document::from_bytes(schema, bytes).expect("Test shouldn't error");
        let info = &document.children().expect("Test shouldn't error")[0];
        assert_eq!(2, info.len().expect("Test shouldn't error"));
        assert_eq!(Value::master([("Title", Value::from("second"))]), info.dump().expect("Test shouldn't error"));
    }
}
