#![allow(dead_code)]

use std::cell::Cell;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::rc::Rc;
use std::sync::Arc;

use ebml_tree::specs::{ebml_header, DataType, ElementDefinition, Schema};

pub const SEGMENT: u32 = 0x18538067;
pub const INFO: u32 = 0x1549A966;
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;
pub const TITLE: u32 = 0x7BA9;
pub const DATE_UTC: u32 = 0x4461;
pub const DURATION: u32 = 0x4489;
pub const CLUSTER: u32 = 0x1F43B675;
pub const TIMECODE: u32 = 0xE7;
pub const SIMPLE_BLOCK: u32 = 0xA3;
pub const TAGS: u32 = 0x1254C367;

///
/// A cut-down Matroska schema: the EBML header plus a few segment elements.
///
pub fn test_schema() -> Arc<Schema> {
    let mut definitions = ebml_header::header_definitions_for("test", 2);
    definitions.push(
        ElementDefinition::new(SEGMENT, "Segment", DataType::Master).with_children(vec![
            ElementDefinition::new(INFO, "Info", DataType::Master).with_children(vec![
                ElementDefinition::new(TIMECODE_SCALE, "TimecodeScale", DataType::UnsignedInt).default_value("1000000"),
                ElementDefinition::new(TITLE, "Title", DataType::Utf8),
                ElementDefinition::new(DATE_UTC, "DateUTC", DataType::Date),
                ElementDefinition::new(DURATION, "Duration", DataType::Float),
            ]),
            ElementDefinition::new(CLUSTER, "Cluster", DataType::Master).multiple(true).with_children(vec![
                ElementDefinition::new(TIMECODE, "Timecode", DataType::UnsignedInt),
                ElementDefinition::new(SIMPLE_BLOCK, "SimpleBlock", DataType::Binary).multiple(true),
            ]),
            ElementDefinition::new(TAGS, "Tags", DataType::Master),
        ]),
    );
    Arc::new(Schema::from_definitions(None, definitions).expect("test schema should build"))
}

///
/// A reader that counts the calls to `read` made on it.
///
pub struct CountingReader {
    inner: Cursor<Vec<u8>>,
    reads: Rc<Cell<usize>>,
}

impl CountingReader {
    pub fn new(bytes: Vec<u8>) -> (CountingReader, Rc<Cell<usize>>) {
        let reads = Rc::new(Cell::new(0));
        (CountingReader { inner: Cursor::new(bytes), reads: Rc::clone(&reads) }, reads)
    }
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read(buf)
    }
}

impl Seek for CountingReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}
