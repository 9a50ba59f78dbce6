use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use ebml_tree_specification::ebml_header::{DOC_TYPE, DOC_TYPE_READ_VERSION, DOC_TYPE_VERSION, EBML, EBML_READ_VERSION, EBML_VERSION};
use ebml_tree_specification::{DataType, ElementKey, Schema};

use super::element::Element;
use super::element_iterator::Children;
use super::element_writer::ElementWriter;
use super::errors::element::ElementError;
use super::errors::writer::EncodeError;
use super::value::Value;

///
/// Options for opening a [`Document`].
///
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentOptions {
    ///
    /// Whether the `EBML` header element is listed among the document's root elements.  It is always read into
    /// [`Document::info`] either way.
    ///
    pub headers: bool,
}

///
/// An EBML document: the sequence of root elements from the current position of a source to its end, read with one
/// [`Schema`].
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use ebml_tree::{Document, DocumentOptions, Value};
/// use ebml_tree::specs::{ebml_header, Schema};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Arc::new(Schema::from_definitions(None, ebml_header::header_definitions_for("webm", 4))?);
/// let bytes = ebml_tree::encode_document_to_vec(&schema, &Value::Master(Vec::new()), true)?;
///
/// let document = Document::from_bytes(Arc::clone(&schema), bytes.clone())?;
/// assert_eq!(Some("webm"), document.doc_type());
/// assert_eq!(Some(4), document.version());
/// assert_eq!(0, document.len()?);
///
/// let with_headers = Document::open_with(schema, std::io::Cursor::new(bytes), DocumentOptions { headers: true })?;
/// assert_eq!(1, with_headers.len()?);
/// # Ok(())
/// # }
/// ```
///
pub struct Document<R: Read + Seek> {
    name: String,
    root: Element<R>,
    info: Option<Value>,
}

impl<R: Read + Seek> Document<R> {
    pub fn open(schema: Arc<Schema>, source: R) -> Result<Self, ElementError> {
        Document::open_with(schema, source, DocumentOptions::default())
    }

    ///
    /// Opens a document starting at the current position of `source`.
    ///
    /// If the first element is the `EBML` header, it is read right away and kept as [`info`](Document::info).  Problems
    /// reading the first element are logged and not reported here; they surface again when the document is used.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::ReadError`] if the source cannot be seeked.
    ///
    pub fn open_with(schema: Arc<Schema>, mut source: R, options: DocumentOptions) -> Result<Self, ElementError> {
        let start = source.stream_position()?;
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(start))?;
        let source = Rc::new(RefCell::new(source));

        let mut payload_offset = start;
        let mut info = None;
        match Element::read_at(&source, &schema, start) {
            Ok(Some(first)) if first.id() == EBML && !first.is_unknown() => {
                match first.dump() {
                    Ok(header) => info = Some(header),
                    Err(err) => warn!(error = %err, "could not read the EBML header"),
                }
                if !options.headers {
                    match first.end() {
                        Ok(header_end) => payload_offset = header_end,
                        Err(err) => warn!(error = %err, "could not find the end of the EBML header"),
                    }
                }
            },
            Ok(_) => debug!(position = start, "document has no EBML header"),
            Err(err) => warn!(error = %err, position = start, "could not read the first element of the document"),
        }

        let size = end.saturating_sub(payload_offset);
        let name = schema.name().to_string();
        Ok(Document {
            name,
            root: Element::root(source, schema, payload_offset, size),
            info,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.root.schema()
    }

    ///
    /// The root container.  Its children are the document's root elements.
    ///
    pub fn root(&self) -> &Element<R> {
        &self.root
    }

    ///
    /// The dumped contents of the `EBML` header, if the document starts with one.
    ///
    pub fn info(&self) -> Option<&Value> {
        self.info.as_ref()
    }

    /// The `DocType` from the header.
    pub fn doc_type(&self) -> Option<&str> {
        let name = self.schema().by_id(DOC_TYPE)?.name();
        self.info.as_ref()?.get(name).and_then(Value::as_str)
    }

    /// The `DocTypeVersion` from the header.
    pub fn version(&self) -> Option<u64> {
        let name = self.schema().by_id(DOC_TYPE_VERSION)?.name();
        self.info.as_ref()?.get(name).and_then(Value::as_u64)
    }

    pub fn iter(&self) -> Children<'_, R> {
        self.root.iter()
    }

    pub fn len(&self) -> Result<usize, ElementError> {
        self.root.len()
    }

    pub fn is_empty(&self) -> Result<bool, ElementError> {
        self.root.is_empty()
    }

    ///
    /// All root elements, read and cached on first use.
    ///
    pub fn children(&self) -> Result<&[Element<R>], ElementError> {
        self.root.children()
    }

    pub fn get(&self, index: usize) -> Result<Option<&Element<R>>, ElementError> {
        Ok(self.children()?.get(index))
    }

    pub fn dump(&self) -> Result<Value, ElementError> {
        self.root.dump()
    }

    pub fn clear_cache(&mut self, recursive: bool) -> usize {
        self.root.clear_cache(recursive)
    }

    ///
    /// Reads the whole document, decoding every value.
    ///
    /// # Errors
    ///
    /// Fails on the first element whose id is not in the schema ([`ElementError::UnknownElement`]), or on any error
    /// reading or decoding the data.
    ///
    pub fn verify(&self) -> Result<(), ElementError> {
        crawl(&self.root)
    }
}

impl Document<Cursor<Vec<u8>>> {
    pub fn from_bytes(schema: Arc<Schema>, bytes: Vec<u8>) -> Result<Self, ElementError> {
        Document::open(schema, Cursor::new(bytes))
    }
}

fn crawl<R: Read + Seek>(element: &Element<R>) -> Result<(), ElementError> {
    for child in element.iter() {
        let child = child?;
        if child.is_unknown() {
            return Err(ElementError::UnknownElement { id: child.id(), position: child.offset() });
        }
        if child.is_master() {
            crawl(&child)?;
        } else {
            child.value()?;
        }
    }
    Ok(())
}

///
/// Checks that `bytes` is a document made only of elements in `schema`, decoding every value along the way.
///
/// # Errors
///
/// See [`Document::verify`].
///
pub fn verify(schema: Arc<Schema>, bytes: &[u8]) -> Result<(), ElementError> {
    Document::open_with(schema, Cursor::new(bytes), DocumentOptions { headers: true })?.verify()
}

///
/// Builds an `EBML` header from the defaults of the schema's header elements.  Header elements without a default are
/// left out.  Returns `None` if the schema has no `EBML` element.
///
pub fn create_headers(schema: &Schema) -> Option<Value> {
    schema.by_id(EBML)?;

    let mut entries = Vec::new();
    for id in [EBML_VERSION, EBML_READ_VERSION, DOC_TYPE, DOC_TYPE_VERSION, DOC_TYPE_READ_VERSION] {
        let Some(descriptor) = schema.by_id(id) else {
            continue;
        };
        let Some(default) = descriptor.default_value() else {
            continue;
        };
        let value = match descriptor.data_type() {
            DataType::UnsignedInt => default.trim().parse().ok().map(Value::UnsignedInt),
            DataType::Integer => default.trim().parse().ok().map(Value::Integer),
            DataType::String => Some(Value::String(default.to_string())),
            DataType::Utf8 => Some(Value::Utf8(default.to_string())),
            _ => None,
        };
        match value {
            Some(value) => entries.push((ElementKey::Name(descriptor.name().to_string()), value)),
            None => warn!(id, default, "ignoring header default that does not match its data type"),
        }
    }

    Some(Value::Master(entries))
}

///
/// Writes a document: optionally a header built with [`create_headers`], then every entry of `value`, which must be a
/// [`Value::Master`], as a root element.
///
/// # Errors
///
/// Returns an [`EncodeError`] if `value` is not a master value, an entry cannot be encoded, or writing fails.
///
pub fn encode_document<W: Write>(schema: &Arc<Schema>, dest: W, value: &Value, headers: bool) -> Result<(), EncodeError> {
    let Value::Master(entries) = value else {
        return Err(EncodeError::ValueMismatch {
            name: schema.document().name().to_string(),
            data_type: DataType::Master,
            found: value.kind(),
        });
    };

    let mut writer = ElementWriter::new(dest, Arc::clone(schema));
    if headers {
        if let Some(header) = create_headers(schema) {
            writer.write(&ElementKey::Id(EBML), &header)?;
        }
    }
    for (key, value) in entries {
        writer.write(key, value)?;
    }
    writer.finish()
}

pub fn encode_document_to_vec(schema: &Arc<Schema>, value: &Value, headers: bool) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    encode_document(schema, &mut bytes, value, headers)?;
    Ok(bytes)
}
